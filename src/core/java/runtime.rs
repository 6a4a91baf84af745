use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::platform::PlatformId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JavaInstallation {
    pub path: PathBuf,
    pub version: String,
    pub major: u32,
}

/// Source of a runtime binary satisfying a required major version.
#[async_trait]
pub trait RuntimeProvider: Send + Sync {
    async fn resolve(&self, required_major: u32) -> LauncherResult<PathBuf>;
}

/// Finds an already installed runtime: configured path, managed
/// `runtimes/*`, `JAVA_HOME`, then `PATH`.
pub struct LocalRuntimeProvider {
    configured: Option<PathBuf>,
    runtimes_dir: PathBuf,
    java_home: Option<PathBuf>,
    search_path: Option<OsString>,
    platform: PlatformId,
}

impl LocalRuntimeProvider {
    pub fn new(configured: Option<PathBuf>, runtimes_dir: PathBuf) -> Self {
        Self {
            configured,
            runtimes_dir,
            java_home: std::env::var_os("JAVA_HOME").map(PathBuf::from),
            search_path: std::env::var_os("PATH"),
            platform: PlatformId::current(),
        }
    }

    /// Ignore `JAVA_HOME` and `PATH`.
    pub fn without_system_lookup(mut self) -> Self {
        self.java_home = None;
        self.search_path = None;
        self
    }

    /// Candidate binaries in priority order. Only existing files are listed.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let exe = self.platform.java_executable();
        let mut out = Vec::new();

        if let Some(configured) = &self.configured {
            if configured.is_dir() {
                out.extend(locate_java_binary(configured, exe));
            } else {
                out.push(configured.clone());
            }
        }

        if let Ok(entries) = std::fs::read_dir(&self.runtimes_dir) {
            let mut roots: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            // Newest-looking names first, e.g. `java21` before `java17`.
            roots.sort();
            roots.reverse();
            out.extend(roots.iter().filter_map(|root| locate_java_binary(root, exe)));
        }

        if let Some(home) = &self.java_home {
            out.extend(locate_java_binary(home, exe));
        }

        if let Some(search_path) = &self.search_path {
            out.extend(
                std::env::split_paths(search_path)
                    .map(|dir| dir.join(exe))
                    .filter(|candidate| candidate.is_file())
                    .take(1),
            );
        }

        out.retain(|p| p.is_file());
        out.dedup();
        out
    }
}

#[async_trait]
impl RuntimeProvider for LocalRuntimeProvider {
    #[instrument(skip(self))]
    async fn resolve(&self, required_major: u32) -> LauncherResult<PathBuf> {
        for candidate in self.candidates() {
            match probe_java(&candidate).await {
                Some(found) if found.major >= required_major => {
                    info!(
                        "Using Java {} ({}) at {:?}",
                        found.major, found.version, found.path
                    );
                    return Ok(found.path);
                }
                Some(found) => debug!(
                    "Skipping Java {} at {:?}: need {}",
                    found.major, found.path, required_major
                ),
                None => debug!("Could not probe {:?}", candidate),
            }
        }
        Err(LauncherError::RuntimeUnavailable(required_major))
    }
}

/// `bin/java`, or the macOS bundle layout `Contents/Home/bin/java`.
fn locate_java_binary(root: &Path, exe: &str) -> Option<PathBuf> {
    [
        root.join("bin").join(exe),
        root.join("Contents").join("Home").join("bin").join(exe),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `java -version` and read the reported version.
pub async fn probe_java(path: &Path) -> Option<JavaInstallation> {
    probe_java_within(path, PROBE_TIMEOUT).await
}

/// As `probe_java`; a candidate still running after `limit` is killed and
/// treated as unusable.
pub async fn probe_java_within(path: &Path, limit: Duration) -> Option<JavaInstallation> {
    let version_check = Command::new(path).arg("-version").kill_on_drop(true).output();
    let output = match tokio::time::timeout(limit, version_check).await {
        Ok(output) => output.ok()?,
        Err(_) => {
            warn!("{:?} did not answer -version within {:?}", path, limit);
            return None;
        }
    };
    // `-version` prints to stderr; some wrappers use stdout.
    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    let version = parse_version_string(&text)?;
    Some(JavaInstallation {
        path: path.to_path_buf(),
        major: parse_major_version(&version),
        version,
    })
}

/// First double-quoted token, e.g. `17.0.9` from `openjdk version "17.0.9"`.
fn parse_version_string(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let start = line.find('"')?;
        let rest = &line[start + 1..];
        let end = rest.find('"')?;
        Some(rest[..end].to_string())
    })
}

/// `1.8.0_392` is Java 8; `17.0.9` is Java 17.
fn parse_major_version(version: &str) -> u32 {
    let mut parts = version.split(|c: char| !c.is_ascii_digit());
    let first: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    if first == 1 {
        parts.next().and_then(|p| p.parse().ok()).unwrap_or(first)
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_and_modern_versions() {
        assert_eq!(parse_major_version("1.8.0_392"), 8);
        assert_eq!(parse_major_version("17.0.9"), 17);
        assert_eq!(parse_major_version("21"), 21);
        assert_eq!(parse_major_version("22-ea"), 22);
        assert_eq!(parse_major_version("garbage"), 0);
    }

    #[test]
    fn reads_quoted_version_from_output() {
        let output = "openjdk version \"17.0.9\" 2023-10-17\nOpenJDK Runtime Environment Temurin";
        assert_eq!(parse_version_string(output).as_deref(), Some("17.0.9"));
        assert_eq!(parse_version_string("no version here"), None);
    }

    #[test]
    fn candidates_follow_priority_order() {
        let temp = tempfile::tempdir().unwrap();
        let exe = PlatformId::current().java_executable();
        let make = |rel: &str| {
            let p = temp.path().join(rel).join(exe);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(&p, b"").unwrap();
            p
        };
        let configured = make("custom/bin");
        let older = make("runtimes/java17/bin");
        let newer = make("runtimes/java21/bin");
        let mac = make("runtimes/java8/Contents/Home/bin");
        std::fs::create_dir_all(temp.path().join("runtimes/empty")).unwrap();

        let provider =
            LocalRuntimeProvider::new(Some(configured.clone()), temp.path().join("runtimes"))
                .without_system_lookup();

        assert_eq!(provider.candidates(), vec![configured, mac, newer, older]);
    }

    #[tokio::test]
    async fn nothing_found_is_runtime_unavailable() {
        let temp = tempfile::tempdir().unwrap();
        let provider =
            LocalRuntimeProvider::new(None, temp.path().join("runtimes")).without_system_lookup();
        let err = provider.resolve(17).await.unwrap_err();
        assert!(matches!(err, LauncherError::RuntimeUnavailable(17)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probes_and_filters_by_major() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let fake = |dir: &str, version: &str| {
            let bin = temp.path().join("runtimes").join(dir).join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            let java = bin.join("java");
            std::fs::write(
                &java,
                format!("#!/bin/sh\necho 'openjdk version \"{}\" 2024-01-16' >&2\n", version),
            )
            .unwrap();
            std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();
            java
        };
        let java8 = fake("a-java8", "1.8.0_392");
        let java17 = fake("b-java17", "17.0.10");

        let provider =
            LocalRuntimeProvider::new(None, temp.path().join("runtimes")).without_system_lookup();

        assert_eq!(probe_java(&java8).await.unwrap().major, 8);
        assert_eq!(provider.resolve(17).await.unwrap(), java17);
        assert_eq!(provider.resolve(8).await.unwrap(), java17);
        assert!(matches!(
            provider.resolve(21).await,
            Err(LauncherError::RuntimeUnavailable(21))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hanging_candidate_is_abandoned() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let java = temp.path().join("java");
        std::fs::write(&java, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();

        let started = std::time::Instant::now();
        let found = probe_java_within(&java, Duration::from_millis(200)).await;

        assert!(found.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
