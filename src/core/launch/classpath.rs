// ─── Classpath Builder ───
// Ordered, de-duplicated classpath for a resolved descriptor.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::platform::PlatformId;
use crate::core::state::LauncherPaths;
use crate::core::version::{RuleEnv, VersionDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classpath {
    /// Applicable libraries in descriptor order, then the client jar.
    pub entries: Vec<PathBuf>,
    pub natives_dir: PathBuf,
}

impl Classpath {
    /// Entries other than the trailing client jar.
    pub fn library_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    pub fn join(&self, platform: PlatformId) -> String {
        self.entries
            .iter()
            .map(|p| path_arg(p))
            .collect::<Vec<_>>()
            .join(platform.classpath_separator())
    }
}

/// Pure function of descriptor, rule environment and on-disk presence.
///
/// Library files that do not exist are skipped; downloading them is the
/// caller's job. The client jar is always appended last.
pub fn build_classpath(
    descriptor: &VersionDescriptor,
    env: &RuleEnv,
    paths: &LauncherPaths,
    default_repo: &str,
) -> Classpath {
    let mut entries = Vec::new();

    for lib in descriptor.partition_libraries(env).applicable {
        let Some(file) = lib.main_artifact(default_repo) else {
            continue;
        };
        let path = paths.library(&file.path);
        if path.is_file() {
            entries.push(path);
        } else {
            debug!("Classpath skips missing library {:?}", path);
        }
    }

    entries.push(paths.client_jar(&descriptor.id));
    dedup_preserving_order(&mut entries, env.platform);

    Classpath {
        entries,
        natives_dir: paths.natives_dir(&descriptor.id),
    }
}

fn dedup_preserving_order(entries: &mut Vec<PathBuf>, platform: PlatformId) {
    let mut seen = HashSet::new();
    entries.retain(|entry| {
        let key = entry.to_string_lossy();
        let key = if platform == PlatformId::Windows {
            key.to_lowercase()
        } else {
            key.into_owned()
        };
        seen.insert(key)
    });
}

/// Path as passed on the command line. Windows extended-length prefixes are
/// stripped since the JVM classloader rejects them.
pub fn path_arg(path: &Path) -> String {
    let text = path.to_string_lossy();
    match text.strip_prefix(r"\\?\") {
        Some(stripped) => stripped.to_string(),
        None => text.into_owned(),
    }
}
