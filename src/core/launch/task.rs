// ─── Launch Task ───
// The final process invocation and its spawn.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::platform::PlatformId;

use super::classpath::path_arg;

/// Everything needed to start the game, fully substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchPlan {
    pub java_binary: PathBuf,
    pub jvm_args: Vec<String>,
    pub main_class: String,
    pub game_args: Vec<String>,
    pub working_directory: PathBuf,
    /// Variables overridden for the child; everything else is inherited.
    pub env: Vec<(String, String)>,
}

impl LaunchPlan {
    /// Arguments after the binary: JVM flags, main class, game arguments.
    pub fn command_line(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.jvm_args.len() + 1 + self.game_args.len());
        args.extend(self.jvm_args.iter().cloned());
        args.push(self.main_class.clone());
        args.extend(self.game_args.iter().cloned());
        args
    }

    /// Copy/paste friendly rendering of the command.
    pub fn format_for_logs(&self) -> String {
        std::iter::once(path_arg(&self.java_binary))
            .chain(self.command_line())
            .map(|arg| shell_escape(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Environment overrides for the child: the runtime's `bin` directory goes
/// first on `PATH`, and the natives directory first on the platform's native
/// library search variable. `lookup` supplies the current values.
pub fn launch_environment(
    platform: PlatformId,
    java_binary: &Path,
    natives_dir: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<(String, String)> {
    let separator = if platform == PlatformId::Windows { ";" } else { ":" };
    let mut env: Vec<(String, String)> = Vec::new();

    let mut prefix = |var: &str, value: String| {
        let existing = env
            .iter()
            .find(|(k, _)| k == var)
            .map(|(_, v)| v.clone())
            .or_else(|| lookup(var));
        let merged = match existing {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{}{}{}", value, separator, existing)
            }
            _ => value,
        };
        env.retain(|(k, _)| k != var);
        env.push((var.to_string(), merged));
    };

    if let Some(bin) = java_binary.parent().filter(|p| !p.as_os_str().is_empty()) {
        prefix("PATH", path_arg(bin));
    }
    prefix(platform.native_search_var(), path_arg(natives_dir));

    env
}

/// Start the process described by `plan` with inherited stdio.
/// Returns once the handle exists; the game's own startup is not observed.
pub fn spawn(plan: &LaunchPlan) -> LauncherResult<Child> {
    let mut cmd = Command::new(&plan.java_binary);
    cmd.args(plan.command_line())
        .current_dir(&plan.working_directory)
        .envs(plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    info!("Launching {} with Java: {:?}", plan.main_class, plan.java_binary);
    debug!("Command (copy/paste): {}", plan.format_for_logs());

    cmd.spawn().map_err(|e| {
        LauncherError::Spawn(format!("{}: {}", plan.java_binary.display(), e))
    })
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=' | '$' | '{' | '}')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> LaunchPlan {
        LaunchPlan {
            java_binary: PathBuf::from("/opt/java/bin/java"),
            jvm_args: vec!["-Xmx2048M".into(), "-cp".into(), "/a.jar:/b.jar".into()],
            main_class: "net.minecraft.client.main.Main".into(),
            game_args: vec!["--username".into(), "Player One".into()],
            working_directory: PathBuf::from("/data"),
            env: Vec::new(),
        }
    }

    #[test]
    fn command_line_orders_jvm_main_game() {
        assert_eq!(
            plan().command_line(),
            vec![
                "-Xmx2048M",
                "-cp",
                "/a.jar:/b.jar",
                "net.minecraft.client.main.Main",
                "--username",
                "Player One"
            ]
        );
    }

    #[test]
    fn log_format_quotes_only_when_needed() {
        let rendered = plan().format_for_logs();
        assert!(rendered.starts_with("/opt/java/bin/java -Xmx2048M -cp /a.jar:/b.jar"));
        assert!(rendered.ends_with("--username \"Player One\""));
        assert_eq!(shell_escape(""), "\"\"");
    }

    #[test]
    fn environment_prefixes_runtime_and_natives() {
        let lookup = |var: &str| match var {
            "PATH" => Some("/usr/bin".to_string()),
            _ => None,
        };
        let env = launch_environment(
            PlatformId::Linux,
            Path::new("/opt/java/bin/java"),
            Path::new("/data/versions/1.20.4/natives"),
            lookup,
        );
        assert_eq!(
            env,
            vec![
                ("PATH".to_string(), "/opt/java/bin:/usr/bin".to_string()),
                (
                    "LD_LIBRARY_PATH".to_string(),
                    "/data/versions/1.20.4/natives".to_string()
                ),
            ]
        );
    }

    #[test]
    fn windows_puts_both_prefixes_on_path() {
        let env = launch_environment(
            PlatformId::Windows,
            Path::new("C:/java/bin/java.exe"),
            Path::new("C:/data/natives"),
            |_| Some(r"C:\Windows".to_string()),
        );
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].0, "PATH");
        assert_eq!(env[0].1, r"C:/data/natives;C:/java/bin;C:\Windows");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_failure() {
        let temp = tempfile::tempdir().unwrap();
        let mut plan = plan();
        plan.java_binary = temp.path().join("no-such-java");
        plan.working_directory = temp.path().to_path_buf();

        let err = spawn(&plan).unwrap_err();
        assert!(matches!(err, LauncherError::Spawn(_)));
    }
}
