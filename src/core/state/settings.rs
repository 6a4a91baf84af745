use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::downloader::RetryPolicy;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MOJANG_LIBRARIES;

const APP_DIR_NAME: &str = ".ctlauncher";
const SETTINGS_FILE: &str = "launcher_settings.json";
const HOME_ENV: &str = "CTLAUNCHER_HOME";

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Persisted launcher settings. Missing fields take their defaults and
/// unknown fields are ignored, so older and newer files both load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub manifest_url: String,
    pub resources_url: String,
    pub libraries_url: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub concurrency: usize,
    /// Emit an asset progress event every this many completions.
    pub progress_every: usize,
    pub memory_mb: u32,
    pub java_path: Option<PathBuf>,
    pub extra_jvm_args: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            manifest_url: VERSION_MANIFEST_URL.to_string(),
            resources_url: RESOURCES_URL.to_string(),
            libraries_url: MOJANG_LIBRARIES.to_string(),
            max_attempts: 3,
            base_delay_ms: 1000,
            timeout_secs: 30,
            concurrency: 4,
            progress_every: 10,
            memory_mb: 2048,
            java_path: None,
            extra_jvm_args: Vec::new(),
        }
    }
}

impl LauncherConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn settings_path(data_dir: &Path) -> PathBuf {
        data_dir.join(SETTINGS_FILE)
    }

    /// Load from `<data_dir>/launcher_settings.json`, or defaults if absent.
    pub async fn load(data_dir: &Path) -> LauncherResult<Self> {
        let path = Self::settings_path(data_dir);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(LauncherError::io(path, e)),
        };

        serde_json::from_str(&raw)
            .map_err(|e| LauncherError::Config(format!("{}: {}", path.display(), e)))
    }

    pub async fn save(&self, data_dir: &Path) -> LauncherResult<()> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| LauncherError::io(data_dir, e))?;
        let path = Self::settings_path(data_dir);
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        info!("Saved launcher settings to {:?}", path);
        Ok(())
    }
}

/// `$CTLAUNCHER_HOME`, otherwise `~/.ctlauncher`.
pub fn default_data_dir() -> PathBuf {
    data_dir_from(std::env::var_os(HOME_ENV))
}

fn data_dir_from(override_dir: Option<OsString>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME),
    }
}
