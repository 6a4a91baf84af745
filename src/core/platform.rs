// ─── Platform Identity ───
// Mojang manifests name operating systems `windows`, `linux` and `osx`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Windows,
    Linux,
    Osx,
}

impl PlatformId {
    /// Platform of the running host.
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Normalize a host-reported OS name (`std::env::consts::OS`,
    /// `uname`-style names, or manifest names) into a platform id.
    ///
    /// Anything unrecognised is treated as a Linux-like Unix.
    pub fn from_os_name(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        if lower.starts_with("windows") || lower == "win32" {
            PlatformId::Windows
        } else if lower == "macos" || lower == "osx" || lower == "darwin" || lower.starts_with("mac")
        {
            PlatformId::Osx
        } else {
            PlatformId::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Windows => "windows",
            PlatformId::Linux => "linux",
            PlatformId::Osx => "osx",
        }
    }

    /// Java classpath separator for this platform.
    pub fn classpath_separator(&self) -> &'static str {
        match self {
            PlatformId::Windows => ";",
            _ => ":",
        }
    }

    /// Environment variable the JVM consults for native libraries.
    pub fn native_search_var(&self) -> &'static str {
        match self {
            PlatformId::Windows => "PATH",
            PlatformId::Linux => "LD_LIBRARY_PATH",
            PlatformId::Osx => "DYLD_LIBRARY_PATH",
        }
    }

    pub fn java_executable(&self) -> &'static str {
        match self {
            PlatformId::Windows => "java.exe",
            _ => "java",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Architecture name as used in `os.arch` rule constraints.
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "x86",
        "x86_64" => "x86_64",
        "aarch64" => "arm64",
        "arm" => "arm",
        other => other,
    }
}

/// Value substituted for `${arch}` in legacy native classifiers.
pub fn arch_bits() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "64"
    } else {
        "32"
    }
}
