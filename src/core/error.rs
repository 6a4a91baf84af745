use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single artifact fetch gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    NetworkFailure,
    HashMismatch,
    Timeout,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchErrorKind::NetworkFailure => "network failure",
            FetchErrorKind::HashMismatch => "hash mismatch",
            FetchErrorKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Terminal error of `ArtifactFetcher::fetch`, raised only after the retry
/// budget is spent.
#[derive(Debug, Clone, Error)]
#[error("{kind} for {url} after {attempts} attempt(s): {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub attempts: u32,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.to_string(),
            attempts: 0,
            message: message.into(),
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Failure modes of `VersionResolver::resolve`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    #[error("could not obtain descriptor for {id}: {reason}")]
    FetchFailed { id: String, reason: String },
}

/// Coarse classification reported to the caller when a launch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkFailure,
    HashMismatch,
    Timeout,
    UnknownVersion,
    MissingRequiredArtifact,
    RuntimeUnavailable,
    SpawnFailure,
    Aborted,
    Storage,
    InvalidData,
    Other,
}

/// Central error type for the launcher core.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    // ── Resolution ──────────────────────────────────────
    #[error("Unknown version: {0}")]
    UnknownVersion(String),

    #[error("Failed to resolve version {id}: {reason}")]
    ResolveFailed { id: String, reason: String },

    #[error("Required artifact missing: {name}: {reason}")]
    MissingRequiredArtifact { name: String, reason: String },

    // ── Runtime ─────────────────────────────────────────
    #[error("No Java runtime available for major version {0}")]
    RuntimeUnavailable(u32),

    #[error("Failed to spawn game process: {0}")]
    Spawn(String),

    #[error("Launch aborted: {0}")]
    Aborted(String),

    // ── Data ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LauncherError::Fetch(e) => match e.kind {
                FetchErrorKind::NetworkFailure => ErrorKind::NetworkFailure,
                FetchErrorKind::HashMismatch => ErrorKind::HashMismatch,
                FetchErrorKind::Timeout => ErrorKind::Timeout,
            },
            LauncherError::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            LauncherError::Http(_) => ErrorKind::NetworkFailure,
            LauncherError::UnknownVersion(_) => ErrorKind::UnknownVersion,
            LauncherError::ResolveFailed { .. } => ErrorKind::NetworkFailure,
            LauncherError::MissingRequiredArtifact { .. } => ErrorKind::MissingRequiredArtifact,
            LauncherError::RuntimeUnavailable(_) => ErrorKind::RuntimeUnavailable,
            LauncherError::Spawn(_) => ErrorKind::SpawnFailure,
            LauncherError::Aborted(_) => ErrorKind::Aborted,
            LauncherError::Io { .. } => ErrorKind::Storage,
            LauncherError::Json(_)
            | LauncherError::Zip(_)
            | LauncherError::InvalidMavenCoordinate(_)
            | LauncherError::Config(_) => ErrorKind::InvalidData,
            LauncherError::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<ResolveError> for LauncherError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::UnknownVersion(id) => LauncherError::UnknownVersion(id),
            ResolveError::FetchFailed { id, reason } => LauncherError::ResolveFailed { id, reason },
        }
    }
}

// Front ends receive the error as its display string.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_maps_to_matching_kind() {
        let err: LauncherError =
            FetchError::new(FetchErrorKind::HashMismatch, "https://x/y", "bad").into();
        assert_eq!(err.kind(), ErrorKind::HashMismatch);
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn resolve_error_unknown_version_stays_fatal_kind() {
        let err: LauncherError = ResolveError::UnknownVersion("9.9.9".into()).into();
        assert_eq!(err.kind(), ErrorKind::UnknownVersion);
        assert_eq!(err.to_string(), "Unknown version: 9.9.9");
    }
}
