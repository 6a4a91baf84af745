// ─── Version Manifest ───
// Global version index (`version_manifest_v2.json`), owned by a ManifestClient.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::downloader::ArtifactFetcher;
use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Release,
    Snapshot,
    OldBeta,
    OldAlpha,
}

impl VersionType {
    pub fn is_legacy(&self) -> bool {
        matches!(self, VersionType::OldBeta | VersionType::OldAlpha)
    }
}

/// Grouping used when listing the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionGroup {
    Release,
    Snapshot,
    /// `old_beta` and `old_alpha`.
    Legacy,
    All,
}

impl VersionGroup {
    fn contains(&self, kind: VersionType) -> bool {
        match self {
            VersionGroup::Release => kind == VersionType::Release,
            VersionGroup::Snapshot => kind == VersionType::Snapshot,
            VersionGroup::Legacy => kind.is_legacy(),
            VersionGroup::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: VersionType,
    /// Detail URL of the version descriptor.
    pub url: String,
    #[serde(rename = "releaseTime")]
    pub release_time: DateTime<Utc>,
    #[serde(default)]
    pub sha1: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionIndex {
    pub latest: LatestVersions,
    pub versions: Vec<VersionEntry>,
}

impl VersionIndex {
    pub fn find(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Entries of `group`, in index order.
    pub fn group(&self, group: VersionGroup) -> Vec<&VersionEntry> {
        self.versions
            .iter()
            .filter(|v| group.contains(v.version_type))
            .collect()
    }

    pub fn latest_release(&self) -> Option<&VersionEntry> {
        self.find(&self.latest.release)
    }

    pub fn latest_snapshot(&self) -> Option<&VersionEntry> {
        self.find(&self.latest.snapshot)
    }
}

/// Fetches the index and keeps the last good copy in memory.
pub struct ManifestClient {
    fetcher: Arc<ArtifactFetcher>,
    url: String,
    index: Option<Arc<VersionIndex>>,
}

impl ManifestClient {
    pub fn new(fetcher: Arc<ArtifactFetcher>, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
            index: None,
        }
    }

    /// Last successfully fetched index, if any.
    pub fn index(&self) -> Option<Arc<VersionIndex>> {
        self.index.clone()
    }

    /// Fetch and replace the index. On failure the previous index is kept.
    pub async fn refresh(&mut self) -> LauncherResult<Arc<VersionIndex>> {
        info!("Fetching Minecraft version manifest...");

        let fetched = self
            .fetcher
            .fetch_bytes(&self.url, "version manifest")
            .await
            .map_err(LauncherError::from)
            .and_then(|raw| serde_json::from_slice::<VersionIndex>(&raw).map_err(LauncherError::from));

        match fetched {
            Ok(index) => {
                info!("Loaded {} versions from manifest", index.versions.len());
                let index = Arc::new(index);
                self.index = Some(index.clone());
                Ok(index)
            }
            Err(e) => {
                warn!("Manifest refresh failed, keeping previous index: {}", e);
                Err(e)
            }
        }
    }

    /// The cached index, fetching it on first use.
    pub async fn index_or_refresh(&mut self) -> LauncherResult<Arc<VersionIndex>> {
        match &self.index {
            Some(index) => Ok(index.clone()),
            None => self.refresh().await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::downloader::testing::{Scripted, ScriptedTransport};
    use crate::core::downloader::RetryPolicy;

    pub(crate) const MANIFEST_URL: &str = "https://meta.test/version_manifest_v2.json";

    pub(crate) fn manifest_json(entries: &[(&str, &str, &str, Option<&str>)]) -> String {
        let versions: Vec<serde_json::Value> = entries
            .iter()
            .map(|(id, kind, url, sha1)| {
                serde_json::json!({
                    "id": id, "type": kind, "url": url, "sha1": sha1,
                    "time": "2024-01-01T00:00:00+00:00",
                    "releaseTime": "2023-12-07T12:56:20+00:00"
                })
            })
            .collect();
        serde_json::json!({
            "latest": {"release": entries[0].0, "snapshot": entries[1].0},
            "versions": versions
        })
        .to_string()
    }

    fn sample() -> String {
        manifest_json(&[
            ("1.20.4", "release", "https://meta.test/1.20.4.json", None),
            ("24w03a", "snapshot", "https://meta.test/24w03a.json", None),
            ("1.20.3", "release", "https://meta.test/1.20.3.json", None),
            ("b1.7.3", "old_beta", "https://meta.test/b1.7.3.json", None),
            ("a1.2.6", "old_alpha", "https://meta.test/a1.2.6.json", None),
        ])
    }

    fn client(transport: Arc<ScriptedTransport>) -> ManifestClient {
        let fetcher = ArtifactFetcher::new(transport)
            .with_retry(RetryPolicy::new(1, Duration::from_millis(1)));
        ManifestClient::new(Arc::new(fetcher), MANIFEST_URL)
    }

    #[tokio::test]
    async fn refresh_parses_and_groups_index() {
        let transport = Arc::new(ScriptedTransport::new().serve(MANIFEST_URL, sample()));
        let mut client = client(transport);

        let index = client.refresh().await.unwrap();
        assert_eq!(index.latest_release().unwrap().id, "1.20.4");
        assert_eq!(index.latest_snapshot().unwrap().version_type, VersionType::Snapshot);

        let releases: Vec<&str> = index.group(VersionGroup::Release).iter().map(|v| v.id.as_str()).collect();
        assert_eq!(releases, ["1.20.4", "1.20.3"]);
        let legacy: Vec<&str> = index.group(VersionGroup::Legacy).iter().map(|v| v.id.as_str()).collect();
        assert_eq!(legacy, ["b1.7.3", "a1.2.6"]);
        assert_eq!(index.group(VersionGroup::All).len(), 5);
        assert!(index.find("9.9.9").is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_index() {
        let transport = Arc::new(ScriptedTransport::new().route(
            MANIFEST_URL,
            vec![
                Scripted::Body(sample().into_bytes()),
                Scripted::Status(502),
            ],
        ));
        let mut client = client(transport);

        let first = client.refresh().await.unwrap();
        assert!(client.refresh().await.is_err());
        assert_eq!(client.index().unwrap(), first);
    }

    #[tokio::test]
    async fn malformed_index_is_rejected_without_replacing() {
        let transport = Arc::new(ScriptedTransport::new().serve(MANIFEST_URL, "{\"versions\": 3}"));
        let mut client = client(transport);

        let err = client.refresh().await.unwrap_err();
        assert!(matches!(err, LauncherError::Json(_)));
        assert!(client.index().is_none());
    }

    #[tokio::test]
    async fn index_or_refresh_fetches_once() {
        let transport = Arc::new(ScriptedTransport::new().serve(MANIFEST_URL, sample()));
        let mut client = client(transport.clone());

        client.index_or_refresh().await.unwrap();
        client.index_or_refresh().await.unwrap();
        assert_eq!(transport.hits(MANIFEST_URL), 1);
    }
}
