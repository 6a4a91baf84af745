use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::downloader::ArtifactFetcher;
use crate::core::error::ResolveError;
use crate::core::state::LauncherPaths;

use super::descriptor::VersionDescriptor;
use super::manifest::ManifestClient;

/// Turns version ids into descriptors, caching them on disk and in memory.
///
/// Descriptors are immutable once published, so a readable cache file is
/// trusted for the lifetime of the store.
pub struct VersionResolver {
    fetcher: Arc<ArtifactFetcher>,
    paths: LauncherPaths,
    resolved: HashMap<String, Arc<VersionDescriptor>>,
}

impl VersionResolver {
    pub fn new(fetcher: Arc<ArtifactFetcher>, paths: LauncherPaths) -> Self {
        Self {
            fetcher,
            paths,
            resolved: HashMap::new(),
        }
    }

    pub async fn resolve(
        &mut self,
        manifest: &mut ManifestClient,
        id: &str,
    ) -> Result<Arc<VersionDescriptor>, ResolveError> {
        if let Some(descriptor) = self.resolved.get(id) {
            return Ok(descriptor.clone());
        }

        let cache_file = self.paths.descriptor_file(id);
        if cache_file.exists() {
            match read_descriptor(&cache_file).await {
                Ok(descriptor) => {
                    debug!("Loaded cached descriptor for {} from {:?}", id, cache_file);
                    return Ok(self.remember(id, descriptor));
                }
                Err(reason) => warn!("Ignoring unreadable descriptor cache for {}: {}", id, reason),
            }
        }

        let fetch_failed = |reason: String| ResolveError::FetchFailed {
            id: id.to_string(),
            reason,
        };

        let index = manifest
            .index_or_refresh()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        let entry = index
            .find(id)
            .ok_or_else(|| ResolveError::UnknownVersion(id.to_string()))?;

        info!("Fetching descriptor for {}", id);
        self.fetcher
            .fetch(
                &entry.url,
                &cache_file,
                &format!("version {}", id),
                entry.sha1.as_deref(),
            )
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        match read_descriptor(&cache_file).await {
            Ok(descriptor) => Ok(self.remember(id, descriptor)),
            Err(reason) => {
                let _ = tokio::fs::remove_file(&cache_file).await;
                Err(fetch_failed(reason))
            }
        }
    }

    fn remember(&mut self, id: &str, descriptor: VersionDescriptor) -> Arc<VersionDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.resolved.insert(id.to_string(), descriptor.clone());
        descriptor
    }
}

async fn read_descriptor(path: &std::path::Path) -> Result<VersionDescriptor, String> {
    let raw = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    serde_json::from_slice(&raw).map_err(|e| format!("invalid descriptor: {}", e))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::downloader::testing::ScriptedTransport;
    use crate::core::downloader::{sha1_hex, RetryPolicy};
    use crate::core::version::manifest::tests::{manifest_json, MANIFEST_URL};

    const DESCRIPTOR_URL: &str = "https://meta.test/1.20.4.json";
    const DESCRIPTOR: &str = r#"{"id": "1.20.4", "mainClass": "net.minecraft.client.main.Main"}"#;

    fn setup(
        transport: Arc<ScriptedTransport>,
        root: &std::path::Path,
    ) -> (ManifestClient, VersionResolver) {
        let fetcher = Arc::new(
            ArtifactFetcher::new(transport).with_retry(RetryPolicy::new(2, Duration::from_millis(1))),
        );
        (
            ManifestClient::new(fetcher.clone(), MANIFEST_URL),
            VersionResolver::new(fetcher, LauncherPaths::new(root)),
        )
    }

    fn transport_with(descriptor: &str, sha1: Option<&str>) -> ScriptedTransport {
        ScriptedTransport::new()
            .serve(
                MANIFEST_URL,
                manifest_json(&[
                    ("1.20.4", "release", DESCRIPTOR_URL, sha1),
                    ("24w03a", "snapshot", "https://meta.test/24w03a.json", None),
                ]),
            )
            .serve(DESCRIPTOR_URL, descriptor.to_string())
    }

    #[tokio::test]
    async fn fetches_persists_and_then_reuses_cache() {
        let temp = tempfile::tempdir().unwrap();
        let hash = sha1_hex(DESCRIPTOR.as_bytes());
        let transport = Arc::new(transport_with(DESCRIPTOR, Some(&hash)));
        let (mut manifest, mut resolver) = setup(transport.clone(), temp.path());

        let descriptor = resolver.resolve(&mut manifest, "1.20.4").await.unwrap();
        assert_eq!(descriptor.main_class, "net.minecraft.client.main.Main");
        assert!(temp.path().join("versions/1.20.4/1.20.4.json").is_file());

        // A new session resolves from disk without touching the network.
        let (mut manifest, mut resolver) = setup(transport.clone(), temp.path());
        resolver.resolve(&mut manifest, "1.20.4").await.unwrap();
        assert_eq!(transport.hits(MANIFEST_URL), 1);
        assert_eq!(transport.hits(DESCRIPTOR_URL), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_reported_as_such() {
        let temp = tempfile::tempdir().unwrap();
        let transport = Arc::new(transport_with(DESCRIPTOR, None));
        let (mut manifest, mut resolver) = setup(transport, temp.path());

        let err = resolver.resolve(&mut manifest, "0.0.1").await.unwrap_err();
        assert!(matches!(err, ResolveError::UnknownVersion(id) if id == "0.0.1"));
    }

    #[tokio::test]
    async fn unparseable_descriptor_is_fetch_failure_and_not_cached() {
        let temp = tempfile::tempdir().unwrap();
        let transport = Arc::new(transport_with("{\"id\": 1}", None));
        let (mut manifest, mut resolver) = setup(transport, temp.path());

        let err = resolver.resolve(&mut manifest, "1.20.4").await.unwrap_err();
        assert!(matches!(err, ResolveError::FetchFailed { .. }));
        assert!(!temp.path().join("versions/1.20.4/1.20.4.json").exists());
    }

    #[tokio::test]
    async fn unreachable_index_is_fetch_failure() {
        let temp = tempfile::tempdir().unwrap();
        let (mut manifest, mut resolver) = setup(Arc::new(ScriptedTransport::new()), temp.path());

        let err = resolver.resolve(&mut manifest, "1.20.4").await.unwrap_err();
        assert!(matches!(err, ResolveError::FetchFailed { id, .. } if id == "1.20.4"));
    }

    #[tokio::test]
    async fn corrupt_cache_file_is_replaced() {
        let temp = tempfile::tempdir().unwrap();
        let cache = temp.path().join("versions/1.20.4/1.20.4.json");
        std::fs::create_dir_all(cache.parent().unwrap()).unwrap();
        std::fs::write(&cache, "truncated{").unwrap();
        let transport = Arc::new(transport_with(DESCRIPTOR, None));
        let (mut manifest, mut resolver) = setup(transport.clone(), temp.path());

        resolver.resolve(&mut manifest, "1.20.4").await.unwrap();
        assert_eq!(transport.hits(DESCRIPTOR_URL), 1);
        assert_eq!(std::fs::read_to_string(&cache).unwrap(), DESCRIPTOR);
    }
}
