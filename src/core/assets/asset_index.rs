use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::downloader::{
    is_present_and_verified, AbortSignal, ArtifactFetcher, FetchJob, ProgressEvent,
};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherPaths;
use crate::core::version::AssetIndexRef;

/// Asset index JSON: virtual path to content hash.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetIndex {
    #[serde(default)]
    pub objects: HashMap<String, AssetObject>,
    /// Pre-1.7 layout: objects must also exist under their virtual paths.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default)]
    pub map_to_resources: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetIndex {
    pub fn needs_virtual_copy(&self) -> bool {
        self.is_virtual || self.map_to_resources
    }

    /// Distinct object hashes, sorted.
    pub fn unique_hashes(&self) -> BTreeSet<&str> {
        self.objects.values().map(|o| o.hash.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Distinct objects referenced by the index.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Materialised virtual tree, for legacy indexes.
    pub virtual_dir: Option<PathBuf>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Brings the content-addressed object store up to date with an asset index.
pub struct AssetSynchronizer {
    fetcher: Arc<ArtifactFetcher>,
    paths: LauncherPaths,
    resources_url: String,
    progress_every: usize,
}

impl AssetSynchronizer {
    pub fn new(fetcher: Arc<ArtifactFetcher>, paths: LauncherPaths, resources_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            paths,
            resources_url: resources_url.into(),
            progress_every: 10,
        }
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    fn object_url(&self, hash: &str) -> String {
        format!(
            "{}/{}/{}",
            self.resources_url.trim_end_matches('/'),
            hash.get(..2).unwrap_or(hash),
            hash
        )
    }

    /// Download the index, then every object not already present and verified.
    ///
    /// A missing index is a hard error. Object failures are only counted.
    /// If `abort` fires, unstarted objects are skipped, in-flight ones finish,
    /// and the whole sync reports `Aborted`.
    pub async fn sync(&self, index_ref: &AssetIndexRef, abort: &AbortSignal) -> LauncherResult<SyncReport> {
        let index = self.load_index(index_ref).await?;
        let hashes = index.unique_hashes();
        let total = hashes.len();
        let sink = self.fetcher.sink().clone();

        // Verify what is already on disk before scheduling any work.
        let checks = stream::iter(hashes.iter().copied())
            .map(|hash| async move {
                let present = is_present_and_verified(&self.paths.asset_object(hash), hash).await;
                (hash, present)
            })
            .buffer_unordered(self.fetcher.concurrency() * 2)
            .collect::<Vec<_>>()
            .await;

        let jobs: Vec<FetchJob> = checks
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(hash, _)| {
                FetchJob::new(self.object_url(hash), self.paths.asset_object(hash), format!("asset {}", hash))
                    .with_sha1(Some(hash.to_string()))
            })
            .collect();

        let mut succeeded = total - jobs.len();
        let mut failed = 0;
        let mut completed = succeeded;
        info!(
            "Asset index {}: {} objects, {} already present, {} to download",
            index_ref.id,
            total,
            succeeded,
            jobs.len()
        );

        sink.emit(ProgressEvent::AssetProgress {
            completed,
            succeeded,
            failed,
            total,
        });

        let results = self.fetcher.fetch_stream(jobs, abort);
        futures_util::pin_mut!(results);
        while let Some((job, result)) = results.next().await {
            match result {
                Some(Ok(_)) => succeeded += 1,
                Some(Err(e)) => {
                    warn!("Asset {} failed: {}", job.description, e);
                    failed += 1;
                }
                None => continue,
            }
            completed += 1;
            if completed % self.progress_every == 0 || completed == total {
                sink.emit(ProgressEvent::AssetProgress {
                    completed,
                    succeeded,
                    failed,
                    total,
                });
            }
        }

        if abort.is_aborted() {
            return Err(LauncherError::Aborted(format!("asset sync for index {}", index_ref.id)));
        }

        if failed > 0 {
            sink.emit(ProgressEvent::AssetSyncIncomplete { failed, total });
        }

        let virtual_dir = if index.needs_virtual_copy() {
            Some(self.materialize_virtual(&index_ref.id, &index).await)
        } else {
            None
        };

        Ok(SyncReport {
            total,
            succeeded,
            failed,
            virtual_dir,
        })
    }

    async fn load_index(&self, index_ref: &AssetIndexRef) -> LauncherResult<AssetIndex> {
        let path = self.paths.asset_index_file(&index_ref.id);
        self.fetcher
            .fetch(
                &index_ref.url,
                &path,
                &format!("asset index {}", index_ref.id),
                index_ref.sha1.as_deref(),
            )
            .await?;

        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Copy every verified object to `assets/virtual/<id>/<virtual path>`.
    async fn materialize_virtual(&self, index_id: &str, index: &AssetIndex) -> PathBuf {
        let root = self.paths.virtual_assets_dir(index_id);
        let mut copied = 0;

        for (name, object) in &index.objects {
            let source = self.paths.asset_object(&object.hash);
            let target = root.join(name);
            if !source.is_file() || is_present_and_verified(&target, &object.hash).await {
                continue;
            }
            if let Some(parent) = target.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!("Cannot create {:?}: {}", parent, e);
                    continue;
                }
            }
            match tokio::fs::copy(&source, &target).await {
                Ok(_) => copied += 1,
                Err(e) => warn!("Failed to copy asset {} to {:?}: {}", name, target, e),
            }
        }

        debug!("Materialised {} virtual assets under {:?}", copied, root);
        root
    }
}
