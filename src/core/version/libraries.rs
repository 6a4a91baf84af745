use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::core::downloader::{ArtifactFetcher, FetchJob, ProgressEvent};
use crate::core::error::FetchError;
use crate::core::state::LauncherPaths;

use super::descriptor::{LibraryFile, VersionDescriptor};
use super::rules::RuleEnv;

/// Outcome of acquiring the applicable libraries of a descriptor.
#[derive(Debug, Default)]
pub struct LibraryReport {
    /// Files scheduled for download (including ones found already verified).
    pub scheduled: usize,
    /// Unverifiable files that already existed and were left alone.
    pub reused: usize,
    pub failed: Vec<(String, FetchError)>,
}

/// Download every applicable library artifact and native archive through
/// the fetcher's pool. Individual failures are recorded, not fatal.
pub async fn acquire_libraries(
    fetcher: &ArtifactFetcher,
    descriptor: &VersionDescriptor,
    env: &RuleEnv,
    paths: &LauncherPaths,
    default_repo: &str,
) -> LibraryReport {
    let mut report = LibraryReport::default();
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();

    for lib in descriptor.partition_libraries(env).applicable {
        let files = [
            lib.main_artifact(default_repo),
            lib.native_artifact(env.platform),
        ];
        for file in files.into_iter().flatten() {
            let LibraryFile { path, url, sha1 } = file;
            let dest = paths.library(&path);
            if !seen.insert(dest.clone()) {
                continue;
            }

            // Without a hash there is nothing to re-verify against.
            if sha1.is_none() && dest.exists() {
                debug!("Keeping unverifiable library {:?}", dest);
                report.reused += 1;
                continue;
            }
            jobs.push(FetchJob::new(url, dest, lib.name.clone()).with_sha1(sha1));
        }
    }

    report.scheduled = jobs.len();
    info!("Acquiring {} library files", jobs.len());

    for (job, error) in fetcher.fetch_all(jobs).await {
        warn!("Library {} failed: {}", job.description, error);
        fetcher.sink().emit(ProgressEvent::LibraryFailed {
            name: job.description.clone(),
            reason: error.to_string(),
        });
        report.failed.push((job.description, error));
    }

    report
}
