use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{FetchError, FetchErrorKind};
use crate::core::http::{BodyStream, Transport, TransportError, TransportResponse};

use super::progress::{NoopSink, ProgressEvent, ProgressSink};
use super::retry::RetryPolicy;

/// Emit a progress event at most once per this many bytes.
const PROGRESS_GRANULARITY: u64 = 256 * 1024;

/// One artifact to fetch, with optional SHA-1 for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub url: String,
    pub dest: PathBuf,
    pub description: String,
    pub sha1: Option<String>,
}

impl FetchJob {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            description: description.into(),
            sha1: None,
        }
    }

    pub fn with_sha1(mut self, sha1: Option<String>) -> Self {
        self.sha1 = sha1;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Bytes were transferred and (if a hash was given) verified.
    Downloaded { bytes: u64 },
    /// The destination already held verified content; no request was made.
    AlreadyPresent,
}

/// Shared flag that stops a batch from starting further jobs.
/// Jobs already in flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one job in a batch. `None` means the job was never started
/// because the batch was aborted first.
pub type JobResult = (FetchJob, Option<Result<FetchOutcome, FetchError>>);

/// Concurrent, SHA-1 validated downloader with per-artifact retry.
///
/// Every write lands in a uniquely named sibling temp file and is renamed
/// over the destination only after the body completed and matched its hash,
/// so readers of the final path never observe partial or unverified data.
pub struct ArtifactFetcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    /// Longest wait for a response or for the next body chunk.
    idle_timeout: Duration,
    /// Maximum number of parallel jobs in a batch.
    concurrency: usize,
    sink: Arc<dyn ProgressSink>,
    /// Paths written and verified since the last `begin_session`.
    verified: Mutex<HashSet<PathBuf>>,
}

impl ArtifactFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            idle_timeout: Duration::from_secs(60),
            concurrency: 4,
            sink: Arc::new(NoopSink),
            verified: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn sink(&self) -> &Arc<dyn ProgressSink> {
        &self.sink
    }

    /// Forget what earlier sessions verified. Files they wrote are hashed
    /// again before being reused.
    pub async fn begin_session(&self) {
        self.verified.lock().await.clear();
    }

    // ── Single artifact ─────────────────────────────────

    /// Fetch `url` into `dest`, verifying against `expected_sha1` when given.
    ///
    /// An existing destination is reused only if this fetcher wrote it in
    /// the current session or its hash matches now; otherwise it
    /// is downloaded again. Dropping the returned future removes the temp
    /// file of the attempt in flight.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        description: &str,
        expected_sha1: Option<&str>,
    ) -> Result<FetchOutcome, FetchError> {
        if let Some(expected) = expected_sha1 {
            if self.is_reusable(dest, expected).await {
                debug!("Reusing verified {} at {:?}", description, dest);
                return Ok(FetchOutcome::AlreadyPresent);
            }
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                FetchError::new(
                    FetchErrorKind::NetworkFailure,
                    url,
                    format!("cannot create {:?}: {}", parent, e),
                )
            })?;
        }

        let bytes = self
            .run_with_retry(url, description, |_| {
                self.attempt_to_file(url, dest, description, expected_sha1)
            })
            .await?;

        if expected_sha1.is_some() {
            self.verified.lock().await.insert(dest.to_path_buf());
        }

        self.sink.emit(ProgressEvent::FetchFinished {
            description: description.to_string(),
            bytes,
        });
        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(FetchOutcome::Downloaded { bytes })
    }

    pub async fn fetch_job(&self, job: &FetchJob) -> Result<FetchOutcome, FetchError> {
        self.fetch(&job.url, &job.dest, &job.description, job.sha1.as_deref())
            .await
    }

    /// GET `url` into memory with the same retry discipline.
    pub async fn fetch_bytes(&self, url: &str, description: &str) -> Result<Vec<u8>, FetchError> {
        self.run_with_retry(url, description, |_| self.attempt_to_memory(url, description))
            .await
    }

    // ── Batch ───────────────────────────────────────────

    /// Run `jobs` through a pool of `concurrency` workers, yielding each
    /// result as soon as it completes (not in submission order).
    pub fn fetch_stream<'a>(
        &'a self,
        jobs: Vec<FetchJob>,
        abort: &AbortSignal,
    ) -> impl Stream<Item = JobResult> + 'a {
        let abort = abort.clone();
        stream::iter(jobs)
            .map(move |job| {
                let abort = abort.clone();
                async move {
                    if abort.is_aborted() {
                        return (job, None);
                    }
                    let result = self.fetch_job(&job).await;
                    (job, Some(result))
                }
            })
            .buffer_unordered(self.concurrency)
    }

    /// Fetch every job and return the failures.
    pub async fn fetch_all(&self, jobs: Vec<FetchJob>) -> Vec<(FetchJob, FetchError)> {
        info!(
            "Starting batch download: {} files, concurrency={}",
            jobs.len(),
            self.concurrency
        );

        let results: Vec<JobResult> = self.fetch_stream(jobs, &AbortSignal::new()).collect().await;
        results
            .into_iter()
            .filter_map(|(job, result)| match result {
                Some(Err(e)) => Some((job, e)),
                _ => None,
            })
            .collect()
    }

    // ── Internals ───────────────────────────────────────

    async fn is_reusable(&self, dest: &Path, expected: &str) -> bool {
        if self.verified.lock().await.contains(dest) && dest.exists() {
            return true;
        }
        is_present_and_verified(dest, expected).await
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        url: &str,
        description: &str,
        mut attempt_fn: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            self.sink.emit(ProgressEvent::FetchStarted {
                description: description.to_string(),
                url: url.to_string(),
                attempt: attempt + 1,
            });

            match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if self.retry.has_attempt_after(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    self.sink.emit(ProgressEvent::retry(
                        description,
                        attempt + 1,
                        delay,
                        &error.message,
                    ));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(
                        "Failed to download {} after {} attempts: {}",
                        description,
                        attempt + 1,
                        error.message
                    );
                    return Err(error.with_attempts(attempt + 1));
                }
            }
        }
    }

    fn idle_failure(&self, url: &str, waiting_for: &str) -> FetchError {
        FetchError::new(
            FetchErrorKind::Timeout,
            url,
            format!("no {} within {:?}", waiting_for, self.idle_timeout),
        )
    }

    async fn open(&self, url: &str) -> Result<TransportResponse, FetchError> {
        let response = tokio::time::timeout(self.idle_timeout, self.transport.get(url))
            .await
            .map_err(|_| self.idle_failure(url, "response"))?
            .map_err(|e| transport_failure(url, e))?;

        if !response.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::NetworkFailure,
                url,
                format!("HTTP {}", response.status),
            ));
        }
        Ok(response)
    }

    /// Next body chunk; a slow body is fine as long as it keeps moving.
    async fn next_chunk(&self, url: &str, body: &mut BodyStream) -> Result<Option<Bytes>, FetchError> {
        match tokio::time::timeout(self.idle_timeout, body.next()).await {
            Err(_) => Err(self.idle_failure(url, "data")),
            Ok(None) => Ok(None),
            Ok(Some(chunk)) => chunk.map(Some).map_err(|e| transport_failure(url, e)),
        }
    }

    async fn attempt_to_file(
        &self,
        url: &str,
        dest: &Path,
        description: &str,
        expected_sha1: Option<&str>,
    ) -> Result<u64, FetchError> {
        let temp = TempFile::beside(dest);
        let response = self.open(url).await?;
        let total = response.content_length;
        let mut body = response.body;

        let io_failure =
            |e: std::io::Error| FetchError::new(FetchErrorKind::NetworkFailure, url, format!("io: {}", e));

        let mut hasher = Sha1::new();
        let mut downloaded = 0_u64;
        let mut last_reported = 0_u64;

        // Keep the handle scoped so it is closed before the rename.
        {
            let mut file = tokio::fs::File::create(temp.path()).await.map_err(io_failure)?;
            while let Some(chunk) = self.next_chunk(url, &mut body).await? {
                hasher.update(&chunk);
                file.write_all(&chunk).await.map_err(io_failure)?;
                downloaded += chunk.len() as u64;

                if downloaded - last_reported >= PROGRESS_GRANULARITY {
                    last_reported = downloaded;
                    self.sink.emit(ProgressEvent::FetchProgress {
                        description: description.to_string(),
                        bytes_downloaded: downloaded,
                        total_bytes: total,
                    });
                }
            }
            file.flush().await.map_err(io_failure)?;
            file.sync_all().await.map_err(io_failure)?;
        }

        self.sink.emit(ProgressEvent::FetchProgress {
            description: description.to_string(),
            bytes_downloaded: downloaded,
            total_bytes: total,
        });

        if let Some(expected) = expected_sha1 {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(FetchError::new(
                    FetchErrorKind::HashMismatch,
                    url,
                    format!("expected {}, got {}", expected, actual),
                ));
            }
        }

        tokio::fs::rename(temp.path(), dest).await.map_err(io_failure)?;
        temp.persisted();
        Ok(downloaded)
    }

    async fn attempt_to_memory(&self, url: &str, description: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.open(url).await?;
        let total = response.content_length;
        let mut body = response.body;
        let mut buffer = Vec::with_capacity(total.unwrap_or(0) as usize);
        while let Some(chunk) = self.next_chunk(url, &mut body).await? {
            buffer.extend_from_slice(&chunk);
        }
        self.sink.emit(ProgressEvent::FetchProgress {
            description: description.to_string(),
            bytes_downloaded: buffer.len() as u64,
            total_bytes: total,
        });
        Ok(buffer)
    }
}

fn transport_failure(url: &str, error: TransportError) -> FetchError {
    let kind = if error.timed_out {
        FetchErrorKind::Timeout
    } else {
        FetchErrorKind::NetworkFailure
    };
    FetchError::new(kind, url, error.message)
}

/// Temp sibling of a destination; removed on drop unless persisted.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn beside(dest: &Path) -> Self {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "download".to_string());
        let path = dest.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4().simple()));
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn persisted(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Hex SHA-1 of an in-memory buffer.
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hex SHA-1 of a file, read in chunks.
pub async fn sha1_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0_u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Whether `path` exists and hashes to `expected`.
pub async fn is_present_and_verified(path: &Path, expected: &str) -> bool {
    match sha1_file(path).await {
        Ok(actual) => actual.eq_ignore_ascii_case(expected),
        Err(_) => false,
    }
}
