mod fetcher;
mod progress;
mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use fetcher::{
    is_present_and_verified, sha1_file, sha1_hex, AbortSignal, ArtifactFetcher, FetchJob,
    FetchOutcome, JobResult,
};
pub use progress::{NoopSink, ProgressEvent, ProgressSink, TracingSink};
pub use retry::RetryPolicy;
