use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::core::launch::LaunchState;

/// Payload pushed to whatever front end observes a launch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Stage {
        state: LaunchState,
    },
    FetchStarted {
        description: String,
        url: String,
        attempt: u32,
    },
    FetchProgress {
        description: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },
    FetchRetry {
        description: String,
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },
    FetchFinished {
        description: String,
        bytes: u64,
    },
    AssetProgress {
        completed: usize,
        succeeded: usize,
        failed: usize,
        total: usize,
    },
    AssetSyncIncomplete {
        failed: usize,
        total: usize,
    },
    LibraryFailed {
        name: String,
        reason: String,
    },
}

impl ProgressEvent {
    pub fn retry(description: &str, attempt: u32, delay: Duration, reason: &str) -> Self {
        ProgressEvent::FetchRetry {
            description: description.to_string(),
            attempt,
            delay_ms: delay.as_millis() as u64,
            reason: reason.to_string(),
        }
    }
}

/// Observer for progress events. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Stage { state } => info!("Launch stage: {:?}", state),
            ProgressEvent::FetchStarted {
                description,
                attempt,
                ..
            } => debug!("Downloading {} (attempt {})", description, attempt),
            ProgressEvent::FetchProgress { .. } => {}
            ProgressEvent::FetchRetry {
                description,
                attempt,
                delay_ms,
                reason,
            } => warn!(
                "Attempt {} for {} failed: {}. Retrying in {}ms",
                attempt, description, reason, delay_ms
            ),
            ProgressEvent::FetchFinished { description, bytes } => {
                debug!("Downloaded {} ({} bytes)", description, bytes)
            }
            ProgressEvent::AssetProgress {
                completed, total, failed, ..
            } => info!("Assets: {}/{} processed, {} failed", completed, total, failed),
            ProgressEvent::AssetSyncIncomplete { failed, total } => {
                warn!("{} of {} assets could not be downloaded", failed, total)
            }
            ProgressEvent::LibraryFailed { name, reason } => {
                warn!("Library {} unavailable: {}", name, reason)
            }
        }
    }
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is watching anymore.
        let _ = self.send(event);
    }
}
