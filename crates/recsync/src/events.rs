//! Notifications about background sync work.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use recsync_core::RecordId;

/// Which operation a retry re-drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryOp {
    Upload,
    Delete,
}

impl fmt::Display for RetryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryOp::Upload => f.write_str("upload"),
            RetryOp::Delete => f.write_str("delete"),
        }
    }
}

/// A pending entry a flush could not deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushFailure {
    pub op: RetryOp,
    pub id: RecordId,
    pub error: String,
}

/// Outcome of one pass over the pending queues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Uploads that reached the service and left the queue.
    pub uploaded: Vec<RecordId>,
    /// Deletions confirmed by the service.
    pub deleted: Vec<RecordId>,
    /// Entries that stay queued.
    pub failed: Vec<FlushFailure>,
}

impl FlushReport {
    /// Returns true if the flush touched nothing.
    pub fn is_empty(&self) -> bool {
        self.uploaded.is_empty() && self.deleted.is_empty() && self.failed.is_empty()
    }
}

/// Something the engine did in the background.
///
/// Subscribe with [`SyncEngine::events`](crate::SyncEngine::events).
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A failed operation will run again after `after`.
    RetryScheduled {
        op: RetryOp,
        id: RecordId,
        attempt: u32,
        after: Duration,
    },
    /// A retried operation reached the service.
    RetrySucceeded { op: RetryOp, id: RecordId, attempt: u32 },
    /// A retried operation failed again.
    RetryFailed {
        op: RetryOp,
        id: RecordId,
        attempt: u32,
        error: String,
    },
    /// The retry budget ran out; the entry waits for the next flush.
    RetryExhausted { op: RetryOp, id: RecordId, attempt: u32 },
    /// A retry fired but there was nothing left to do.
    RetrySkipped { op: RetryOp, id: RecordId },
    /// A flush finished.
    Flushed(FlushReport),
}
