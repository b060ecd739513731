//! Delayed re-invocation of failed operations.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::debug;

/// Runs each scheduled task once after its delay.
///
/// Timers that have not fired are aborted by [`shutdown`](Self::shutdown)
/// or when the scheduler is dropped. Tasks should hold only what they need
/// to retry, never a strong reference back to their owner.
#[derive(Debug, Default)]
pub struct RetryScheduler {
    handles: Mutex<Vec<AbortHandle>>,
}

impl RetryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle.abort_handle());
        debug!(delay_ms = delay.as_millis() as u64, pending = handles.len(), "Scheduled retry");
    }

    /// Number of timers that have not yet completed.
    pub fn pending(&self) -> usize {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.len()
    }

    /// Abort every outstanding timer.
    pub fn shutdown(&self) {
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let count = handles.len();
        for handle in handles {
            handle.abort();
        }
        if count > 0 {
            debug!(count, "Aborted pending retries");
        }
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        let handles = self.handles.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}
