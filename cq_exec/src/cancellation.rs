use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ExecError;

/// A cooperative cancellation signal, polled at chunk boundaries by both the
/// sequential and parallel execution paths. Cheap to clone and share across
/// worker threads: cancelling one handle cancels every clone.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns `Err` once cancellation has been observed, naming the chunk
    /// boundary at which the caller stopped.
    pub fn check(&self, chunks_done: usize) -> Result<(), ExecError> {
        if self.is_cancelled() {
            Err(ExecError::Cancelled(format!("stopped after {chunks_done} chunks")))
        } else {
            Ok(())
        }
    }
}
