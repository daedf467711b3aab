//! Progress reporting and cooperative cancellation shared by pipeline stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives incremental progress units from a running stage. Sinks may be
/// called from a worker thread.
pub trait ProgressSink: Send + Sync {
    /// A stage starts; it will report `total` units.
    fn begin(&self, stage: &str, total: u32);

    /// One more unit of the current stage is done.
    fn advance(&self, detail: &str);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn begin(&self, _stage: &str, _total: u32) {}
    fn advance(&self, _detail: &str) {}
}

/// Shared cancellation flag, checked between coarse stages only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
