use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop request between the controller and the orchestrator.
///
/// Raised by the controller at any time; observed by the orchestrator at each
/// progress callback and between jobs. Reset when a new run starts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    raised: Arc<AtomicBool>
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.raised.swap(true, Ordering::SeqCst) {
            tracing::info!("cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }
}
