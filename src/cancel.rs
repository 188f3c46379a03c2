//! Cooperative cancellation
//!
//! The simulation driver polls a [`CancelFlag`] once per iteration. Whoever
//! wants the run to stop (a Ctrl-C handler, a test, an observer) only sets
//! the flag; it never touches simulation state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared, cloneable stop request
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run stop at the next iteration boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
