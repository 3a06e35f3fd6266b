use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared counter incremented by every task that succeeds
///
/// Clones share the same underlying value, so the caller keeps a handle and
/// reads it after the batch returns, including after a failed batch.
#[derive(Debug, Clone, Default)]
pub struct SharedCounter {
    value: Arc<AtomicUsize>,
}

impl SharedCounter {
    /// Counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new value
    pub fn increment(&self) -> usize {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current value
    pub fn value(&self) -> usize {
        self.value.load(Ordering::SeqCst)
    }

    /// Reset to zero
    pub fn reset(&self) {
        self.value.store(0, Ordering::SeqCst);
    }
}
