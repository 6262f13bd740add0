use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a [`crate::Runtime`] and its embedder.
/// The runtime polls it before every statement and every call; once set, the running
/// `execute` call unwinds with [`dolls_source::EvalError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Can be called from any thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears a previous request so the runtime can execute again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
