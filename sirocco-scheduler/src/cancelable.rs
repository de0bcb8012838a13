use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag for a scheduled registration.
///
/// The caller keeps one clone and the scheduler the other. Cancelling is
/// lock-free and may happen from any thread; the worker observes it the
/// next time it encounters the registration.
///
/// ```
/// use sirocco_scheduler::Cancelable;
///
/// let token = Cancelable::new();
/// let shared = token.clone();
/// assert!(token.cancel());
/// assert!(shared.is_cancelled());
/// assert!(!shared.cancel());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cancelable {
    cancelled: Arc<AtomicBool>,
}

impl Cancelable {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token. Returns true if this call performed the cancellation.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    /// Returns true once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
