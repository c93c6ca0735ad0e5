use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::FociError;

/// A shared flag used to abort a running search.
///
/// Clones share the same flag, so one clone can be handed to the search while
/// another stays with the caller.
///
/// # Example
///
/// ```
/// use findfoci::cancel::CancelToken;
///
/// let token = CancelToken::new();
/// let shared = token.clone();
/// shared.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Return [`FociError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<(), FociError> {
        if self.is_cancelled() {
            return Err(FociError::Cancelled);
        }
        Ok(())
    }
}
