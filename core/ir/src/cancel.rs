//! Cooperative cancellation.
//!
//! The pipeline holds no threads of its own; cancellation is a caller-supplied
//! predicate polled at function-boundary granularity during lowering and
//! emission. When the predicate reports true, the current stage discards its
//! partial output and returns a `Cancelled` error.

use std::sync::Arc;

/// A cancellation probe. The default probe never cancels.
#[derive(Clone, Default)]
pub struct Cancellation {
    check: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
}

impl Cancellation {
    /// A probe that never reports cancellation.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// Wraps a caller-supplied predicate.
    #[must_use]
    pub fn with(check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            check: Some(Arc::new(check)),
        }
    }

    /// Polls the predicate.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.check.as_ref().is_some_and(|check| check())
    }
}

impl std::fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancellation")
            .field("armed", &self.check.is_some())
            .finish()
    }
}
