//! Reversal functions
//!
//! A reversal is a zero-argument, one-shot async operation. The coordinator
//! never assumes it is idempotent and runs it at most once.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;

/// Boxed error returned by a failing reversal
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Future produced by a reversal
pub type ReversalFuture = BoxFuture<'static, Result<ReversalAck, BoxError>>;

/// One-shot reversal operation
pub type ReversalFn = Box<dyn FnOnce() -> ReversalFuture + Send>;

/// Acknowledgement from a successful reversal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReversalAck {
    /// Caveat appended to the confirmation, e.g. an external system that
    /// could not be restored
    pub note: Option<String>,
}

impl ReversalAck {
    /// Acknowledge with a caveat
    #[inline]
    #[must_use]
    pub fn with_note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
        }
    }
}

/// Box an async closure into a [`ReversalFn`]
pub fn reversal<F, Fut, E>(f: F) -> ReversalFn
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<ReversalAck, E>> + Send + 'static,
    E: Into<BoxError>,
{
    Box::new(move || f().map(|result| result.map_err(Into::into)).boxed())
}
