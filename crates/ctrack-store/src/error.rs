//! Document store errors

use ctrack_model::DocRef;

/// Failure kinds reported by a document store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Record does not exist
    #[error("record not found: {0}")]
    NotFound(DocRef),

    /// Network or backend hiccup; the same call may succeed later
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Store refused the write (permissions, validation)
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Check if the same call may succeed on retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
