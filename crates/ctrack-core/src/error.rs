//! Error types for the undo session

use crate::config::ConfigError;
use ctrack_ledger::ReversalError;
use ctrack_store::StoreError;

/// Top-level tracker error
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Document store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Reversal could not be completed
    #[error("reversal failed: {0}")]
    Reversal(#[from] ReversalError),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session was ended; no further mutations can be wrapped
    #[error("undo session has ended")]
    SessionEnded,
}

impl TrackerError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::Reversal(err) => err.is_retryable(),
            Self::Config(_) | Self::SessionEnded => false,
        }
    }
}

/// Result alias for tracker operations
pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
