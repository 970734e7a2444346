//! Reversal errors

use ctrack_model::{ActionKind, DocRef};
use ctrack_store::StoreError;

/// Why a reversal did not (fully) happen
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReversalError {
    /// Nothing registered for this kind
    #[error("no reversal strategy registered for {0}")]
    NoStrategy(ActionKind),

    /// Recorded payload has the wrong shape for its kind
    #[error("payload does not match action kind {0}")]
    PayloadMismatch(ActionKind),

    /// Single store call failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Multi-record reversal where some records could not be restored
    ///
    /// Records in `restored` were written back; nothing is rolled back.
    #[error(
        "restored {} of {} records; {}",
        count(.restored),
        count(.restored) + count(.failed),
        describe_failures(.failed)
    )]
    Partial {
        /// Records written back
        restored: Vec<DocRef>,
        /// Records that failed, with the store error
        failed: Vec<(DocRef, StoreError)>,
    },
}

impl ReversalError {
    /// Check if some records were restored despite the failure
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { restored, .. } if !restored.is_empty())
    }

    /// Check if retrying the same reversal may help
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::Partial { failed, .. } => failed.iter().all(|(_, err)| err.is_retryable()),
            Self::NoStrategy(_) | Self::PayloadMismatch(_) => false,
        }
    }
}

fn count<T>(items: &[T]) -> usize {
    items.len()
}

fn describe_failures(failed: &[(DocRef, StoreError)]) -> String {
    failed
        .iter()
        .map(|(doc, err)| format!("{doc}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}
