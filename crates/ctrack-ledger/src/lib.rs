//! Undo ledger
//!
//! Two halves:
//! - [`ActionRecorder`] keeps the most-recent-first history of wrapped
//!   mutations. Every mutation swaps in a new persistent vector, so
//!   snapshots handed out by [`ActionRecorder::list`] never change.
//! - [`StrategyRegistry`] maps each [`ActionKind`](ctrack_model::ActionKind)
//!   to a [`ReversalStrategy`] that knows how to invert it against a
//!   [`DocumentStore`](ctrack_store::DocumentStore).
//!
//! Recording history and offering an undo prompt are separate decisions;
//! this crate only does the former.

#![warn(unreachable_pub)]

pub mod error;
pub mod recorder;
pub mod strategy;

pub use error::ReversalError;
pub use recorder::{ActionRecorder, LedgerSnapshot, RetentionPolicy};
pub use strategy::{
    ReversalReport, ReversalStrategy, RestoreDeleted, RestoreOrder, RevertField, StrategyRegistry,
    EXTERNAL_SYNC_NOTE,
};
