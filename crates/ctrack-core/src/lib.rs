//! Control tracker core
//!
//! Time-boxed undo over mutations the document store cannot roll back,
//! alongside an append-only audit trail that records every mutation whether
//! or not it is later undone.
//!
//! - [`UndoSession`] wires the pieces together per user session
//! - [`TrackerConfig`] loads durations, retention and audit policy from TOML
//! - [`telemetry::init_tracing`] installs the log subscriber
//!
//! # Example
//!
//! ```rust
//! use ctrack_core::prelude::*;
//! use ctrack_store::MemoryDocumentStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ctrack_core::TrackerError> {
//! let store = Arc::new(MemoryDocumentStore::new());
//! let control = DocRef::control("c1");
//! store.insert(control.clone(), serde_json::Map::new());
//!
//! let session = UndoSession::builder(store.clone())
//!     .with_actor(Actor::new("u-1", "Dana Reyes", "dana@example.com"))
//!     .build();
//!
//! let wrapped = session.wrap(
//!     NewAction::update_title(control.clone(), json!("Quarterly access review")),
//!     AuditDraft::new(None, AuditAction::Update, "control", "c1"),
//! )?;
//!
//! if let Some(toast) = wrapped.toast_id {
//!     assert!(matches!(session.trigger_undo(toast).await, UndoOutcome::Reversed { .. }));
//! }
//! assert_eq!(store.peek(&control).unwrap()["title"], json!("Quarterly access review"));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod session;
pub mod telemetry;

pub use config::{
    AuditConfig, ConfigError, LedgerConfig, TelemetryConfig, TrackerConfig, UndoConfig,
    UNDO_WINDOW_ENV,
};
pub use error::{Result, TrackerError};
pub use session::{UndoSession, UndoSessionBuilder, Wrapped};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for wrapping mutations as undoable
    pub use crate::{TrackerConfig, TrackerError, UndoSession, Wrapped};
    pub use ctrack_audit::{AppendOutcome, AuditTrailWriter};
    pub use ctrack_ledger::{ReversalError, StrategyRegistry};
    pub use ctrack_model::{
        ActionId, ActionKind, Actor, AuditAction, AuditDraft, DocRef, NewAction, ToastId,
    };
    pub use ctrack_notify::{PromptEvent, PromptResolution, UndoOutcome};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
