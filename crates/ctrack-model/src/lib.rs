//! Control Tracker shared model
//!
//! Types passed between the undo ledger, the notification layer and the
//! audit trail:
//! - [`ActionId`] / [`ToastId`] identifiers
//! - [`UndoableAction`] and the closed [`ActionKind`] set
//! - [`AuditDraft`] / [`AuditEvent`] records
//! - [`DocRef`] / [`Document`] addressing for the document store
//!
//! # Example
//!
//! ```rust
//! use ctrack_model::{DocRef, NewAction};
//! use serde_json::json;
//!
//! let target = DocRef::control("ctl-7");
//! let action = NewAction::update_title(target, json!("Old title"));
//! assert!(action.kind().payload_matches(action.payload()));
//! ```

pub mod action;
pub mod audit;
pub mod document;
pub mod ids;

pub use action::{ActionKind, ActionPayload, NewAction, UndoableAction};
pub use audit::{Actor, AuditAction, AuditDraft, AuditEvent};
pub use document::{collections, fields, DocRef, Document};
pub use ids::{ActionId, ActionIdGenerator, ToastId};
