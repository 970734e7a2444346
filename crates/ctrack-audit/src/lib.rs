//! Audit trail
//!
//! [`AuditTrailWriter`] appends one immutable [`AuditEvent`](ctrack_model::AuditEvent)
//! per significant mutation to an append-only collection. The store assigns
//! the id and the server timestamp; that timestamp is the only ordering the
//! trail has.
//!
//! Writes are fire-and-observe. A failed write is logged and counted but
//! never rolls back or blocks the mutation it describes.

#![warn(unreachable_pub)]

pub mod redact;
pub mod writer;

pub use redact::{is_secret_key, redact_details, REDACTED};
pub use writer::{AppendOutcome, AuditSettings, AuditTrailWriter};
