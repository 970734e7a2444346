//! Document store interface
//!
//! The tracker never owns its data; every mutation and every audit append
//! goes through a [`DocumentStore`]. The store offers no multi-document
//! transaction guarantee: [`DocumentStore::batch_write`] is all-or-nothing
//! only at the client level, and callers must tolerate partial application.
//!
//! [`MemoryDocumentStore`] is a complete in-process implementation with
//! fault injection, used by tests and the simulator.

pub mod error;
pub mod memory;

pub use error::StoreError;
pub use memory::MemoryDocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ctrack_model::{DocRef, Document};

/// One operation inside a batched write
#[derive(Debug, Clone, PartialEq)]
pub enum BatchWrite {
    /// Create or overwrite the record
    Set(DocRef, Document),
    /// Merge fields into an existing record
    Update(DocRef, Document),
    /// Remove the record
    Delete(DocRef),
}

impl BatchWrite {
    /// Record addressed by this write
    #[inline]
    #[must_use]
    pub fn target(&self) -> &DocRef {
        match self {
            BatchWrite::Set(r, _) | BatchWrite::Update(r, _) | BatchWrite::Delete(r) => r,
        }
    }
}

/// Result of an append: id and server time assigned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    /// Assigned record id
    pub id: String,
    /// Server-assigned timestamp
    pub timestamp: DateTime<Utc>,
}

/// Field holding the server timestamp on appended records
pub const SERVER_TIMESTAMP_FIELD: &str = "timestamp";

/// Create/read/update/delete by collection and id, plus append-only logs
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a record
    ///
    /// # Errors
    /// `StoreError::NotFound` when the record does not exist.
    async fn get(&self, doc: &DocRef) -> Result<Document, StoreError>;

    /// Create or overwrite a record
    async fn set(&self, doc: &DocRef, fields: Document) -> Result<(), StoreError>;

    /// Merge `fields` into an existing record
    ///
    /// # Errors
    /// `StoreError::NotFound` when the record does not exist.
    async fn update(&self, doc: &DocRef, fields: Document) -> Result<(), StoreError>;

    /// Remove a record
    async fn delete(&self, doc: &DocRef) -> Result<(), StoreError>;

    /// Apply several writes as one client-side batch
    async fn batch_write(&self, writes: Vec<BatchWrite>) -> Result<(), StoreError>;

    /// Append a record to `collection`, stamping it with server time
    async fn append(&self, collection: &str, record: Document) -> Result<Appended, StoreError>;

    /// Every record in `collection`, ordered by id
    async fn scan(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;
}
