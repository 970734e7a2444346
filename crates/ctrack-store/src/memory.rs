//! In-memory document store
//!
//! Backed by a [`DashMap`] keyed by [`DocRef`]. Appends get zero-padded
//! sequence ids and strictly increasing server timestamps, so scanning an
//! append-only collection returns records in write order.

use crate::{Appended, BatchWrite, DocumentStore, StoreError, SERVER_TIMESTAMP_FIELD};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ctrack_model::{DocRef, Document};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
struct AppendClock {
    sequence: u64,
    last: Option<DateTime<Utc>>,
}

impl AppendClock {
    fn tick(&mut self) -> (u64, DateTime<Utc>) {
        self.sequence += 1;
        let now = Utc::now();
        let stamp = match self.last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        self.last = Some(stamp);
        (self.sequence, stamp)
    }
}

/// Document store held entirely in process memory
#[derive(Debug)]
pub struct MemoryDocumentStore {
    records: DashMap<DocRef, Document>,
    clock: Mutex<AppendClock>,
    /// Writes to these records fail with `StoreError::Transient`
    poisoned: DashSet<DocRef>,
    /// Remaining appends that will fail
    failing_appends: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            clock: Mutex::new(AppendClock {
                sequence: 0,
                last: None,
            }),
            poisoned: DashSet::new(),
            failing_appends: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seed a record without going through the async interface
    pub fn insert(&self, doc: DocRef, fields: Document) {
        self.records.insert(doc, fields);
    }

    /// Current copy of a record, if present
    #[must_use]
    pub fn peek(&self, doc: &DocRef) -> Option<Document> {
        self.records.get(doc).map(|entry| entry.value().clone())
    }

    /// Check whether a record exists
    #[inline]
    #[must_use]
    pub fn contains(&self, doc: &DocRef) -> bool {
        self.records.contains_key(doc)
    }

    /// Number of records across all collections
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store holds no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of successful write calls (batches count once)
    #[inline]
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every write to `doc` fail until [`heal`](Self::heal) is called
    pub fn poison(&self, doc: DocRef) {
        self.poisoned.insert(doc);
    }

    /// Undo [`poison`](Self::poison)
    pub fn heal(&self, doc: &DocRef) {
        self.poisoned.remove(doc);
    }

    /// Fail the next `count` appends
    pub fn fail_next_appends(&self, count: usize) {
        self.failing_appends.store(count, Ordering::SeqCst);
    }

    fn check_writable(&self, doc: &DocRef) -> Result<(), StoreError> {
        if self.poisoned.contains(doc) {
            return Err(StoreError::Transient(format!("write to {doc} timed out")));
        }
        Ok(())
    }

    fn apply(&self, write: BatchWrite) {
        match write {
            BatchWrite::Set(doc, fields) => {
                self.records.insert(doc, fields);
            }
            BatchWrite::Update(doc, fields) => {
                if let Some(mut existing) = self.records.get_mut(&doc) {
                    existing.extend(fields);
                }
            }
            BatchWrite::Delete(doc) => {
                self.records.remove(&doc);
            }
        }
    }

    fn take_append_failure(&self) -> bool {
        self.failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, doc: &DocRef) -> Result<Document, StoreError> {
        self.peek(doc).ok_or_else(|| StoreError::NotFound(doc.clone()))
    }

    async fn set(&self, doc: &DocRef, fields: Document) -> Result<(), StoreError> {
        self.check_writable(doc)?;
        self.apply(BatchWrite::Set(doc.clone(), fields));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, doc: &DocRef, fields: Document) -> Result<(), StoreError> {
        self.check_writable(doc)?;
        if !self.records.contains_key(doc) {
            return Err(StoreError::NotFound(doc.clone()));
        }
        self.apply(BatchWrite::Update(doc.clone(), fields));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, doc: &DocRef) -> Result<(), StoreError> {
        self.check_writable(doc)?;
        self.apply(BatchWrite::Delete(doc.clone()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn batch_write(&self, writes: Vec<BatchWrite>) -> Result<(), StoreError> {
        // Validate everything first so a rejected batch leaves no trace.
        for write in &writes {
            self.check_writable(write.target())?;
            if let BatchWrite::Update(doc, _) = write {
                if !self.records.contains_key(doc) {
                    return Err(StoreError::NotFound(doc.clone()));
                }
            }
        }
        for write in writes {
            self.apply(write);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append(&self, collection: &str, mut record: Document) -> Result<Appended, StoreError> {
        if self.take_append_failure() {
            tracing::debug!(collection, "injected append failure");
            return Err(StoreError::Transient(format!("append to {collection} failed")));
        }
        let (sequence, timestamp) = self.clock.lock().tick();
        let id = format!("{sequence:012}");
        record.insert(
            SERVER_TIMESTAMP_FIELD.to_string(),
            Value::String(timestamp.to_rfc3339()),
        );
        self.records.insert(DocRef::new(collection, id.clone()), record);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Appended { id, timestamp })
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let mut rows: Vec<(String, Document)> = self
            .records
            .iter()
            .filter(|entry| entry.key().collection == collection)
            .map(|entry| (entry.key().id.clone(), entry.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }
}
