//! Testing utilities for the control tracker workspace
//!
//! Shared fixtures: sample records, a seeded store and a session wired to a
//! recording surface.

#![allow(missing_docs)]

use ctrack_core::{TrackerConfig, UndoSession};
use ctrack_model::{fields, Actor, DocRef, Document};
use ctrack_notify::RecordingSurface;
use ctrack_store::MemoryDocumentStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub fn test_actor() -> Actor {
    Actor::new("u-100", "Dana Reyes", "dana@example.com")
}

pub fn control_doc(title: &str, order: i64) -> Document {
    let mut doc = Document::new();
    doc.insert(fields::TITLE.to_string(), json!(title));
    doc.insert(fields::STATUS.to_string(), json!("open"));
    doc.insert(fields::DUE_DATE.to_string(), json!("2024-06-30"));
    doc.insert(fields::ORDER.to_string(), json!(order));
    doc
}

pub fn task_doc(control_id: &str, title: &str, assignee: &str) -> Document {
    let mut doc = Document::new();
    doc.insert("controlId".to_string(), json!(control_id));
    doc.insert(fields::TITLE.to_string(), json!(title));
    doc.insert(fields::STATUS.to_string(), json!("todo"));
    doc.insert(fields::ASSIGNEE.to_string(), json!(assignee));
    doc
}

/// Store holding controls `c1..=c3` and tasks `t1`, `t2` under `c1`
pub fn seeded_store() -> Arc<MemoryDocumentStore> {
    let store = Arc::new(MemoryDocumentStore::new());
    store.insert(DocRef::control("c1"), control_doc("Quarterly access review", 0));
    store.insert(DocRef::control("c2"), control_doc("Vendor risk assessment", 1));
    store.insert(DocRef::control("c3"), control_doc("Backup restore drill", 2));
    store.insert(DocRef::task("t1"), task_doc("c1", "Export user list", "tech-1"));
    store.insert(DocRef::task("t2"), task_doc("c1", "Review admin grants", "tech-2"));
    store
}

/// Config with a short window so paused-clock tests advance quickly
pub fn test_config(window: Duration) -> TrackerConfig {
    TrackerConfig::new().with_undo_window(window)
}

pub struct TestSession {
    pub store: Arc<MemoryDocumentStore>,
    pub surface: Arc<RecordingSurface>,
    pub session: UndoSession,
}

pub fn setup_session(config: TrackerConfig) -> TestSession {
    let store = seeded_store();
    let surface = Arc::new(RecordingSurface::new());
    let session = UndoSession::builder(store.clone())
        .with_surface(surface.clone())
        .with_actor(test_actor())
        .with_config(config)
        .build();
    TestSession {
        store,
        surface,
        session,
    }
}

pub fn setup_default_session() -> TestSession {
    setup_session(TrackerConfig::default())
}
