//! Audit trail writer
//!
//! Every wrapper normalises to an [`AuditDraft`] and goes through
//! [`AuditTrailWriter::append`]. Failures are logged and counted; they never
//! reach the caller as an error.

use crate::redact::redact_details;
use ctrack_model::{collections, Actor, AuditAction, AuditDraft, AuditEvent, DocRef, Document, UndoableAction};
use ctrack_store::{DocumentStore, StoreError};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Where and how audit events are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSettings {
    /// Append-only collection holding the trail
    pub collection: String,
    /// Total attempts per event; 1 means no retry
    pub max_attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            collection: collections::AUDIT_LOGS.to_string(),
            max_attempts: 1,
            backoff: Duration::from_millis(250),
        }
    }
}

impl AuditSettings {
    /// Use a different collection
    #[inline]
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Retry transient failures up to `max_attempts` total attempts
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }
}

/// What happened to one append
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// Event persisted
    Written(AuditEvent),
    /// No actor for an action that requires one; nothing written
    Skipped,
    /// Store rejected the write after all attempts
    Failed(StoreError),
}

impl AppendOutcome {
    /// Persisted event, if any
    #[inline]
    #[must_use]
    pub fn event(&self) -> Option<&AuditEvent> {
        match self {
            Self::Written(event) => Some(event),
            Self::Skipped | Self::Failed(_) => None,
        }
    }

    /// Check if the event was persisted
    #[inline]
    #[must_use]
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Appends immutable audit events to the document store
#[derive(Clone)]
pub struct AuditTrailWriter {
    store: Arc<dyn DocumentStore>,
    settings: AuditSettings,
    failed: Arc<AtomicU64>,
}

impl std::fmt::Debug for AuditTrailWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrailWriter")
            .field("settings", &self.settings)
            .field("failed_writes", &self.failed_writes())
            .finish_non_exhaustive()
    }
}

impl AuditTrailWriter {
    /// Writer with default settings
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_settings(store, AuditSettings::default())
    }

    /// Writer with explicit settings
    #[must_use]
    pub fn with_settings(store: Arc<dyn DocumentStore>, settings: AuditSettings) -> Self {
        Self {
            store,
            settings,
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &AuditSettings {
        &self.settings
    }

    /// Number of events lost to store failures so far
    #[inline]
    #[must_use]
    pub fn failed_writes(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Append one event
    ///
    /// A draft without an actor is skipped, except for logout which is
    /// written as the anonymous actor.
    pub async fn append(&self, draft: AuditDraft) -> AppendOutcome {
        let AuditDraft {
            actor,
            action,
            entity_type,
            entity_id,
            entity_name,
            mut details,
        } = draft;

        let actor = match actor {
            Some(actor) => actor,
            None if action.is_session_termination() => Actor::anonymous(),
            None => {
                tracing::warn!(%action, %entity_type, %entity_id, "audit event without actor skipped");
                return AppendOutcome::Skipped;
            }
        };

        let redacted = redact_details(&mut details);
        if redacted > 0 {
            tracing::debug!(%action, redacted, "redacted secret audit details");
        }
        let entity_name = entity_name.unwrap_or_else(|| entity_id.clone());

        let record = to_record(&actor, &action, &entity_type, &entity_id, &entity_name, &details);
        match self.write_with_retry(record).await {
            Ok(appended) => {
                tracing::debug!(id = %appended.id, %action, %entity_type, %entity_id, "audit event written");
                AppendOutcome::Written(AuditEvent {
                    id: appended.id,
                    timestamp: appended.timestamp,
                    actor_id: actor.id,
                    actor_name: actor.name,
                    actor_email: actor.email,
                    action,
                    entity_type,
                    entity_id,
                    entity_name,
                    details,
                })
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(%action, %entity_type, %entity_id, error = %err, "audit write failed");
                AppendOutcome::Failed(err)
            }
        }
    }

    async fn write_with_retry(&self, record: Document) -> Result<ctrack_store::Appended, StoreError> {
        let attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.store.append(&self.settings.collection, record.clone()).await {
                Ok(appended) => return Ok(appended),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    tracing::debug!(attempt, error = %err, "retrying audit write");
                    attempt += 1;
                    tokio::time::sleep(self.settings.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Append in the background; the caller may await the handle or drop it
    pub fn spawn_append(&self, draft: AuditDraft) -> JoinHandle<AppendOutcome> {
        let writer = self.clone();
        tokio::spawn(async move { writer.append(draft).await })
    }

    /// Record creation of an entity
    pub async fn log_create(
        &self,
        actor: Option<&Actor>,
        entity_type: &str,
        entity_id: &str,
        entity_name: &str,
        details: Map<String, Value>,
    ) -> AppendOutcome {
        self.append(
            AuditDraft::new(actor.cloned(), AuditAction::Create, entity_type, entity_id)
                .with_name(entity_name)
                .with_details(details),
        )
        .await
    }

    /// Record an update; `changes` maps field names to their new values
    pub async fn log_update(
        &self,
        actor: Option<&Actor>,
        entity_type: &str,
        entity_id: &str,
        entity_name: &str,
        changes: Map<String, Value>,
    ) -> AppendOutcome {
        self.append(
            AuditDraft::new(actor.cloned(), AuditAction::Update, entity_type, entity_id)
                .with_name(entity_name)
                .with_detail("changes", Value::Object(changes)),
        )
        .await
    }

    /// Record deletion of an entity
    pub async fn log_delete(
        &self,
        actor: Option<&Actor>,
        entity_type: &str,
        entity_id: &str,
        entity_name: &str,
        details: Map<String, Value>,
    ) -> AppendOutcome {
        self.append(
            AuditDraft::new(actor.cloned(), AuditAction::Delete, entity_type, entity_id)
                .with_name(entity_name)
                .with_details(details),
        )
        .await
    }

    /// Record one operation applied to many entities
    pub async fn log_bulk(
        &self,
        actor: Option<&Actor>,
        operation: &str,
        entity_type: &str,
        entity_ids: &[String],
    ) -> AppendOutcome {
        self.append(
            AuditDraft::new(actor.cloned(), AuditAction::Bulk(operation.to_string()), entity_type, "bulk")
                .with_name(format!("{} {entity_type}", entity_ids.len()))
                .with_detail("count", entity_ids.len())
                .with_detail("entityIds", json!(entity_ids)),
        )
        .await
    }

    /// Record a sign-in
    pub async fn log_login(&self, actor: &Actor) -> AppendOutcome {
        self.append(
            AuditDraft::new(Some(actor.clone()), AuditAction::Login, "session", actor.id.clone())
                .with_name(actor.name.clone()),
        )
        .await
    }

    /// Record a sign-out; written even when the actor is unknown
    pub async fn log_logout(&self, actor: Option<&Actor>) -> AppendOutcome {
        let entity_id = actor.map_or_else(|| Actor::anonymous().id, |a| a.id.clone());
        self.append(AuditDraft::new(actor.cloned(), AuditAction::Logout, "session", entity_id))
            .await
    }

    /// Record a data export
    pub async fn log_export(
        &self,
        actor: Option<&Actor>,
        entity_type: &str,
        format: &str,
        record_count: usize,
    ) -> AppendOutcome {
        self.append(
            AuditDraft::new(actor.cloned(), AuditAction::Export, entity_type, "export")
                .with_name(format!("{entity_type} export"))
                .with_detail("format", format)
                .with_detail("recordCount", record_count),
        )
        .await
    }

    /// Record a file upload
    pub async fn log_upload(&self, actor: Option<&Actor>, file_name: &str, size_bytes: u64) -> AppendOutcome {
        self.append(
            AuditDraft::new(actor.cloned(), AuditAction::Upload, "file", file_name)
                .with_detail("sizeBytes", size_bytes),
        )
        .await
    }

    /// Record an outbound or inbound API call
    pub async fn log_api_call(
        &self,
        actor: Option<&Actor>,
        method: &str,
        endpoint: &str,
        status: u16,
    ) -> AppendOutcome {
        self.append(
            AuditDraft::new(actor.cloned(), AuditAction::Api(method.to_string()), "api", endpoint)
                .with_detail("method", method.to_uppercase())
                .with_detail("endpoint", endpoint)
                .with_detail("status", status),
        )
        .await
    }

    /// Record a successful reversal of `action`
    ///
    /// The original event for the mutation is left as written.
    pub async fn log_undo(
        &self,
        actor: Option<&Actor>,
        action: &UndoableAction,
        restored: &[DocRef],
    ) -> AppendOutcome {
        let targets = action.payload().targets();
        let (entity_type, entity_id) = targets.first().map_or_else(
            || ("action".to_string(), action.id().to_string()),
            |doc| (doc.collection.clone(), doc.id.clone()),
        );
        let restored: Vec<String> = restored.iter().map(ToString::to_string).collect();

        self.append(
            AuditDraft::new(actor.cloned(), AuditAction::Undo, entity_type, entity_id)
                .with_detail("actionId", action.id().to_string())
                .with_detail("kind", action.kind().as_str())
                .with_detail("description", action.description())
                .with_detail("restored", json!(restored))
                .with_detail("external", action.is_external()),
        )
        .await
    }

    /// Every event for one entity, in store timestamp order
    ///
    /// # Errors
    /// Propagates store failures from the scan.
    pub async fn read_trail(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditEvent>, StoreError> {
        let rows = self.store.scan(&self.settings.collection).await?;
        let mut events: Vec<AuditEvent> = rows
            .into_iter()
            .filter(|(_, doc)| {
                doc.get("entityType").and_then(Value::as_str) == Some(entity_type)
                    && doc.get("entityId").and_then(Value::as_str) == Some(entity_id)
            })
            .filter_map(|(id, mut doc)| {
                doc.insert("id".to_string(), Value::String(id.clone()));
                match serde_json::from_value::<AuditEvent>(Value::Object(doc)) {
                    Ok(event) => Some(event),
                    Err(err) => {
                        tracing::warn!(%id, error = %err, "unreadable audit record skipped");
                        None
                    }
                }
            })
            .collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }
}

fn to_record(
    actor: &Actor,
    action: &AuditAction,
    entity_type: &str,
    entity_id: &str,
    entity_name: &str,
    details: &Map<String, Value>,
) -> Document {
    let mut record = Document::new();
    record.insert("actorId".into(), Value::String(actor.id.clone()));
    record.insert("actorName".into(), Value::String(actor.name.clone()));
    record.insert("actorEmail".into(), Value::String(actor.email.clone()));
    record.insert("action".into(), Value::String(action.tag()));
    record.insert("entityType".into(), Value::String(entity_type.to_string()));
    record.insert("entityId".into(), Value::String(entity_id.to_string()));
    record.insert("entityName".into(), Value::String(entity_name.to_string()));
    record.insert("details".into(), Value::Object(details.clone()));
    record
}
