//! Reversal strategies
//!
//! Each [`ActionKind`] maps to one [`ReversalStrategy`]. Adding a kind means
//! registering one more strategy; the recorder and the undo session stay
//! unchanged.

use crate::error::ReversalError;
use async_trait::async_trait;
use ctrack_model::{fields, ActionKind, ActionPayload, DocRef, Document, UndoableAction};
use ctrack_store::{BatchWrite, DocumentStore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Note attached to reversals of externally synced actions
pub const EXTERNAL_SYNC_NOTE: &str = "changes already synced to the ticketing system were not reverted";

/// What a successful reversal touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReversalReport {
    /// Records written back
    pub restored: Vec<DocRef>,
    /// Set when part of the original effect lives outside the store
    pub external_note: Option<String>,
}

impl ReversalReport {
    /// Report for the given restored records
    #[inline]
    #[must_use]
    pub fn restored(restored: Vec<DocRef>) -> Self {
        Self {
            restored,
            external_note: None,
        }
    }
}

/// Inverts one kind of recorded action against the store
#[async_trait]
pub trait ReversalStrategy: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Write the recorded prior state back
    ///
    /// # Errors
    /// Store failures, or [`ReversalError::Partial`] when a multi-record
    /// restore only partly succeeded.
    async fn reverse(
        &self,
        action: &UndoableAction,
        store: &dyn DocumentStore,
    ) -> Result<ReversalReport, ReversalError>;
}

/// Re-creates deleted records from their full snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreDeleted;

#[async_trait]
impl ReversalStrategy for RestoreDeleted {
    fn name(&self) -> &'static str {
        "restore_deleted"
    }

    async fn reverse(
        &self,
        action: &UndoableAction,
        store: &dyn DocumentStore,
    ) -> Result<ReversalReport, ReversalError> {
        let ActionPayload::Deleted { records } = action.payload() else {
            return Err(ReversalError::PayloadMismatch(action.kind()));
        };

        let mut restored = Vec::with_capacity(records.len());
        let mut failed = Vec::new();
        for (doc, snapshot) in records {
            match store.set(doc, snapshot.clone()).await {
                Ok(()) => restored.push(doc.clone()),
                Err(err) => {
                    tracing::warn!(record = %doc, error = %err, "failed to restore deleted record");
                    failed.push((doc.clone(), err));
                }
            }
        }

        if failed.is_empty() {
            return Ok(ReversalReport::restored(restored));
        }
        // Nothing written back: report the first store error as is.
        if restored.is_empty() {
            let (_, err) = failed.swap_remove(0);
            return Err(ReversalError::Store(err));
        }
        Err(ReversalError::Partial { restored, failed })
    }
}

/// Writes a single field's prior value back
#[derive(Debug, Clone, Copy, Default)]
pub struct RevertField;

#[async_trait]
impl ReversalStrategy for RevertField {
    fn name(&self) -> &'static str {
        "revert_field"
    }

    async fn reverse(
        &self,
        action: &UndoableAction,
        store: &dyn DocumentStore,
    ) -> Result<ReversalReport, ReversalError> {
        let ActionPayload::FieldChanged {
            target,
            field,
            previous,
        } = action.payload()
        else {
            return Err(ReversalError::PayloadMismatch(action.kind()));
        };

        let mut patch = Document::new();
        patch.insert(field.clone(), previous.clone());
        store.update(target, patch).await?;
        Ok(ReversalReport::restored(vec![target.clone()]))
    }
}

/// Puts records back in their prior order with one batched write
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOrder;

#[async_trait]
impl ReversalStrategy for RestoreOrder {
    fn name(&self) -> &'static str {
        "restore_order"
    }

    async fn reverse(
        &self,
        action: &UndoableAction,
        store: &dyn DocumentStore,
    ) -> Result<ReversalReport, ReversalError> {
        let ActionPayload::Reordered {
            collection,
            previous,
        } = action.payload()
        else {
            return Err(ReversalError::PayloadMismatch(action.kind()));
        };

        let writes: Vec<BatchWrite> = previous
            .iter()
            .map(|(id, position)| {
                let mut patch = Document::new();
                patch.insert(fields::ORDER.to_string(), Value::from(*position));
                BatchWrite::Update(DocRef::new(collection.clone(), id.clone()), patch)
            })
            .collect();
        let restored = writes.iter().map(|w| w.target().clone()).collect();

        store.batch_write(writes).await?;
        Ok(ReversalReport::restored(restored))
    }
}

/// Maps action kinds to the strategy that reverses them
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<ActionKind, Arc<dyn ReversalStrategy>>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<(&str, &str)> = self
            .strategies
            .iter()
            .map(|(kind, s)| (kind.as_str(), s.name()))
            .collect();
        names.sort_unstable();
        f.debug_struct("StrategyRegistry")
            .field("strategies", &names)
            .finish()
    }
}

impl StrategyRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry covering every built-in [`ActionKind`]
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ActionKind::DeleteEntity, RestoreDeleted);
        for kind in [
            ActionKind::UpdateTitle,
            ActionKind::UpdateDate,
            ActionKind::UpdateStatus,
            ActionKind::UpdateAssignee,
        ] {
            registry.register(kind, RevertField);
        }
        registry.register(ActionKind::ReorderEntities, RestoreOrder);
        registry
    }

    /// Register (or replace) the strategy for `kind`
    pub fn register(&mut self, kind: ActionKind, strategy: impl ReversalStrategy + 'static) {
        self.strategies.insert(kind, Arc::new(strategy));
    }

    /// Strategy for `kind`
    #[inline]
    #[must_use]
    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn ReversalStrategy>> {
        self.strategies.get(&kind).cloned()
    }

    /// Check if `kind` can be reversed
    #[inline]
    #[must_use]
    pub fn contains(&self, kind: ActionKind) -> bool {
        self.strategies.contains_key(&kind)
    }

    /// Kinds with a registered strategy
    #[must_use]
    pub fn kinds(&self) -> Vec<ActionKind> {
        let mut kinds: Vec<ActionKind> = self.strategies.keys().copied().collect();
        kinds.sort_by_key(ActionKind::as_str);
        kinds
    }

    /// Number of registered strategies
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Reverse `action` with the strategy registered for its kind
    ///
    /// # Errors
    /// [`ReversalError::NoStrategy`] for unregistered kinds,
    /// [`ReversalError::PayloadMismatch`] when the payload has the wrong
    /// shape, otherwise whatever the strategy reports.
    pub async fn reverse(
        &self,
        action: &UndoableAction,
        store: &dyn DocumentStore,
    ) -> Result<ReversalReport, ReversalError> {
        let kind = action.kind();
        let strategy = self.get(kind).ok_or(ReversalError::NoStrategy(kind))?;
        if !kind.payload_matches(action.payload()) {
            return Err(ReversalError::PayloadMismatch(kind));
        }

        tracing::debug!(action = %action.id(), %kind, strategy = strategy.name(), "reversing action");
        let mut report = strategy.reverse(action, store).await?;
        if action.is_external() {
            report.external_note = Some(EXTERNAL_SYNC_NOTE.to_string());
        }
        Ok(report)
    }
}
