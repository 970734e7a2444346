//! Undo session
//!
//! One [`UndoSession`] per signed-in user. It owns the ledger, the prompt
//! coordinator and the audit writer, and ties them together in
//! [`UndoSession::wrap`]: record the mutation, offer a reversible prompt,
//! append the audit event. Nothing here is global; ending the session drops
//! every pending reversal.

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use ctrack_audit::{AppendOutcome, AuditTrailWriter};
use ctrack_ledger::{ActionRecorder, LedgerSnapshot, ReversalError, StrategyRegistry};
use ctrack_model::{ActionId, Actor, AuditDraft, NewAction, ToastId, UndoableAction};
use ctrack_notify::{
    reversal, NotificationCoordinator, ReversalAck, ToastSurface, TracingSurface, UndoOutcome,
};
use ctrack_store::DocumentStore;
use ctrack_timer::TimerRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handles for one wrapped mutation
#[derive(Debug)]
pub struct Wrapped {
    /// Ledger entry
    pub action_id: ActionId,
    /// Reversible prompt, absent when the kind has no reversal strategy
    pub toast_id: Option<ToastId>,
    /// Pending audit append; await to observe it or drop to ignore it
    pub audit: JoinHandle<AppendOutcome>,
}

/// Builder for [`UndoSession`]
pub struct UndoSessionBuilder {
    store: Arc<dyn DocumentStore>,
    surface: Arc<dyn ToastSurface>,
    actor: Option<Actor>,
    config: TrackerConfig,
    strategies: StrategyRegistry,
    timers: Option<TimerRegistry>,
}

impl UndoSessionBuilder {
    /// Attribute audit events to `actor`
    #[inline]
    #[must_use]
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Render prompts on `surface`
    #[inline]
    #[must_use]
    pub fn with_surface(mut self, surface: Arc<dyn ToastSurface>) -> Self {
        self.surface = surface;
        self
    }

    /// Use explicit configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the reversal strategies
    #[inline]
    #[must_use]
    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    /// Share a timer registry with other components
    #[inline]
    #[must_use]
    pub fn with_timers(mut self, timers: TimerRegistry) -> Self {
        self.timers = Some(timers);
        self
    }

    /// Assemble the session
    #[must_use]
    pub fn build(self) -> UndoSession {
        let coordinator = NotificationCoordinator::with_parts(
            self.surface,
            self.timers.unwrap_or_default(),
            self.config.prompt_settings(),
        );
        let audit = AuditTrailWriter::with_settings(Arc::clone(&self.store), self.config.audit_settings());

        UndoSession {
            inner: Arc::new(SessionInner {
                actor: self.actor,
                store: self.store,
                recorder: ActionRecorder::with_retention(self.config.retention()),
                strategies: self.strategies,
                coordinator,
                audit,
                ended: AtomicBool::new(false),
            }),
        }
    }
}

struct SessionInner {
    actor: Option<Actor>,
    store: Arc<dyn DocumentStore>,
    recorder: ActionRecorder,
    strategies: StrategyRegistry,
    coordinator: NotificationCoordinator,
    audit: AuditTrailWriter,
    ended: AtomicBool,
}

/// Undo and audit for one user session
#[derive(Clone)]
pub struct UndoSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for UndoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoSession")
            .field("actor", &self.inner.actor.as_ref().map(|a| &a.id))
            .field("ledger", &self.inner.recorder.len())
            .field("coordinator", &self.inner.coordinator)
            .field("ended", &self.is_ended())
            .finish_non_exhaustive()
    }
}

impl UndoSession {
    /// Start building a session over `store`
    #[must_use]
    pub fn builder(store: Arc<dyn DocumentStore>) -> UndoSessionBuilder {
        UndoSessionBuilder {
            store,
            surface: Arc::new(TracingSurface),
            actor: None,
            config: TrackerConfig::default(),
            strategies: StrategyRegistry::with_defaults(),
            timers: None,
        }
    }

    /// Wrap an already-applied mutation as undoable
    ///
    /// Records `action`, offers a reversible prompt with the configured
    /// window and appends `audit` in the background. The audit draft falls
    /// back to the session actor when it carries none.
    ///
    /// # Errors
    /// [`TrackerError::SessionEnded`] after [`UndoSession::end`].
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn wrap(&self, action: NewAction, audit: AuditDraft) -> Result<Wrapped> {
        self.wrap_for(action, audit, self.inner.coordinator.settings().default_window)
    }

    /// Like [`UndoSession::wrap`] with an explicit reversal window
    ///
    /// If the session ends while the prompt is being shown, the prompt is
    /// withdrawn and `toast_id` is `None`; the audit append still goes out.
    ///
    /// # Errors
    /// [`TrackerError::SessionEnded`] after [`UndoSession::end`].
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn wrap_for(&self, action: NewAction, mut audit: AuditDraft, window: Duration) -> Result<Wrapped> {
        if self.is_ended() {
            return Err(TrackerError::SessionEnded);
        }

        let entry = self.inner.recorder.record_entry(action);
        let mut toast_id = if self.inner.strategies.contains(entry.kind()) {
            let message = entry.description().to_string();
            Some(
                self.inner
                    .coordinator
                    .show_reversible_prompt_for(message, self.reversal_for(Arc::clone(&entry)), window),
            )
        } else {
            tracing::warn!(action = %entry.id(), kind = %entry.kind(), "no reversal strategy; recorded without prompt");
            None
        };

        if audit.actor.is_none() {
            audit.actor.clone_from(&self.inner.actor);
        }
        let audit = self.inner.audit.spawn_append(audit);

        // `end` may have run its teardown between the check above and now.
        if self.is_ended() {
            if let Some(toast) = toast_id.take() {
                self.inner.coordinator.dismiss(toast);
            }
            self.inner.recorder.clear();
        }

        Ok(Wrapped {
            action_id: entry.id(),
            toast_id,
            audit,
        })
    }

    fn reversal_for(&self, action: Arc<UndoableAction>) -> ctrack_notify::ReversalFn {
        let store = Arc::clone(&self.inner.store);
        let strategies = self.inner.strategies.clone();
        let audit = self.inner.audit.clone();
        let actor = self.inner.actor.clone();

        reversal(move || async move {
            let report = strategies.reverse(&action, store.as_ref()).await?;
            // Appended before the confirmation shows; failures are logged by the writer.
            audit.log_undo(actor.as_ref(), &action, &report.restored).await;
            Ok::<_, ReversalError>(ReversalAck {
                note: report.external_note,
            })
        })
    }

    /// Activate the reversal control of a prompt
    pub async fn trigger_undo(&self, toast_id: ToastId) -> UndoOutcome {
        self.inner.coordinator.trigger_reversal(toast_id).await
    }

    /// Close a prompt without reversing
    pub fn dismiss(&self, toast_id: ToastId) -> bool {
        self.inner.coordinator.dismiss(toast_id)
    }

    /// Ledger snapshot, most recent first
    #[must_use]
    pub fn history(&self) -> LedgerSnapshot {
        self.inner.recorder.list()
    }

    /// Forget recorded actions; audit trail and data are untouched
    pub fn clear_history(&self) {
        self.inner.recorder.clear();
    }

    /// Audit writer, for mutations that are logged but not undoable
    #[inline]
    #[must_use]
    pub fn audit(&self) -> &AuditTrailWriter {
        &self.inner.audit
    }

    /// Undo ledger
    #[inline]
    #[must_use]
    pub fn recorder(&self) -> &ActionRecorder {
        &self.inner.recorder
    }

    /// Prompt coordinator
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &NotificationCoordinator {
        &self.inner.coordinator
    }

    /// Session actor
    #[inline]
    #[must_use]
    pub fn actor(&self) -> Option<&Actor> {
        self.inner.actor.as_ref()
    }

    /// Check if [`UndoSession::end`] was called
    #[inline]
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    /// Tear the session down
    ///
    /// Pending reversals are dropped without running and the ledger is
    /// emptied. Returns how many reversible prompts were still open.
    pub fn end(&self) -> usize {
        if self.inner.ended.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let dropped = self.inner.coordinator.shutdown();
        self.inner.recorder.clear();
        tracing::info!(dropped, "undo session ended");
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrack_model::{AuditAction, DocRef};
    use ctrack_notify::RecordingSurface;
    use ctrack_store::MemoryDocumentStore;
    use serde_json::json;
    use std::sync::OnceLock;

    fn session() -> (Arc<MemoryDocumentStore>, Arc<RecordingSurface>, UndoSession) {
        let store = Arc::new(MemoryDocumentStore::new());
        let surface = Arc::new(RecordingSurface::new());
        let session = UndoSession::builder(store.clone())
            .with_surface(surface.clone())
            .with_actor(Actor::new("u-1", "Dana Reyes", "dana@example.com"))
            .build();
        (store, surface, session)
    }

    #[tokio::test(start_paused = true)]
    async fn wrap_records_prompts_and_audits() {
        let (store, surface, session) = session();
        let target = DocRef::control("c1");
        store.insert(target.clone(), serde_json::Map::new());

        let wrapped = session
            .wrap(
                NewAction::update_title(target.clone(), json!("Old")),
                AuditDraft::new(None, AuditAction::Update, "control", "c1"),
            )
            .unwrap();

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].id(), wrapped.action_id);
        assert_eq!(surface.visible().len(), 1);

        let outcome = wrapped.audit.await.unwrap();
        assert_eq!(outcome.event().unwrap().actor_id, "u-1");
    }

    #[tokio::test(start_paused = true)]
    async fn wrap_after_end_is_rejected() {
        let (_, _, session) = session();
        assert_eq!(session.end(), 0);
        assert_eq!(session.end(), 0);

        let err = session
            .wrap(
                NewAction::update_status(DocRef::task("t1"), json!("open")),
                AuditDraft::new(None, AuditAction::Update, "task", "t1"),
            )
            .unwrap_err();
        assert!(matches!(err, TrackerError::SessionEnded));
    }

    #[test]
    #[should_panic]
    fn wrap_outside_a_runtime_panics() {
        let (_, _, session) = session();
        let _ = session.wrap(
            NewAction::update_title(DocRef::control("c1"), json!("Old")),
            AuditDraft::new(None, AuditAction::Update, "control", "c1"),
        );
    }

    /// Ends its session the first time anything is shown
    struct EndingSurface {
        session: OnceLock<UndoSession>,
        inner: RecordingSurface,
    }

    impl ToastSurface for EndingSurface {
        fn show(&self, toast: &ctrack_notify::Toast) {
            self.inner.show(toast);
            if let Some(session) = self.session.get() {
                session.end();
            }
        }

        fn retire(&self, id: ToastId) {
            self.inner.retire(id);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn end_during_wrap_withdraws_the_prompt() {
        let store = Arc::new(MemoryDocumentStore::new());
        let surface = Arc::new(EndingSurface {
            session: OnceLock::new(),
            inner: RecordingSurface::new(),
        });
        let session = UndoSession::builder(store)
            .with_surface(surface.clone())
            .with_actor(Actor::new("u-1", "Dana Reyes", "dana@example.com"))
            .build();
        surface.session.set(session.clone()).unwrap();

        let wrapped = session
            .wrap(
                NewAction::update_title(DocRef::control("c1"), json!("Old")),
                AuditDraft::new(None, AuditAction::Update, "control", "c1"),
            )
            .unwrap();

        assert!(session.is_ended());
        assert!(wrapped.toast_id.is_none());
        assert!(session.coordinator().active_prompts().is_empty());
        assert_eq!(session.coordinator().timers().active_count(), 0);
        assert!(session.history().is_empty());
        assert!(surface.inner.visible().is_empty());
        assert!(wrapped.audit.await.unwrap().is_written());
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_kind_is_recorded_without_prompt() {
        let store = Arc::new(MemoryDocumentStore::new());
        let surface = Arc::new(RecordingSurface::new());
        let session = UndoSession::builder(store)
            .with_surface(surface.clone())
            .with_strategies(StrategyRegistry::new())
            .build();

        let wrapped = session
            .wrap(
                NewAction::update_date(DocRef::task("t1"), json!("2024-05-01")),
                AuditDraft::new(None, AuditAction::Update, "task", "t1"),
            )
            .unwrap();

        assert!(wrapped.toast_id.is_none());
        assert_eq!(session.history().len(), 1);
        assert!(surface.visible().is_empty());
        // No actor anywhere: the audit write is skipped.
        assert_eq!(wrapped.audit.await.unwrap(), AppendOutcome::Skipped);
    }
}
