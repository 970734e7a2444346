//! Scenario runner
//!
//! Each scenario builds a fresh session over a seeded in-memory store and
//! checks one end-to-end behaviour with real (short) timers.

use anyhow::{bail, ensure, Context};
use ctrack_core::prelude::*;
use ctrack_model::{collections, fields, Document};
use ctrack_notify::{RecordingSurface, ToastKind};
use ctrack_store::{DocumentStore, MemoryDocumentStore};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

const CONTROL_ID: &str = "controlId";

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ScenarioReport {
    pub(crate) name: &'static str,
    pub(crate) passed: bool,
    pub(crate) detail: String,
    pub(crate) elapsed_ms: u128,
}

struct Fixture {
    store: Arc<MemoryDocumentStore>,
    surface: Arc<RecordingSurface>,
    session: UndoSession,
}

/// Demo data for the simulator run
///
/// `ctrack-test-utils` is a dev-dependency only, so the binary seeds its own
/// store: two controls, with tasks `t1` and `t2` under `c1`.
fn seed_store() -> Arc<MemoryDocumentStore> {
    let control = |title: &str, order: i64| -> Document {
        let mut doc = Document::new();
        doc.insert(fields::TITLE.to_string(), json!(title));
        doc.insert(fields::STATUS.to_string(), json!("open"));
        doc.insert(fields::ORDER.to_string(), json!(order));
        doc
    };
    let task = |control_id: &str, title: &str| -> Document {
        let mut doc = Document::new();
        doc.insert(CONTROL_ID.to_string(), json!(control_id));
        doc.insert(fields::TITLE.to_string(), json!(title));
        doc
    };

    let store = Arc::new(MemoryDocumentStore::new());
    store.insert(DocRef::control("c1"), control("Quarterly access review", 0));
    store.insert(DocRef::control("c2"), control("Vendor risk assessment", 1));
    store.insert(DocRef::task("t1"), task("c1", "Export user list"));
    store.insert(DocRef::task("t2"), task("c1", "Review admin grants"));
    store
}

fn fixture(config: &TrackerConfig, actor: Option<Actor>) -> Fixture {
    let store = seed_store();
    let surface = Arc::new(RecordingSurface::new());
    let mut builder = UndoSession::builder(store.clone())
        .with_surface(surface.clone())
        .with_config(config.clone());
    if let Some(actor) = actor {
        builder = builder.with_actor(actor);
    }
    Fixture {
        store,
        surface,
        session: builder.build(),
    }
}

fn operator() -> Actor {
    Actor::new("sim-1", "Simulation Operator", "sim@example.com")
}

async fn delete_cascade(fx: &Fixture, control_id: &str) -> anyhow::Result<Wrapped> {
    let mut targets = vec![DocRef::control(control_id)];
    for (id, doc) in fx.store.scan(collections::TASKS).await? {
        if doc.get(CONTROL_ID) == Some(&json!(control_id)) {
            targets.push(DocRef::task(id));
        }
    }

    let mut snapshot = Vec::with_capacity(targets.len());
    for target in targets {
        let doc = fx.store.get(&target).await?;
        fx.store.delete(&target).await?;
        snapshot.push((target, doc));
    }
    let wrapped = fx.session.wrap(
        NewAction::delete_entity(snapshot),
        AuditDraft::new(None, AuditAction::Delete, collections::CONTROLS, control_id),
    )?;
    Ok(wrapped)
}

/// Undo inside the window restores the records
async fn undo_inside_window(config: &TrackerConfig, window: Duration) -> anyhow::Result<String> {
    let fx = fixture(config, Some(operator()));
    let wrapped = delete_cascade(&fx, "c1").await?;
    let toast = wrapped.toast_id.context("delete offered no prompt")?;

    sleep(window * 3 / 10).await;
    let outcome = fx.session.trigger_undo(toast).await;
    ensure!(matches!(outcome, UndoOutcome::Reversed { .. }), "unexpected outcome {outcome:?}");
    ensure!(fx.store.contains(&DocRef::control("c1")), "control not restored");
    ensure!(fx.session.history().len() == 1, "ledger lost the action");
    ensure!(fx.surface.shown(ToastKind::Confirmation).len() == 1, "no confirmation");

    sleep(window).await;
    ensure!(fx.surface.retired_count(toast) == 1, "prompt retired more than once");
    Ok(format!("undone after {:?}", window * 3 / 10))
}

/// Letting the window lapse keeps the deletion
async fn window_lapses(config: &TrackerConfig, window: Duration) -> anyhow::Result<String> {
    let fx = fixture(config, Some(operator()));
    let wrapped = delete_cascade(&fx, "c1").await?;
    let toast = wrapped.toast_id.context("delete offered no prompt")?;

    sleep(window + window / 5).await;
    ensure!(!fx.session.coordinator().is_active(toast), "prompt still active");
    ensure!(
        fx.session.trigger_undo(toast).await == UndoOutcome::NotActive,
        "late undo ran"
    );
    ensure!(!fx.store.contains(&DocRef::control("c1")), "deletion was reverted");
    ensure!(fx.session.history().len() == 1, "ledger lost the action");
    Ok("deletion stands, action kept as history".to_string())
}

/// Undoing one prompt leaves another untouched
async fn independent_prompts(config: &TrackerConfig) -> anyhow::Result<String> {
    let fx = fixture(config, Some(operator()));
    let first = fx.session.wrap(
        NewAction::update_title(DocRef::control("c1"), json!("Old access review")),
        AuditDraft::new(None, AuditAction::Update, collections::CONTROLS, "c1"),
    )?;
    let second = fx.session.wrap(
        NewAction::update_title(DocRef::control("c2"), json!("Old vendor review")),
        AuditDraft::new(None, AuditAction::Update, collections::CONTROLS, "c2"),
    )?;
    let (Some(first), Some(second)) = (first.toast_id, second.toast_id) else {
        bail!("updates offered no prompt");
    };

    fx.session.trigger_undo(second).await;
    ensure!(fx.session.coordinator().is_active(first), "first prompt was disturbed");
    Ok("second undone, first still pending".to_string())
}

/// A failing reversal reports the reason and keeps the action
async fn failing_reversal(config: &TrackerConfig) -> anyhow::Result<String> {
    let fx = fixture(config, Some(operator()));
    fx.store.poison(DocRef::control("c2"));
    let wrapped = fx.session.wrap(
        NewAction::update_status(DocRef::control("c2"), json!("in_review")),
        AuditDraft::new(None, AuditAction::Update, collections::CONTROLS, "c2"),
    )?;
    let toast = wrapped.toast_id.context("update offered no prompt")?;

    let UndoOutcome::Failed { reason } = fx.session.trigger_undo(toast).await else {
        bail!("reversal unexpectedly succeeded");
    };
    ensure!(fx.surface.shown(ToastKind::Error).len() == 1, "no error prompt");
    ensure!(fx.session.history().len() == 1, "ledger lost the action");
    Ok(reason)
}

/// An audit write without an actor is skipped
async fn anonymous_audit(config: &TrackerConfig) -> anyhow::Result<String> {
    let fx = fixture(config, None);
    let outcome = fx
        .session
        .audit()
        .log_delete(None, collections::CONTROLS, "c1", "Quarterly access review", Default::default())
        .await;
    ensure!(outcome == AppendOutcome::Skipped, "unexpected outcome {outcome:?}");
    let trail = fx.session.audit().read_trail(collections::CONTROLS, "c1").await?;
    ensure!(trail.is_empty(), "anonymous event was written");
    Ok("write skipped".to_string())
}

async fn timed<F, Fut>(name: &'static str, scenario: F) -> ScenarioReport
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<String>>,
{
    let started = Instant::now();
    let result = scenario().await;
    let elapsed_ms = started.elapsed().as_millis();
    match result {
        Ok(detail) => ScenarioReport {
            name,
            passed: true,
            detail,
            elapsed_ms,
        },
        Err(err) => {
            tracing::error!(scenario = name, error = %err, "scenario failed");
            ScenarioReport {
                name,
                passed: false,
                detail: format!("{err:#}"),
                elapsed_ms,
            }
        }
    }
}

/// Run every scenario with the given reversal window
pub(crate) async fn run_all(config: &TrackerConfig) -> Vec<ScenarioReport> {
    let window = config.prompt_settings().default_window;
    vec![
        timed("A: undo inside window", || undo_inside_window(config, window)).await,
        timed("B: window lapses", || window_lapses(config, window)).await,
        timed("C: independent prompts", || independent_prompts(config)).await,
        timed("D: failing reversal", || failing_reversal(config)).await,
        timed("E: audit without actor", || anonymous_audit(config)).await,
    ]
}

/// Wrapped delete followed by an undo, narrated through tracing
pub(crate) async fn demo(config: &TrackerConfig) -> anyhow::Result<()> {
    let fx = fixture(config, Some(operator()));
    let wrapped = delete_cascade(&fx, "c1").await?;
    tracing::info!(action = %wrapped.action_id, records = 3, "deleted control with tasks");

    let toast = wrapped.toast_id.context("delete offered no prompt")?;
    let outcome = fx.session.trigger_undo(toast).await;
    tracing::info!(?outcome, "undo requested");

    wrapped.audit.await?;
    for event in fx.session.audit().read_trail(collections::CONTROLS, "c1").await? {
        tracing::info!(id = %event.id, action = %event.action, at = %event.timestamp, "audit event");
    }
    fx.session.end();
    Ok(())
}
