//! End-to-end undo scenarios against the in-memory store

use ctrack_core::prelude::*;
use ctrack_model::{collections, Document};
use ctrack_notify::ToastKind;
use ctrack_store::{DocumentStore, MemoryDocumentStore};
use ctrack_test_utils::{setup_session, test_actor, test_config, TestSession};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

const WINDOW: Duration = Duration::from_millis(10_000);

/// Delete a control and its tasks the way a caller would, then wrap it
async fn delete_control_with_tasks(ctx: &TestSession) -> Wrapped {
    let targets = [DocRef::control("c1"), DocRef::task("t1"), DocRef::task("t2")];
    let mut snapshot: Vec<(DocRef, Document)> = Vec::new();
    for target in &targets {
        snapshot.push((target.clone(), ctx.store.get(target).await.unwrap()));
        ctx.store.delete(target).await.unwrap();
    }

    ctx.session
        .wrap(
            NewAction::delete_entity(snapshot).with_description("Deleted Quarterly access review"),
            AuditDraft::new(None, AuditAction::Delete, collections::CONTROLS, "c1")
                .with_name("Quarterly access review")
                .with_detail("cascadedTasks", 2),
        )
        .unwrap()
}

fn resolutions(rx: &mut broadcast::Receiver<PromptEvent>, id: ToastId) -> Vec<PromptResolution> {
    let mut found = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PromptEvent::Resolved {
            toast_id,
            resolution,
        } = event
        {
            if toast_id == id {
                found.push(resolution);
            }
        }
    }
    found
}

fn seeded_absent(store: &MemoryDocumentStore) -> bool {
    !store.contains(&DocRef::control("c1"))
        && !store.contains(&DocRef::task("t1"))
        && !store.contains(&DocRef::task("t2"))
}

#[tokio::test(start_paused = true)]
async fn undo_inside_window_restores_records() {
    let ctx = setup_session(test_config(WINDOW));
    let mut rx = ctx.session.coordinator().subscribe();
    let wrapped = delete_control_with_tasks(&ctx).await;
    let toast = wrapped.toast_id.unwrap();
    assert!(seeded_absent(&ctx.store));

    sleep(Duration::from_millis(3_000)).await;
    let outcome = ctx.session.trigger_undo(toast).await;

    assert_eq!(outcome, UndoOutcome::Reversed { note: None });
    assert!(ctx.store.contains(&DocRef::control("c1")));
    assert!(ctx.store.contains(&DocRef::task("t1")));
    assert!(ctx.store.contains(&DocRef::task("t2")));

    // Ledger keeps the action as history.
    let history = ctx.session.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id(), wrapped.action_id);

    let confirmations = ctx.surface.shown(ToastKind::Confirmation);
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].message, "Undone: Deleted Quarterly access review");

    // The countdown never fires afterwards.
    sleep(WINDOW).await;
    assert_eq!(resolutions(&mut rx, toast), vec![PromptResolution::Reversed]);
    assert_eq!(ctx.surface.retired_count(toast), 1);

    // Original delete event stays; the undo adds its own event.
    wrapped.audit.await.unwrap();
    let trail = ctx.session.audit().read_trail(collections::CONTROLS, "c1").await.unwrap();
    let actions: Vec<AuditAction> = trail.iter().map(|e| e.action.clone()).collect();
    assert_eq!(actions, vec![AuditAction::Delete, AuditAction::Undo]);
    assert_eq!(trail[1].details["actionId"], serde_json::json!(wrapped.action_id.to_string()));
}

#[tokio::test(start_paused = true)]
async fn window_lapse_leaves_mutation_in_place() {
    let ctx = setup_session(test_config(WINDOW));
    let mut rx = ctx.session.coordinator().subscribe();
    let wrapped = delete_control_with_tasks(&ctx).await;
    let toast = wrapped.toast_id.unwrap();

    sleep(Duration::from_millis(9_999)).await;
    assert!(ctx.session.coordinator().is_active(toast));
    sleep(Duration::from_millis(2)).await;

    assert!(!ctx.session.coordinator().is_active(toast));
    assert_eq!(resolutions(&mut rx, toast), vec![PromptResolution::Expired]);
    assert_eq!(ctx.surface.retired_count(toast), 1);
    assert!(seeded_absent(&ctx.store));

    // Late undo does nothing.
    assert_eq!(ctx.session.trigger_undo(toast).await, UndoOutcome::NotActive);
    assert!(seeded_absent(&ctx.store));
    assert_eq!(ctx.session.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_prompts_are_independent() {
    let ctx = setup_session(test_config(WINDOW));
    let mut rx = ctx.session.coordinator().subscribe();

    let first = ctx
        .session
        .wrap(
            NewAction::update_title(DocRef::control("c2"), serde_json::json!("Vendor risk assessment")),
            AuditDraft::new(None, AuditAction::Update, collections::CONTROLS, "c2"),
        )
        .unwrap();
    sleep(Duration::from_millis(1_000)).await;
    let second = ctx
        .session
        .wrap(
            NewAction::update_status(DocRef::control("c3"), serde_json::json!("open")),
            AuditDraft::new(None, AuditAction::Update, collections::CONTROLS, "c3"),
        )
        .unwrap();
    let (first_toast, second_toast) = (first.toast_id.unwrap(), second.toast_id.unwrap());
    assert_ne!(first_toast, second_toast);

    let outcome = ctx.session.trigger_undo(second_toast).await;
    assert!(matches!(outcome, UndoOutcome::Reversed { .. }));
    assert!(ctx.session.coordinator().is_active(first_toast));

    // First prompt still expires on its own schedule.
    sleep(Duration::from_millis(8_999)).await;
    assert!(ctx.session.coordinator().is_active(first_toast));
    sleep(Duration::from_millis(2)).await;
    assert!(!ctx.session.coordinator().is_active(first_toast));
    assert_eq!(resolutions(&mut rx, first_toast), vec![PromptResolution::Expired]);
}

#[tokio::test(start_paused = true)]
async fn failed_reversal_keeps_action_and_explains() {
    let ctx = setup_session(test_config(WINDOW));
    ctx.store.poison(DocRef::control("c2"));

    let wrapped = ctx
        .session
        .wrap(
            NewAction::update_title(DocRef::control("c2"), serde_json::json!("Old title")),
            AuditDraft::new(None, AuditAction::Update, collections::CONTROLS, "c2"),
        )
        .unwrap();
    let toast = wrapped.toast_id.unwrap();

    let outcome = ctx.session.trigger_undo(toast).await;
    let UndoOutcome::Failed { reason } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(reason.contains("write to controls/c2 timed out"), "{reason}");

    let errors = ctx.surface.shown(ToastKind::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with("Could not undo: "));
    assert!(errors[0].message.contains("timed out"));

    let history = ctx.session.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id(), wrapped.action_id);

    // No undo event for a reversal that did not happen.
    wrapped.audit.await.unwrap();
    let trail = ctx.session.audit().read_trail(collections::CONTROLS, "c2").await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::Update);
}

#[tokio::test(start_paused = true)]
async fn partial_restore_is_reported_distinctly() {
    let ctx = setup_session(test_config(WINDOW));
    let wrapped = delete_control_with_tasks(&ctx).await;
    ctx.store.poison(DocRef::task("t2"));

    let outcome = ctx.session.trigger_undo(wrapped.toast_id.unwrap()).await;
    let UndoOutcome::Failed { reason } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(reason.starts_with("restored 2 of 3 records"), "{reason}");
    assert!(reason.contains("tasks/t2"), "{reason}");
    assert!(ctx.store.contains(&DocRef::control("c1")));
    assert!(ctx.store.contains(&DocRef::task("t1")));
    assert!(!ctx.store.contains(&DocRef::task("t2")));
}

#[tokio::test(start_paused = true)]
async fn external_sync_is_called_out_in_confirmation() {
    let ctx = setup_session(test_config(WINDOW));
    let wrapped = ctx
        .session
        .wrap(
            NewAction::update_assignee(DocRef::task("t1"), serde_json::json!("tech-9")).with_external_sync(),
            AuditDraft::new(None, AuditAction::Update, collections::TASKS, "t1"),
        )
        .unwrap();

    let outcome = ctx.session.trigger_undo(wrapped.toast_id.unwrap()).await;
    let UndoOutcome::Reversed { note: Some(note) } = outcome else {
        panic!("expected a note, got {outcome:?}");
    };
    assert!(note.contains("ticketing system"));
    assert_eq!(
        ctx.store.peek(&DocRef::task("t1")).unwrap()["assigneeId"],
        serde_json::json!("tech-9")
    );
}

#[tokio::test(start_paused = true)]
async fn ending_the_session_drops_pending_reversals() {
    let ctx = setup_session(test_config(WINDOW));
    let wrapped = delete_control_with_tasks(&ctx).await;
    let toast = wrapped.toast_id.unwrap();

    assert_eq!(ctx.session.end(), 1);
    assert_eq!(ctx.session.trigger_undo(toast).await, UndoOutcome::NotActive);
    assert!(ctx.session.history().is_empty());
    assert!(seeded_absent(&ctx.store));
    assert_eq!(ctx.session.coordinator().timers().active_count(), 0);

    // Audit writes issued before the end still land.
    assert!(wrapped.audit.await.unwrap().is_written());
    let logout = ctx.session.audit().log_logout(Some(&test_actor())).await;
    assert!(logout.is_written());
}

#[tokio::test(start_paused = true)]
async fn audit_failure_does_not_block_the_mutation() {
    let ctx = setup_session(test_config(WINDOW));
    ctx.store.fail_next_appends(1);

    let wrapped = ctx
        .session
        .wrap(
            NewAction::update_status(DocRef::control("c3"), serde_json::json!("open")),
            AuditDraft::new(None, AuditAction::Update, collections::CONTROLS, "c3"),
        )
        .unwrap();

    assert!(matches!(wrapped.audit.await.unwrap(), AppendOutcome::Failed(_)));
    assert_eq!(ctx.session.audit().failed_writes(), 1);
    assert!(ctx.session.coordinator().is_active(wrapped.toast_id.unwrap()));
    assert_eq!(ctx.session.history().len(), 1);
}
