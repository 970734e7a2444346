//! Action recorder
//!
//! Holds an [`im::Vector`] behind a read-write lock. `record` and `clear`
//! build a new vector and swap it in; readers get an O(1) structural clone.

use chrono::{DateTime, Utc};
use ctrack_model::{ActionId, ActionIdGenerator, NewAction, UndoableAction};
use im::Vector;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Immutable, most-recent-first view of the ledger
pub type LedgerSnapshot = Vector<Arc<UndoableAction>>;

/// Bounds on ledger growth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Keep at most this many actions; older ones fall off
    pub max_entries: Option<usize>,
    /// Drop actions older than this on each `record`
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    /// No bounds at all
    #[inline]
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_entries: None,
            max_age: None,
        }
    }

    /// Cap the number of entries
    #[inline]
    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Expire entries older than `age`
    #[inline]
    #[must_use]
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    fn apply(&self, entries: &mut LedgerSnapshot, now: DateTime<Utc>) -> usize {
        let before = entries.len();
        if let Some(max) = self.max_entries {
            entries.truncate(max.min(entries.len()));
        }
        if let Some(age) = self.max_age.and_then(|a| chrono::Duration::from_std(a).ok()) {
            // Timestamps never decrease, so the oldest entries sit at the back.
            while entries
                .back()
                .is_some_and(|oldest| now.signed_duration_since(oldest.timestamp()) > age)
            {
                entries.pop_back();
            }
        }
        before - entries.len()
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_entries: Some(200),
            max_age: None,
        }
    }
}

#[derive(Debug)]
struct LedgerState {
    entries: LedgerSnapshot,
    ids: ActionIdGenerator,
    last_timestamp: Option<DateTime<Utc>>,
}

/// In-memory undo history, owned by one session
#[derive(Debug)]
pub struct ActionRecorder {
    state: RwLock<LedgerState>,
    retention: RetentionPolicy,
}

impl ActionRecorder {
    /// Create a ledger with the default retention policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(RetentionPolicy::default())
    }

    /// Create a ledger with an explicit retention policy
    #[must_use]
    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            state: RwLock::new(LedgerState {
                entries: Vector::new(),
                ids: ActionIdGenerator::new(),
                last_timestamp: None,
            }),
            retention,
        }
    }

    /// Record a mutation, returning its assigned id
    ///
    /// The action is prepended; its timestamp never precedes the previous
    /// record's, even if the wall clock steps backwards.
    pub fn record(&self, action: NewAction) -> ActionId {
        self.record_entry(action).id()
    }

    /// Record a mutation, returning the stored entry
    ///
    /// The returned handle stays valid after the entry leaves the ledger.
    pub fn record_entry(&self, action: NewAction) -> Arc<UndoableAction> {
        let now = Utc::now();
        let mut state = self.state.write();

        let id = state.ids.next_id();
        let timestamp = state.last_timestamp.map_or(now, |last| last.max(now));
        let kind = action.kind();

        let entry = Arc::new(UndoableAction::from_new(id, timestamp, action));
        let mut next = state.entries.clone();
        next.push_front(Arc::clone(&entry));
        let evicted = self.retention.apply(&mut next, now);

        state.entries = next;
        state.last_timestamp = Some(timestamp);
        drop(state);

        tracing::debug!(action = %id, %kind, evicted, "action recorded");
        entry
    }

    /// Snapshot of the ledger, most recent first
    #[must_use]
    pub fn list(&self) -> LedgerSnapshot {
        self.state.read().entries.clone()
    }

    /// Look up a recorded action
    #[must_use]
    pub fn get(&self, id: ActionId) -> Option<Arc<UndoableAction>> {
        self.state
            .read()
            .entries
            .iter()
            .find(|action| action.id() == id)
            .cloned()
    }

    /// Drop every recorded action
    ///
    /// Audit history and already-applied data mutations are untouched. Ids
    /// issued afterwards never overlap earlier ones.
    pub fn clear(&self) {
        let mut state = self.state.write();
        let dropped = state.entries.len();
        state.entries = Vector::new();
        drop(state);
        tracing::debug!(dropped, "ledger cleared");
    }

    /// Apply the age bound without recording anything
    pub fn evict_expired(&self) -> usize {
        let mut state = self.state.write();
        let mut next = state.entries.clone();
        let evicted = self.retention.apply(&mut next, Utc::now());
        if evicted > 0 {
            state.entries = next;
        }
        evicted
    }

    /// Number of recorded actions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Check if nothing is recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Active retention policy
    #[inline]
    #[must_use]
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }
}

impl Default for ActionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrack_model::{ActionKind, DocRef};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn title_change(n: usize) -> NewAction {
        NewAction::update_title(DocRef::control(format!("c{n}")), json!(format!("title {n}")))
    }

    #[test]
    fn list_is_most_recent_first() {
        let recorder = ActionRecorder::new();
        let a = recorder.record(title_change(1));
        let b = recorder.record(title_change(2));
        let c = recorder.record(title_change(3));

        let ids: Vec<ActionId> = recorder.list().iter().map(|x| x.id()).collect();
        assert_eq!(ids, vec![c, b, a]);
    }

    #[test]
    fn snapshots_are_unaffected_by_later_mutations() {
        let recorder = ActionRecorder::new();
        recorder.record(title_change(1));
        let snapshot = recorder.list();

        recorder.record(title_change(2));
        recorder.clear();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].kind(), ActionKind::UpdateTitle);
        assert!(recorder.list().is_empty());
    }

    #[test]
    fn clear_then_record_uses_fresh_ids() {
        let recorder = ActionRecorder::new();
        let before: Vec<ActionId> = (0..5).map(|n| recorder.record(title_change(n))).collect();
        recorder.clear();
        assert!(recorder.is_empty());

        let after = recorder.record(title_change(99));
        assert!(before.iter().all(|id| *id < after));
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn get_finds_recorded_action() {
        let recorder = ActionRecorder::new();
        let id = recorder.record(title_change(1).with_external_sync());
        let action = recorder.get(id).unwrap();
        assert!(action.is_external());
        assert_eq!(action.description(), "Changed title on controls/c1");
    }

    #[test]
    fn timestamps_never_decrease() {
        let recorder = ActionRecorder::new();
        for n in 0..50 {
            recorder.record(title_change(n));
        }
        let snapshot = recorder.list();
        let stamps: Vec<_> = snapshot.iter().rev().map(|a| a.timestamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn max_entries_drops_oldest() {
        let recorder = ActionRecorder::with_retention(RetentionPolicy::unbounded().with_max_entries(3));
        let ids: Vec<ActionId> = (0..5).map(|n| recorder.record(title_change(n))).collect();

        let kept: Vec<ActionId> = recorder.list().iter().map(|a| a.id()).collect();
        assert_eq!(kept, vec![ids[4], ids[3], ids[2]]);
    }

    #[test]
    fn max_age_evicts_stale_entries() {
        let recorder = ActionRecorder::with_retention(
            RetentionPolicy::unbounded().with_max_age(Duration::from_millis(20)),
        );
        recorder.record(title_change(1));
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(recorder.evict_expired(), 1);
        assert!(recorder.is_empty());

        recorder.record(title_change(2));
        assert_eq!(recorder.evict_expired(), 0);
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn concurrent_records_get_unique_ids() {
        let recorder = Arc::new(ActionRecorder::with_retention(RetentionPolicy::unbounded()));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let recorder = Arc::clone(&recorder);
                std::thread::spawn(move || {
                    (0..250)
                        .map(|n| recorder.record(title_change(t * 1000 + n)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(recorder.len(), 2000);

        // Ledger order matches id order: ids are issued under the write lock.
        let ids: Vec<ActionId> = recorder.list().iter().map(|a| a.id()).collect();
        assert!(ids.windows(2).all(|w| w[0] > w[1]));
    }

    proptest! {
        #[test]
        fn ids_unique_and_ordered(count in 1usize..300, clear_at in 0usize..300) {
            let recorder = ActionRecorder::with_retention(RetentionPolicy::unbounded());
            let mut all = Vec::new();
            for n in 0..count {
                if n == clear_at {
                    recorder.clear();
                }
                all.push(recorder.record(title_change(n)));
            }
            let unique: HashSet<_> = all.iter().collect();
            prop_assert_eq!(unique.len(), all.len());

            let listed: Vec<ActionId> = recorder.list().iter().map(|a| a.id()).collect();
            let mut expected: Vec<ActionId> = all
                .iter()
                .skip(if clear_at < count { clear_at } else { 0 })
                .copied()
                .collect();
            expected.reverse();
            prop_assert_eq!(listed, expected);
        }
    }
}
