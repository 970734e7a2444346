//! Timer registry
//!
//! One cancellable countdown per active undo opportunity:
//! - [`TimerRegistry::schedule`] spawns an independent tokio task per handle
//! - fire and cancel are mutually exclusive; whichever claims the handle
//!   first wins and the other becomes a no-op
//! - a zero (or, via [`TimerRegistry::schedule_millis`], negative) duration
//!   fires on the next runtime tick instead of erroring
//!
//! Scheduling requires a running tokio runtime.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Lifecycle state of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Waiting for its deadline
    Pending,
    /// Deadline reached, callback invoked
    Fired,
    /// Cancelled before the deadline
    Cancelled,
}

impl TimerState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            PENDING => Self::Pending,
            FIRED => Self::Fired,
            _ => Self::Cancelled,
        }
    }
}

/// Owning reference to one scheduled countdown
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: u64,
    key: Arc<str>,
    state: Arc<AtomicU8>,
}

impl TimerHandle {
    /// Registry-unique handle id
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Caller-supplied key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> TimerState {
        TimerState::from_raw(self.state.load(Ordering::SeqCst))
    }

    /// Check whether the timer can still fire
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == TimerState::Pending
    }

    fn claim(&self, outcome: u8) -> bool {
        self.state
            .compare_exchange(PENDING, outcome, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[derive(Debug)]
struct TimerEntry {
    handle: TimerHandle,
    abort: Mutex<Option<AbortHandle>>,
}

#[derive(Debug, Default)]
struct Inner {
    timers: DashMap<u64, TimerEntry>,
    next_id: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for entry in self.timers.iter() {
            if entry.handle.claim(CANCELLED) {
                if let Some(abort) = entry.abort.lock().take() {
                    abort.abort();
                }
            }
        }
    }
}

/// Registry of independent countdowns
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    inner: Arc<Inner>,
}

impl TimerRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_fire` to run once `duration` has elapsed
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn schedule<F>(&self, key: impl Into<String>, duration: Duration, on_fire: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = TimerHandle {
            id,
            key: Arc::from(key.into()),
            state: Arc::new(AtomicU8::new(PENDING)),
        };

        // Register before spawning so a zero-length timer can always find
        // (and remove) its own entry.
        self.inner.timers.insert(
            id,
            TimerEntry {
                handle: handle.clone(),
                abort: Mutex::new(None),
            },
        );

        let task_handle = handle.clone();
        let registry = Arc::downgrade(&self.inner);
        let join = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            fire(&registry, &task_handle, on_fire);
        });

        if let Some(entry) = self.inner.timers.get(&id) {
            *entry.abort.lock() = Some(join.abort_handle());
        }

        tracing::debug!(timer = id, key = %handle.key, ?duration, "timer scheduled");
        handle
    }

    /// Schedule with a signed millisecond duration; non-positive fires on the next tick
    pub fn schedule_millis<F>(&self, key: impl Into<String>, millis: i64, on_fire: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let duration = u64::try_from(millis).map_or(Duration::ZERO, Duration::from_millis);
        self.schedule(key, duration, on_fire)
    }

    /// Cancel a timer
    ///
    /// Returns `true` only if this call prevented the timer from firing.
    /// Cancelling a fired or already-cancelled timer is a no-op.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        if !handle.claim(CANCELLED) {
            return false;
        }
        if let Some((_, entry)) = self.inner.timers.remove(&handle.id) {
            if let Some(abort) = entry.abort.lock().take() {
                abort.abort();
            }
        }
        tracing::debug!(timer = handle.id, key = %handle.key, "timer cancelled");
        true
    }

    /// Check whether `handle` is still waiting
    #[inline]
    #[must_use]
    pub fn is_pending(&self, handle: &TimerHandle) -> bool {
        handle.is_pending()
    }

    /// Number of timers that have neither fired nor been cancelled
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.timers.len()
    }

    /// Cancel every pending timer, returning how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<TimerHandle> = self
            .inner
            .timers
            .iter()
            .map(|entry| entry.handle.clone())
            .collect();
        handles.iter().filter(|h| self.cancel(h)).count()
    }
}

fn fire<F>(registry: &Weak<Inner>, handle: &TimerHandle, on_fire: F)
where
    F: FnOnce(),
{
    // A dropped registry means its owner has been torn down.
    let Some(inner) = registry.upgrade() else {
        return;
    };
    if !handle.claim(FIRED) {
        return;
    }
    inner.timers.remove(&handle.id);
    drop(inner);
    tracing::debug!(timer = handle.id, key = %handle.key, "timer fired");
    on_fire();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_duration() {
        let registry = TimerRegistry::new();
        let (count, on_fire) = counter();
        let handle = registry.schedule("a", Duration::from_millis(500), on_fire);

        sleep(Duration::from_millis(499)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(handle.is_pending());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), TimerState::Fired);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let registry = TimerRegistry::new();
        let (count, on_fire) = counter();
        let handle = registry.schedule("a", Duration::from_secs(1), on_fire);

        assert!(registry.cancel(&handle));
        assert!(!registry.cancel(&handle));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), TimerState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_is_noop() {
        let registry = TimerRegistry::new();
        let (count, on_fire) = counter();
        let handle = registry.schedule("a", Duration::from_millis(10), on_fire);

        sleep(Duration::from_millis(20)).await;
        assert!(!registry.cancel(&handle));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), TimerState::Fired);
    }

    #[tokio::test(start_paused = true)]
    async fn non_positive_duration_fires_on_next_tick() {
        let registry = TimerRegistry::new();
        let (zero, on_zero) = counter();
        let (negative, on_negative) = counter();
        registry.schedule("zero", Duration::ZERO, on_zero);
        registry.schedule_millis("negative", -250, on_negative);

        sleep(Duration::from_millis(1)).await;
        assert_eq!(zero.load(Ordering::SeqCst), 1);
        assert_eq!(negative.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timers_are_independent() {
        let registry = TimerRegistry::new();
        let (first, on_first) = counter();
        let (second, on_second) = counter();
        let h1 = registry.schedule("first", Duration::from_secs(10), on_first);
        let h2 = registry.schedule("second", Duration::from_secs(10), on_second);

        assert!(registry.cancel(&h2));
        sleep(Duration::from_secs(11)).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(h1.state(), TimerState::Fired);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_and_drop_release_timers() {
        let registry = TimerRegistry::new();
        let (count, on_fire) = counter();
        registry.schedule("a", Duration::from_secs(1), on_fire);
        let (count_b, on_b) = counter();
        registry.schedule("b", Duration::from_secs(1), on_b);

        assert_eq!(registry.active_count(), 2);
        assert_eq!(registry.cancel_all(), 2);
        assert_eq!(registry.active_count(), 0);

        let dropped = TimerRegistry::new();
        let (count_c, on_c) = counter();
        let handle = dropped.schedule("c", Duration::from_secs(1), on_c);
        drop(dropped);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(count_b.load(Ordering::SeqCst), 0);
        assert_eq!(count_c.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), TimerState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn handles_carry_keys_and_unique_ids() {
        let registry = TimerRegistry::new();
        let a = registry.schedule("toast-a", Duration::from_secs(1), || {});
        let b = registry.schedule("toast-b", Duration::from_secs(1), || {});
        assert_eq!(a.key(), "toast-a");
        assert_ne!(a.id(), b.id());
        registry.cancel_all();
    }
}
