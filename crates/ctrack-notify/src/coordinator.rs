//! Reversible prompt lifecycle
//!
//! Each reversible prompt owns a `PendingReversal` in a concurrent map.
//! Removing that entry is the single claim every terminal transition
//! (reverse, expire, dismiss) must win, so exactly one of them takes effect.

use crate::reversal::{ReversalAck, ReversalFn};
use crate::toast::{Toast, ToastKind, ToastSurface};
use ctrack_model::ToastId;
use ctrack_timer::{TimerHandle, TimerRegistry};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Prompt durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptSettings {
    /// Reversal window when the caller does not pick one
    pub default_window: Duration,
    /// How long a success confirmation stays up
    pub confirmation: Duration,
    /// How long a failure message stays up
    pub error: Duration,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            default_window: Duration::from_millis(10_000),
            confirmation: Duration::from_millis(3_000),
            error: Duration::from_millis(5_000),
        }
    }
}

/// How a reversible prompt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResolution {
    /// Reversal ran and succeeded
    Reversed,
    /// Reversal ran and failed; the mutation is not assumed reversed
    ReversalFailed {
        /// Failure reason shown to the user
        reason: String,
    },
    /// Window lapsed without interaction
    Expired,
    /// User closed the prompt, or the session ended
    Dismissed,
}

/// Lifecycle notifications for observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    /// A toast was rendered
    Shown {
        /// Toast id
        toast_id: ToastId,
        /// Toast purpose
        kind: ToastKind,
    },
    /// A reversible prompt reached its terminal state
    Resolved {
        /// Toast id
        toast_id: ToastId,
        /// Terminal state
        resolution: PromptResolution,
    },
}

/// Result of activating a prompt's reversal control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// Reversal succeeded
    Reversed {
        /// Caveat reported by the reversal
        note: Option<String>,
    },
    /// Reversal failed
    Failed {
        /// Failure reason
        reason: String,
    },
    /// Prompt already expired, dismissed or reversed; nothing ran
    NotActive,
}

struct PendingReversal {
    message: String,
    // Mutex only to make the entry `Sync`; it is never contended.
    reversal: Mutex<ReversalFn>,
    timer: Option<TimerHandle>,
}

struct Inner {
    surface: Arc<dyn ToastSurface>,
    timers: TimerRegistry,
    pending: DashMap<ToastId, PendingReversal>,
    transient: DashMap<ToastId, Option<TimerHandle>>,
    settings: PromptSettings,
    events: broadcast::Sender<PromptEvent>,
}

impl Inner {
    fn publish(&self, event: PromptEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn resolve(&self, toast_id: ToastId, resolution: PromptResolution) {
        self.surface.retire(toast_id);
        self.publish(PromptEvent::Resolved {
            toast_id,
            resolution,
        });
    }

    fn expire(&self, toast_id: ToastId) {
        if let Some((_, pending)) = self.pending.remove(&toast_id) {
            drop(pending);
            tracing::debug!(toast = %toast_id, "undo window expired");
            self.resolve(toast_id, PromptResolution::Expired);
        }
    }

    fn show_transient(self: &Arc<Self>, kind: ToastKind, message: String, duration: Duration) -> ToastId {
        let toast_id = ToastId::new();
        self.surface.show(&Toast {
            id: toast_id,
            kind,
            message,
            duration,
        });
        self.publish(PromptEvent::Shown { toast_id, kind });
        self.transient.insert(toast_id, None);

        let weak = Arc::downgrade(self);
        let handle = self.timers.schedule(toast_id.to_string(), duration, move || {
            if let Some(inner) = weak.upgrade() {
                if inner.transient.remove(&toast_id).is_some() {
                    inner.surface.retire(toast_id);
                }
            }
        });
        match self.transient.get_mut(&toast_id) {
            Some(mut slot) => *slot = Some(handle),
            None => {
                self.timers.cancel(&handle);
            }
        }
        toast_id
    }

    async fn run_reversal(self: Arc<Self>, toast_id: ToastId, pending: PendingReversal) -> UndoOutcome {
        let PendingReversal {
            message, reversal, ..
        } = pending;
        let reversal = reversal.into_inner();

        // The closure runs inside the task too; a panic while building the
        // future must still end in an error prompt.
        let result = match tokio::spawn(async move { reversal().await }).await {
            Ok(result) => result.map_err(|err| err.to_string()),
            Err(join) if join.is_panic() => Err("reversal panicked".to_string()),
            Err(_) => Err("reversal was cancelled".to_string()),
        };

        match result {
            Ok(ReversalAck { note }) => {
                let text = match &note {
                    Some(note) => format!("Undone: {message} ({note})"),
                    None => format!("Undone: {message}"),
                };
                self.show_transient(ToastKind::Confirmation, text, self.settings.confirmation);
                tracing::info!(toast = %toast_id, "reversal succeeded");
                self.resolve(toast_id, PromptResolution::Reversed);
                UndoOutcome::Reversed { note }
            }
            Err(reason) => {
                self.show_transient(
                    ToastKind::Error,
                    format!("Could not undo: {reason}"),
                    self.settings.error,
                );
                tracing::warn!(toast = %toast_id, %reason, "reversal failed");
                self.resolve(
                    toast_id,
                    PromptResolution::ReversalFailed {
                        reason: reason.clone(),
                    },
                );
                UndoOutcome::Failed { reason }
            }
        }
    }
}

/// Shows prompts and arbitrates their reversal windows
#[derive(Clone)]
pub struct NotificationCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for NotificationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCoordinator")
            .field("pending", &self.inner.pending.len())
            .field("transient", &self.inner.transient.len())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl NotificationCoordinator {
    /// Create a coordinator with default durations and its own timers
    #[must_use]
    pub fn new(surface: Arc<dyn ToastSurface>) -> Self {
        Self::with_parts(surface, TimerRegistry::new(), PromptSettings::default())
    }

    /// Create a coordinator from explicit parts
    #[must_use]
    pub fn with_parts(
        surface: Arc<dyn ToastSurface>,
        timers: TimerRegistry,
        settings: PromptSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                surface,
                timers,
                pending: DashMap::new(),
                transient: DashMap::new(),
                settings,
                events,
            }),
        }
    }

    /// Show a reversible prompt with the default window
    pub fn show_reversible_prompt(&self, message: impl Into<String>, reversal: ReversalFn) -> ToastId {
        self.show_reversible_prompt_for(message, reversal, self.inner.settings.default_window)
    }

    /// Show a reversible prompt whose reversal stays available for `window`
    ///
    /// When the window lapses the prompt is retired and `reversal` is dropped
    /// without running; the underlying mutation stands.
    pub fn show_reversible_prompt_for(
        &self,
        message: impl Into<String>,
        reversal: ReversalFn,
        window: Duration,
    ) -> ToastId {
        let toast_id = ToastId::new();
        let message = message.into();

        self.inner.surface.show(&Toast {
            id: toast_id,
            kind: ToastKind::Reversible,
            message: message.clone(),
            duration: window,
        });
        self.inner.publish(PromptEvent::Shown {
            toast_id,
            kind: ToastKind::Reversible,
        });
        self.inner.pending.insert(
            toast_id,
            PendingReversal {
                message,
                reversal: Mutex::new(reversal),
                timer: None,
            },
        );

        let weak = Arc::downgrade(&self.inner);
        let handle = self.inner.timers.schedule(toast_id.to_string(), window, move || {
            if let Some(inner) = weak.upgrade() {
                inner.expire(toast_id);
            }
        });
        match self.inner.pending.get_mut(&toast_id) {
            Some(mut pending) => pending.timer = Some(handle),
            // Already resolved; make sure the countdown is released.
            None => {
                self.inner.timers.cancel(&handle);
            }
        }

        tracing::debug!(toast = %toast_id, ?window, "reversible prompt shown");
        toast_id
    }

    /// Show a plain message that retires itself
    pub fn show_info(&self, message: impl Into<String>) -> ToastId {
        self.inner
            .show_transient(ToastKind::Info, message.into(), self.inner.settings.confirmation)
    }

    /// Activate the reversal control of `toast_id`
    ///
    /// Cancels the countdown and runs the reversal exactly once. The reversal
    /// runs to completion even if the returned future is dropped. Calling
    /// this for an expired, dismissed or already-activated prompt does
    /// nothing and returns [`UndoOutcome::NotActive`].
    pub async fn trigger_reversal(&self, toast_id: ToastId) -> UndoOutcome {
        let Some((_, pending)) = self.inner.pending.remove(&toast_id) else {
            tracing::debug!(toast = %toast_id, "reversal requested for inactive prompt");
            return UndoOutcome::NotActive;
        };
        if let Some(timer) = &pending.timer {
            self.inner.timers.cancel(timer);
        }

        let inner = Arc::clone(&self.inner);
        match tokio::spawn(inner.run_reversal(toast_id, pending)).await {
            Ok(outcome) => outcome,
            Err(join) => UndoOutcome::Failed {
                reason: join.to_string(),
            },
        }
    }

    /// Close a prompt without reversing
    ///
    /// Returns `false` when the toast is no longer on screen.
    pub fn dismiss(&self, toast_id: ToastId) -> bool {
        if let Some((_, pending)) = self.inner.pending.remove(&toast_id) {
            if let Some(timer) = &pending.timer {
                self.inner.timers.cancel(timer);
            }
            drop(pending);
            tracing::debug!(toast = %toast_id, "prompt dismissed");
            self.inner.resolve(toast_id, PromptResolution::Dismissed);
            return true;
        }
        if let Some((_, timer)) = self.inner.transient.remove(&toast_id) {
            if let Some(timer) = timer {
                self.inner.timers.cancel(&timer);
            }
            self.inner.surface.retire(toast_id);
            return true;
        }
        false
    }

    /// Check whether a prompt still offers reversal
    #[inline]
    #[must_use]
    pub fn is_active(&self, toast_id: ToastId) -> bool {
        self.inner.pending.contains_key(&toast_id)
    }

    /// Ids of prompts that still offer reversal
    #[must_use]
    pub fn active_prompts(&self) -> Vec<ToastId> {
        self.inner.pending.iter().map(|entry| *entry.key()).collect()
    }

    /// Observe prompt lifecycle events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PromptEvent> {
        self.inner.events.subscribe()
    }

    /// Configured durations
    #[inline]
    #[must_use]
    pub fn settings(&self) -> PromptSettings {
        self.inner.settings
    }

    /// Timer registry backing the countdowns
    #[inline]
    #[must_use]
    pub fn timers(&self) -> &TimerRegistry {
        &self.inner.timers
    }

    /// Dismiss everything on screen, returning how many reversible prompts were dropped
    pub fn shutdown(&self) -> usize {
        let reversible: Vec<ToastId> = self.active_prompts();
        let dropped = reversible.iter().filter(|id| self.dismiss(**id)).count();
        let transient: Vec<ToastId> = self.inner.transient.iter().map(|e| *e.key()).collect();
        for id in transient {
            self.dismiss(id);
        }
        dropped
    }
}
