//! Toasts and the surfaces that render them

use ctrack_model::ToastId;
use parking_lot::Mutex;
use std::time::Duration;

/// What a toast is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastKind {
    /// Carries a reversal control
    Reversible,
    /// Reversal succeeded
    Confirmation,
    /// Reversal failed
    Error,
    /// Plain informational message
    Info,
}

/// A single on-screen prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Prompt id
    pub id: ToastId,
    /// Purpose
    pub kind: ToastKind,
    /// Text shown to the user
    pub message: String,
    /// How long the toast stays up
    pub duration: Duration,
}

impl Toast {
    /// Whether the toast offers a reversal control
    #[inline]
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        self.kind == ToastKind::Reversible
    }
}

/// Renders toasts; implemented by the UI layer
pub trait ToastSurface: Send + Sync {
    /// Put a toast on screen
    fn show(&self, toast: &Toast);

    /// Take a toast off screen
    fn retire(&self, id: ToastId);
}

/// Surface that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSurface;

impl ToastSurface for TracingSurface {
    fn show(&self, toast: &Toast) {
        tracing::info!(toast = %toast.id, kind = ?toast.kind, message = %toast.message, "toast shown");
    }

    fn retire(&self, id: ToastId) {
        tracing::debug!(toast = %id, "toast retired");
    }
}

/// Something that happened on a [`RecordingSurface`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Toast displayed
    Shown(Toast),
    /// Toast removed
    Retired(ToastId),
}

/// Surface that keeps a history of what it rendered
#[derive(Debug, Default)]
pub struct RecordingSurface {
    events: Mutex<Vec<SurfaceEvent>>,
}

impl RecordingSurface {
    /// Create an empty surface
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything rendered so far, in order
    #[must_use]
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().clone()
    }

    /// Toasts shown and not yet retired
    #[must_use]
    pub fn visible(&self) -> Vec<Toast> {
        let events = self.events.lock();
        let mut visible: Vec<Toast> = Vec::new();
        for event in events.iter() {
            match event {
                SurfaceEvent::Shown(toast) => visible.push(toast.clone()),
                SurfaceEvent::Retired(id) => visible.retain(|t| t.id != *id),
            }
        }
        visible
    }

    /// All toasts of `kind` ever shown
    #[must_use]
    pub fn shown(&self, kind: ToastKind) -> Vec<Toast> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SurfaceEvent::Shown(toast) if toast.kind == kind => Some(toast.clone()),
                _ => None,
            })
            .collect()
    }

    /// How many times `id` was retired
    #[must_use]
    pub fn retired_count(&self, id: ToastId) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, SurfaceEvent::Retired(r) if *r == id))
            .count()
    }
}

impl ToastSurface for RecordingSurface {
    fn show(&self, toast: &Toast) {
        self.events.lock().push(SurfaceEvent::Shown(toast.clone()));
    }

    fn retire(&self, id: ToastId) {
        self.events.lock().push(SurfaceEvent::Retired(id));
    }
}
