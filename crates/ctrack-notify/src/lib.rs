//! Notification coordinator
//!
//! Surfaces transient, dismissible prompts. A reversible prompt carries a
//! "reverse this" affordance that stays live for a bounded window:
//! - activating it before expiry invokes the reversal exactly once
//! - letting the window lapse, or dismissing the prompt, drops the reversal
//!   without running it
//!
//! Exactly one of those terminal transitions happens per prompt. Prompts are
//! independent of each other; each owns its own timer and reversal.
//!
//! Rendering is delegated to a [`ToastSurface`].
//!
//! # Example
//!
//! ```rust
//! use ctrack_notify::{reversal, NotificationCoordinator, RecordingSurface, ReversalAck, UndoOutcome};
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let surface = Arc::new(RecordingSurface::new());
//! let coordinator = NotificationCoordinator::new(surface.clone());
//!
//! let toast = coordinator.show_reversible_prompt(
//!     "Control deleted",
//!     reversal(|| async { Ok::<_, Infallible>(ReversalAck::default()) }),
//! );
//! let outcome = coordinator.trigger_reversal(toast).await;
//! assert!(matches!(outcome, UndoOutcome::Reversed { .. }));
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod coordinator;
pub mod reversal;
pub mod toast;

pub use coordinator::{
    NotificationCoordinator, PromptEvent, PromptResolution, PromptSettings, UndoOutcome,
};
pub use reversal::{reversal, BoxError, ReversalAck, ReversalFn, ReversalFuture};
pub use toast::{RecordingSurface, SurfaceEvent, Toast, ToastKind, ToastSurface, TracingSurface};
