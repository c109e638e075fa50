use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::cancel::CancellationToken;
use crate::composition::CompositionPlan;
use crate::error::Result;

/// Lifecycle of an export session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportStatus::Completed | ExportStatus::Failed | ExportStatus::Cancelled)
    }

    /// Allowed moves: pending -> running -> terminal, and pending straight
    /// to failed or cancelled. Nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: ExportStatus) -> bool {
        match (self, next) {
            (ExportStatus::Pending, ExportStatus::Running) => true,
            (ExportStatus::Pending, ExportStatus::Failed | ExportStatus::Cancelled) => true,
            (ExportStatus::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportStatus::Pending => "pending",
            ExportStatus::Running => "running",
            ExportStatus::Completed => "completed",
            ExportStatus::Failed => "failed",
            ExportStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A running encode of one composition.
///
/// Progress is only readable, never pushed; callers poll it. Status changes
/// can be awaited through `subscribe`.
pub trait ExportSession: Send + Sync {
    /// Fraction in `[0, 1]`
    fn progress(&self) -> f32;

    fn status(&self) -> ExportStatus;

    fn subscribe(&self) -> watch::Receiver<ExportStatus>;

    /// Request cancellation; the session ends in `Cancelled` eventually
    fn cancel(&self);

    /// Output file, set once the session completes
    fn output_path(&self) -> Option<PathBuf>;

    fn error(&self) -> Option<String>;
}

/// Platform primitive that starts export sessions
pub trait Exporter: Send + Sync {
    /// Start rendering `plan` into `destination`; must be called inside a
    /// tokio runtime.
    fn start(&self, plan: CompositionPlan, destination: PathBuf) -> Result<Arc<dyn ExportSession>>;
}

/// Shared state behind an export session.
///
/// Encoders drive it from their background task; the pipeline reads it.
/// Transitions out of a terminal state are ignored.
#[derive(Debug)]
pub struct SessionState {
    progress: AtomicU32,
    status: watch::Sender<ExportStatus>,
    output: Mutex<Option<PathBuf>>,
    error: Mutex<Option<String>>,
    cancel: CancellationToken,
}

impl SessionState {
    pub fn new() -> Self {
        let (status, _) = watch::channel(ExportStatus::Pending);
        Self {
            progress: AtomicU32::new(0.0_f32.to_bits()),
            status,
            output: Mutex::new(None),
            error: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Token set by `cancel`; encoders check it between units of work
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn set_progress(&self, fraction: f32) {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.progress.store(fraction.to_bits(), Ordering::Release);
    }

    /// Move to `next` if allowed, returning whether it happened
    pub fn transition(&self, next: ExportStatus) -> bool {
        self.status.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    pub fn complete(&self, output: PathBuf) -> bool {
        if !self.status.borrow().can_transition_to(ExportStatus::Completed) {
            return false;
        }
        *self.output.lock().unwrap_or_else(PoisonError::into_inner) = Some(output);
        self.set_progress(1.0);
        self.transition(ExportStatus::Completed)
    }

    pub fn fail<S: Into<String>>(&self, reason: S) -> bool {
        if !self.status.borrow().can_transition_to(ExportStatus::Failed) {
            return false;
        }
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
        self.transition(ExportStatus::Failed)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportSession for SessionState {
    fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Acquire))
    }

    fn status(&self) -> ExportStatus {
        *self.status.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<ExportStatus> {
        self.status.subscribe()
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    fn output_path(&self) -> Option<PathBuf> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn error(&self) -> Option<String> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use ExportStatus::*;

        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Pending));
    }

    #[test]
    fn test_no_transition_out_of_terminal_state() {
        let state = SessionState::new();
        assert!(state.transition(ExportStatus::Running));
        assert!(state.complete(PathBuf::from("/tmp/out.mp4")));

        assert!(!state.transition(ExportStatus::Cancelled));
        assert!(!state.fail("late failure"));
        assert_eq!(state.status(), ExportStatus::Completed);
        assert_eq!(state.error(), None);
        assert_eq!(state.output_path(), Some(PathBuf::from("/tmp/out.mp4")));
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn test_progress_is_clamped() {
        let state = SessionState::new();
        state.set_progress(1.7);
        assert_eq!(state.progress(), 1.0);
        state.set_progress(-0.2);
        assert_eq!(state.progress(), 0.0);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let state = SessionState::new();
        let mut rx = state.subscribe();

        state.transition(ExportStatus::Running);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ExportStatus::Running);
    }
}
