//! Rollback errors and user-facing notifications
//!
//! Schedulers never propagate failures to the frame loop. A failure
//! disables the session and leaves a [`Notification`] behind for the
//! frontend to display.

use std::collections::VecDeque;

use super::config::{FAILURE_MESSAGE_FRAMES, SETUP_MESSAGE_FRAMES};

/// Run-ahead session failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RollbackError {
    /// The core reports insufficient savestate support
    #[error("core does not support run-ahead")]
    CoreLacksSavestates,
    /// `serialize_size` reported zero
    #[error("core does not support savestates, run-ahead disabled")]
    SaveStateSizeUnknown,
    /// The snapshot buffer for the reported state size could not be allocated
    #[error("failed to allocate run-ahead states")]
    AllocationFailed,
    #[error("run-ahead failed to save state")]
    SaveFailed,
    #[error("run-ahead failed to load state")]
    LoadFailed,
    #[error("run-ahead failed to create a secondary instance")]
    SecondaryUnavailable,
}

impl RollbackError {
    /// Build the notification for this error
    ///
    /// Capability problems are logged only. Setup failures respect
    /// `hide_warnings`; operation failures are always shown.
    pub fn notification(&self, hide_warnings: bool) -> Notification {
        let message = self.to_string();
        match self {
            Self::CoreLacksSavestates => Notification::log_only(message),
            Self::SaveStateSizeUnknown if hide_warnings => Notification::log_only(message),
            Self::SaveStateSizeUnknown => Notification::on_screen(message, SETUP_MESSAGE_FRAMES),
            Self::AllocationFailed if hide_warnings => Notification::log_only(message),
            Self::AllocationFailed => Notification::on_screen(message, SETUP_MESSAGE_FRAMES),
            Self::SaveFailed | Self::LoadFailed | Self::SecondaryUnavailable => {
                Notification::on_screen(message, FAILURE_MESSAGE_FRAMES)
            }
        }
    }
}

/// Preemptive frames failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreemptError {
    /// The core reports insufficient savestate support
    #[error("core does not support preemptive frames")]
    Unsupported,
    /// `serialize_size` reported zero
    #[error("core does not support savestates, preemptive frames disabled")]
    NoSavestates,
    #[error("failed to allocate preemptive frames")]
    AllocationFailed,
    #[error("preemptive frames failed to save state")]
    SaveFailed,
    #[error("preemptive frames failed to load state")]
    LoadFailed,
}

impl PreemptError {
    pub fn notification(&self, hide_warnings: bool) -> Notification {
        if hide_warnings {
            Notification::log_only(self.to_string())
        } else {
            Notification::on_screen(self.to_string(), SETUP_MESSAGE_FRAMES)
        }
    }
}

/// A user-facing warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    /// How long the message stays on screen
    pub duration_frames: u32,
    /// Whether the frontend should show it at all (otherwise it was only logged)
    pub on_screen: bool,
}

impl Notification {
    pub fn on_screen(message: impl Into<String>, duration_frames: u32) -> Self {
        Self {
            message: message.into(),
            duration_frames,
            on_screen: true,
        }
    }

    pub fn log_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration_frames: 0,
            on_screen: false,
        }
    }
}

/// Pending notifications, drained by the frontend once per frame
#[derive(Debug, Default)]
pub struct Notifications {
    queue: VecDeque<Notification>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.queue.push_back(notification);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Take every pending notification, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = Notification> + '_ {
        self.queue.drain(..)
    }
}
