pub mod directory;
pub mod error;
pub mod form;
pub mod interview;
pub mod sequencer;
pub mod session;
pub mod speech;
pub mod steps;
pub mod timers;

use serde::Serialize;
use steps::FormField;

/// Represents commands that the core logic (`StepSequencer`) issues to the host.
///
/// This enum is the primary API for decoupling the wizard's decision-making
/// from whatever renders the form and the notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// An answer was accepted; the host form should store it under `field`.
    UpdateField { field: FormField, value: String },
    /// Show a user-visible notification (a toast in a browser host).
    Notify(Notice),
    /// The session has ended and the wizard should be hidden.
    Close,
}

/// A short user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}
