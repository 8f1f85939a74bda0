//! Artifact status state machine
//!
//! | From     | Event               | To       |
//! |----------|---------------------|----------|
//! | Pending  | GenerationSucceeded | Ready    |
//! | Pending  | GenerationFailed    | Failed   |
//! | Ready    | EditSubmitted       | Revising |
//! | Revising | EditSucceeded       | Ready    |
//! | Revising | EditFailed          | Ready    |
//!
//! `Failed` has no outgoing transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    /// First generation in flight
    #[serde(alias = "generating")]
    Pending,
    /// Body is usable
    Ready,
    /// First generation failed
    #[serde(alias = "error")]
    Failed,
    /// Edit in flight
    #[serde(alias = "updating")]
    Revising,
}

impl ArtifactStatus {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Pending => "pending",
            ArtifactStatus::Ready => "ready",
            ArtifactStatus::Failed => "failed",
            ArtifactStatus::Revising => "revising",
        }
    }

    /// A request is outstanding for the artifact
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, ArtifactStatus::Pending | ArtifactStatus::Revising)
    }

    /// No event leaves this status
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        allowed_events(*self).is_empty()
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusEvent {
    /// Provider returned a body for a fresh creation
    GenerationSucceeded,
    /// Provider failed a fresh creation
    GenerationFailed,
    /// User submitted an edit instruction
    EditSubmitted,
    /// Provider returned a revised body
    EditSucceeded,
    /// Provider failed a revision
    EditFailed,
}

/// Rejected transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Event not accepted in the current status
    #[error("illegal transition: {event:?} while {from}")]
    Illegal {
        /// Status at the time of the event
        from: ArtifactStatus,
        /// Rejected event
        event: StatusEvent,
    },
}

/// Events accepted in `from`
#[must_use]
pub fn allowed_events(from: ArtifactStatus) -> Vec<StatusEvent> {
    use StatusEvent::*;
    match from {
        ArtifactStatus::Pending => vec![GenerationSucceeded, GenerationFailed],
        ArtifactStatus::Ready => vec![EditSubmitted],
        ArtifactStatus::Revising => vec![EditSucceeded, EditFailed],
        ArtifactStatus::Failed => vec![],
    }
}

/// Resolve the status reached by applying `event` in `from`.
///
/// # Errors
/// `TransitionError::Illegal` when the event is not accepted in `from`.
pub fn next_status(
    from: ArtifactStatus,
    event: StatusEvent,
) -> Result<ArtifactStatus, TransitionError> {
    use ArtifactStatus::*;
    use StatusEvent::*;
    match (from, event) {
        (Pending, GenerationSucceeded) => Ok(Ready),
        (Pending, GenerationFailed) => Ok(Failed),
        (Ready, EditSubmitted) => Ok(Revising),
        (Revising, EditSucceeded | EditFailed) => Ok(Ready),
        _ => Err(TransitionError::Illegal { from, event }),
    }
}
