//! Session events broadcast to observers

use mab_artifact::{ArtifactId, ArtifactStatus, Turn};

/// Observable change in the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Artifact inserted at the front of the collection
    Created { id: ArtifactId },
    /// Artifact moved to a new status
    StatusChanged {
        id: ArtifactId,
        status: ArtifactStatus,
    },
    /// Turn appended to an artifact's history
    TurnAppended { id: ArtifactId, turn: Turn },
    /// Artifact deleted
    Removed { id: ArtifactId },
    /// Active selection changed
    ActiveChanged { id: Option<ArtifactId> },
}
