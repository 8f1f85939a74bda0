//! MAB Artifact Model
//!
//! The record behind every generated micro-app:
//!
//! - [`Artifact`]: one user-initiated creation (instruction, body, status, history)
//! - [`Turn`]: one message of the refinement conversation
//! - [`ArtifactStatus`] / [`StatusEvent`]: the lifecycle state machine
//! - [`codec`]: the durable JSON layout, lenient on load
//!
//! # Example
//!
//! ```rust
//! use mab_artifact::{Artifact, ArtifactStatus};
//!
//! let mut app = Artifact::new("red button");
//! app.complete_generation("<html>RED</html>").unwrap();
//! assert_eq!(app.status(), ArtifactStatus::Ready);
//!
//! let dispatch = app.submit_edit("make it blue").unwrap();
//! assert!(dispatch.prior_history.is_empty());
//! assert_eq!(app.status(), ArtifactStatus::Revising);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
pub mod codec;
mod id;
pub mod status;
mod turn;

pub use artifact::{Artifact, EditDispatch};
pub use codec::{
    decode_collection, encode_collection, encode_collection_with, raw_record_id, DecodedCollection,
};
pub use id::ArtifactId;
pub use status::{allowed_events, next_status, ArtifactStatus, StatusEvent, TransitionError};
pub use turn::{transcript, Speaker, Turn};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
