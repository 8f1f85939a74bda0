//! MAB Store
//!
//! Holds the artifact collection for a session and persists it as one opaque
//! blob:
//!
//! - [`ArtifactStore`]: newest-first collection with `load_all`, `save_all`,
//!   `insert_front`, `update_by_id` and `remove_by_id`
//! - [`BlobStore`]: where the encoded collection lives ([`FileBlobStore`],
//!   [`MemoryBlobStore`])

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod blob;
mod error;
mod store;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use error::StoreError;
pub use store::ArtifactStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
