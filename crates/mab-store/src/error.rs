//! Persistence errors

use std::path::PathBuf;

/// Failures while loading or saving the artifact collection
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Collection could not be serialized
    #[error("failed to encode collection: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored bytes are not a collection
    #[error("failed to decode collection: {0}")]
    Decode(#[source] serde_json::Error),

    /// Blob backend rejected the operation
    #[error("blob backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
