//! Error types for MAB Core
//!
//! Only precondition violations reach callers as [`SessionError`]. Provider
//! and persistence failures are absorbed by the controller and turned into
//! status transitions or log lines.

use std::path::PathBuf;

/// Caller-facing controller errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Instruction was empty or whitespace
    #[error("instruction must not be empty")]
    EmptyInstruction,

    /// Gated template used without an active entitlement
    #[error("template '{0}' requires an active entitlement")]
    EntitlementRequired(String),

    /// No catalog entry with this id
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
}

/// Code-generation backend failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// No API key configured
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// Network or client failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("provider returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Response did not have the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Response carried no usable content
    #[error("provider returned no content")]
    EmptyOutput,
}

impl ProviderError {
    /// Failure is likely transient (network, rate limit, server error)
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`MabConfig`](crate::config::MabConfig)
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
