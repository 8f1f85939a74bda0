//! MAB Core - Session Controller
//!
//! Drives the lifecycle of generated micro-apps:
//! - Creates artifacts from instructions or catalog templates
//! - Refines them through edits, one request per artifact at a time
//! - Keeps the collection durable after every observable change
//! - Gates premium templates behind an entitlement check
//!
//! Code generation and billing are external seams ([`CodeGenProvider`],
//! [`EntitlementGate`]); concrete clients live in `mab-providers`.
//!
//! # Example
//!
//! ```rust,ignore
//! use mab_core::prelude::*;
//! use mab_store::{ArtifactStore, FileBlobStore};
//! use std::sync::Arc;
//!
//! # async fn example(provider: Arc<dyn CodeGenProvider>) {
//! let store = ArtifactStore::new(Arc::new(FileBlobStore::new("apps.json")));
//! let session = SessionController::open(
//!     &SessionConfig::default(),
//!     provider,
//!     Arc::new(NoEntitlements),
//!     store,
//! )
//! .await;
//!
//! let id = session.create("red button").unwrap();
//! session.settle(id).await;
//! session.edit(id, "make it blue").unwrap();
//! session.settle_all().await;
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod catalog;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod events;
pub mod provider;
pub mod session;
mod worker;

pub use catalog::{Catalog, Suggestion, TemplateDescriptor};
pub use config::{EntitlementConfig, MabConfig, ProviderConfig, SessionConfig, StoreConfig};
pub use entitlement::{EntitlementGate, NoEntitlements};
pub use error::{ConfigError, ProviderError, SessionError};
pub use events::SessionEvent;
pub use provider::CodeGenProvider;
pub use session::{
    SessionController, CREATE_FAILURE_REASON, EDIT_APOLOGY, EDIT_CONFIRMATION,
    INTERRUPTED_REASON, TEMPLATE_FAILURE_REASON,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a session
    pub use crate::{
        Catalog, CodeGenProvider, EntitlementGate, MabConfig, NoEntitlements, SessionConfig,
        SessionController, SessionError, SessionEvent,
    };
    pub use mab_artifact::{Artifact, ArtifactId, ArtifactStatus, Speaker, Turn};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
