//! MAB configuration
//!
//! Loaded from TOML; every section and field is optional and falls back to
//! the defaults below. Secrets never live in the file: each backend names
//! the environment variable holding its API key.
//!
//! ```toml
//! [provider]
//! model = "gemini-2.5-flash"
//! temperature = 0.7
//!
//! [entitlements]
//! app_user_id = "user-123"
//!
//! [store]
//! path = ".mab/artifacts.json"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MabConfig {
    /// Code-generation backend
    pub provider: ProviderConfig,
    /// Billing / entitlement backend
    pub entitlements: EntitlementConfig,
    /// Durable artifact collection
    pub store: StoreConfig,
    /// Controller tuning
    pub session: SessionConfig,
}

impl MabConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on invalid TOML or mistyped fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if unreadable, `ConfigError::Parse` if invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if it exists, defaults otherwise
    ///
    /// # Errors
    /// Same as [`load`](Self::load) for an existing file.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// With store path
    #[inline]
    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }

    /// With generation model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.provider.model = model.into();
        self
    }
}

/// Code-generation backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL (up to and including the version segment)
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-request transport timeout
    pub timeout_secs: u64,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
            timeout_secs: 120,
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

impl ProviderConfig {
    /// API key from the environment, if set and non-empty
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        read_key(&self.api_key_env)
    }
}

/// Entitlement backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementConfig {
    /// API base URL
    pub endpoint: String,
    /// Subscriber the entitlements belong to
    pub app_user_id: Option<String>,
    /// Billing platform header value
    pub platform: String,
    /// Package (or product, or offering) purchased when none is named
    pub offer: String,
    /// Per-request transport timeout
    pub timeout_secs: u64,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Environment variable holding the checkout receipt token
    pub fetch_token_env: String,
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.revenuecat.com/v1".to_string(),
            app_user_id: None,
            platform: "stripe".to_string(),
            offer: "pro_monthly".to_string(),
            timeout_secs: 30,
            api_key_env: "REVENUECAT_API_KEY".to_string(),
            fetch_token_env: "REVENUECAT_FETCH_TOKEN".to_string(),
        }
    }
}

impl EntitlementConfig {
    /// API key from the environment, if set and non-empty
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        read_key(&self.api_key_env)
    }

    /// Checkout receipt token from the environment, if set and non-empty
    #[must_use]
    pub fn fetch_token(&self) -> Option<String> {
        read_key(&self.fetch_token_env)
    }
}

/// Durable collection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding the collection
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".mab/artifacts.json"),
        }
    }
}

/// Controller tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Buffered events per subscriber before lagging
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { event_capacity: 256 }
    }
}

fn read_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}
