//! RevenueCat REST entitlement gate
//!
//! - `GET  /subscribers/{app_user_id}` for entitlements
//! - `POST /receipts` to record a purchase
//! - `GET  /subscribers/{app_user_id}/offerings` for the paywall
//!
//! A purchase names a package from the offerings (by package id, store
//! product id or offering id). The receipt posted for it carries the
//! checkout token configured on the gate and the package's product id.
//!
//! Every failure is logged and reported to the session as "not entitled".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mab_core::{EntitlementConfig, EntitlementGate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Entitlement backend failures
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// API key or subscriber id not configured
    #[error("entitlement backend not configured: {0}")]
    NotConfigured(&'static str),

    /// Network or client failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("entitlement backend returned status {0}")]
    Status(u16),

    /// No package in the offerings matches
    #[error("unknown offer: {0}")]
    UnknownOffer(String),
}

/// One entitlement on the subscriber record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entitlement {
    #[serde(default)]
    pub expires_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub product_identifier: Option<String>,
}

impl Entitlement {
    /// No expiry, or expiry after `now`
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_date.map_or(true, |expires| expires > now)
    }
}

/// Subscriber record
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Subscriber {
    #[serde(default)]
    pub entitlements: BTreeMap<String, Entitlement>,
}

impl Subscriber {
    /// Names of entitlements active at `now`
    #[must_use]
    pub fn active_entitlements(&self, now: DateTime<Utc>) -> Vec<&str> {
        self.entitlements
            .iter()
            .filter(|(_, e)| e.is_active_at(now))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    #[must_use]
    pub fn has_active_entitlement(&self, now: DateTime<Utc>) -> bool {
        self.entitlements.values().any(|e| e.is_active_at(now))
    }
}

#[derive(Debug, Deserialize)]
struct SubscriberResponse {
    subscriber: Subscriber,
}

#[derive(Debug, Serialize)]
struct ReceiptRequest<'a> {
    app_user_id: &'a str,
    fetch_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_id: Option<&'a str>,
}

/// Purchasable package in an offering
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Package {
    pub identifier: String,
    #[serde(default)]
    pub platform_product_identifier: Option<String>,
}

/// Paywall offering
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Offering {
    pub identifier: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub packages: Vec<Package>,
}

/// Offerings for the subscriber
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Offerings {
    #[serde(default)]
    pub current_offering_id: Option<String>,
    #[serde(default)]
    pub offerings: Vec<Offering>,
}

impl Offerings {
    /// Offering marked as current
    #[must_use]
    pub fn current(&self) -> Option<&Offering> {
        let id = self.current_offering_id.as_deref()?;
        self.offerings.iter().find(|o| o.identifier == id)
    }

    /// Package named by `offer`, searching the current offering first
    ///
    /// `offer` matches a package id, a store product id, or an offering id
    /// (which selects that offering's first package).
    #[must_use]
    pub fn package(&self, offer: &str) -> Option<&Package> {
        let current = self.current().into_iter();
        let rest = self
            .offerings
            .iter()
            .filter(|o| Some(o.identifier.as_str()) != self.current_offering_id.as_deref());

        current.chain(rest).find_map(|offering| {
            offering
                .packages
                .iter()
                .find(|p| {
                    p.identifier == offer
                        || p.platform_product_identifier.as_deref() == Some(offer)
                })
                .or_else(|| {
                    (offering.identifier == offer)
                        .then(|| offering.packages.first())
                        .flatten()
                })
        })
    }
}

/// RevenueCat-backed [`EntitlementGate`]
#[derive(Clone)]
pub struct RevenueCatGate {
    client: Client,
    endpoint: String,
    platform: String,
    app_user_id: Option<String>,
    api_key: Option<String>,
    fetch_token: Option<String>,
}

impl std::fmt::Debug for RevenueCatGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevenueCatGate")
            .field("endpoint", &self.endpoint)
            .field("platform", &self.platform)
            .field("app_user_id", &self.app_user_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("fetch_token", &self.fetch_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl RevenueCatGate {
    /// Create a new gate from configuration and the environment
    ///
    /// # Errors
    /// `GateError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &EntitlementConfig) -> Result<Self, GateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            platform: config.platform.clone(),
            app_user_id: config.app_user_id.clone(),
            api_key: config.api_key(),
            fetch_token: config.fetch_token(),
        })
    }

    /// With explicit API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// With subscriber id
    #[must_use]
    pub fn with_app_user_id(mut self, id: impl Into<String>) -> Self {
        self.app_user_id = Some(id.into());
        self
    }

    /// With checkout receipt token
    #[must_use]
    pub fn with_fetch_token(mut self, token: impl Into<String>) -> Self {
        self.fetch_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn app_user_id(&self) -> Option<&str> {
        self.app_user_id.as_deref()
    }

    fn credentials(&self) -> Result<(&str, &str), GateError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(GateError::NotConfigured("api key"))?;
        let user = self
            .app_user_id
            .as_deref()
            .ok_or(GateError::NotConfigured("app user id"))?;
        Ok((key, user))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder, key: &str) -> reqwest::RequestBuilder {
        builder.bearer_auth(key).header("X-Platform", &self.platform)
    }

    async fn read<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GateError> {
        let status = response.status();
        if !status.is_success() {
            return Err(GateError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    /// Fetch the subscriber record
    ///
    /// # Errors
    /// Missing configuration, transport failures and non-success statuses.
    pub async fn subscriber(&self) -> Result<Subscriber, GateError> {
        let (key, user) = self.credentials()?;
        let url = format!("{}/subscribers/{user}", self.endpoint);
        let response = self.authorized(self.client.get(url), key).send().await?;
        let body: SubscriberResponse = Self::read(response).await?;
        Ok(body.subscriber)
    }

    /// Record the receipt `fetch_token` for `product_id` and return the
    /// updated record
    ///
    /// # Errors
    /// Same as [`subscriber`](Self::subscriber).
    pub async fn post_receipt(
        &self,
        fetch_token: &str,
        product_id: Option<&str>,
    ) -> Result<Subscriber, GateError> {
        let (key, user) = self.credentials()?;
        let url = format!("{}/receipts", self.endpoint);
        let request = ReceiptRequest {
            app_user_id: user,
            fetch_token,
            product_id,
        };
        let response = self
            .authorized(self.client.post(url), key)
            .json(&request)
            .send()
            .await?;
        let body: SubscriberResponse = Self::read(response).await?;
        Ok(body.subscriber)
    }

    /// Paywall offerings for the subscriber
    ///
    /// # Errors
    /// Same as [`subscriber`](Self::subscriber).
    pub async fn offerings(&self) -> Result<Offerings, GateError> {
        let (key, user) = self.credentials()?;
        let url = format!("{}/subscribers/{user}/offerings", self.endpoint);
        let response = self.authorized(self.client.get(url), key).send().await?;
        Self::read(response).await
    }

    /// Resolve `offer` against the offerings and post the configured
    /// receipt token for the chosen package
    ///
    /// # Errors
    /// `GateError::NotConfigured` without a token, `GateError::UnknownOffer`
    /// when nothing matches, otherwise as [`subscriber`](Self::subscriber).
    pub async fn purchase_offer(&self, offer: &str) -> Result<Subscriber, GateError> {
        let token = self
            .fetch_token
            .as_deref()
            .ok_or(GateError::NotConfigured("fetch token"))?;
        let offerings = self.offerings().await?;
        let package = offerings
            .package(offer)
            .ok_or_else(|| GateError::UnknownOffer(offer.to_string()))?;
        tracing::debug!(
            offer,
            package = %package.identifier,
            product = ?package.platform_product_identifier,
            "posting receipt"
        );
        self.post_receipt(token, package.platform_product_identifier.as_deref())
            .await
    }

    fn entitled(result: Result<Subscriber, GateError>, operation: &str) -> bool {
        match result {
            Ok(subscriber) => {
                let now = Utc::now();
                tracing::debug!(
                    operation,
                    active = ?subscriber.active_entitlements(now),
                    "subscriber entitlements"
                );
                subscriber.has_active_entitlement(now)
            }
            Err(e) => {
                tracing::warn!(operation, error = %e, "entitlement check failed");
                false
            }
        }
    }
}

#[async_trait]
impl EntitlementGate for RevenueCatGate {
    async fn is_entitled(&self) -> bool {
        Self::entitled(self.subscriber().await, "status")
    }

    async fn purchase(&self, offer_id: &str) -> bool {
        Self::entitled(self.purchase_offer(offer_id).await, "purchase")
    }

    async fn restore(&self) -> bool {
        Self::entitled(self.subscriber().await, "restore")
    }
}
