//! Premium entitlement seam

use async_trait::async_trait;

/// Answers whether the current user may use premium capabilities
///
/// Implementations swallow their own failures (logging them) and report
/// `false`; an unreachable billing backend must never block free features.
#[async_trait]
pub trait EntitlementGate: Send + Sync {
    /// Any active entitlement
    async fn is_entitled(&self) -> bool;

    /// Buy `offer_id`; `true` when an entitlement is active afterwards
    async fn purchase(&self, offer_id: &str) -> bool;

    /// Re-associate earlier purchases; `true` when an entitlement is active
    async fn restore(&self) -> bool;
}

/// Gate that never grants anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEntitlements;

#[async_trait]
impl EntitlementGate for NoEntitlements {
    async fn is_entitled(&self) -> bool {
        false
    }

    async fn purchase(&self, _offer_id: &str) -> bool {
        false
    }

    async fn restore(&self) -> bool {
        false
    }
}
