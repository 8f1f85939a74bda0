//! MAB Providers
//!
//! Production implementations of the session's external seams:
//! - [`GeminiProvider`]: single-file HTML generation through Gemini
//! - [`RevenueCatGate`]: premium entitlements through RevenueCat

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod gemini;
pub mod prompt;
pub mod revenuecat;

pub use gemini::GeminiProvider;
pub use prompt::{create_prompt, edit_prompt, strip_fences, SYSTEM_INSTRUCTION};
pub use revenuecat::{
    Entitlement, GateError, Offering, Offerings, Package, RevenueCatGate, Subscriber,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
