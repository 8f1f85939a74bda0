//! Code-generation backend seam

use crate::error::ProviderError;
use async_trait::async_trait;
use mab_artifact::Turn;

/// Turns natural-language instructions into a complete artifact body
///
/// The body is opaque to the core: a self-contained renderable document.
/// Implementations must return the *full* replacement body; the controller
/// never patches.
#[async_trait]
pub trait CodeGenProvider: Send + Sync {
    /// Generate a fresh body from `instruction` alone
    async fn generate(&self, instruction: &str) -> Result<String, ProviderError>;

    /// Revise `body` according to `instruction`.
    ///
    /// `prior_history` is the conversation *before* the turn carrying
    /// `instruction` was appended.
    async fn revise(
        &self,
        body: &str,
        prior_history: &[Turn],
        instruction: &str,
    ) -> Result<String, ProviderError>;
}
