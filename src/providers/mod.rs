//! Text completion providers.
//!
//! The review pipeline only ever needs "system prompt + user prompt in,
//! text out". Failures are collapsed into the empty string so callers
//! treat an unreachable model exactly like an unusable answer.

pub mod rig;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from building or calling a provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// A single-shot text completion capability.
#[async_trait]
pub trait TextCompletionProvider: Send + Sync {
    /// Return the full generated text, or `""` when the call failed.
    async fn ask(&self, system_prompt: &str, user_prompt: &str, temperature: f64) -> String;
}

#[async_trait]
impl<T: TextCompletionProvider + ?Sized> TextCompletionProvider for std::sync::Arc<T> {
    async fn ask(&self, system_prompt: &str, user_prompt: &str, temperature: f64) -> String {
        (**self).ask(system_prompt, user_prompt, temperature).await
    }
}
