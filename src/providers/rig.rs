//! rig-core integration for text completion.
//!
//! Uses rig-core's provider clients and Agent abstraction. Supports
//! Gemini, OpenAI, Anthropic and any OpenAI-compatible server (vLLM,
//! Ollama and similar) reachable through `base_url`.

use std::time::Duration;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::ProviderConfig;
use crate::models::ProviderName;

use super::{ProviderError, TextCompletionProvider};

/// Initial backoff delay between retries.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(10);

/// Maximum backoff delay between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Placeholder key for local servers that do not check authentication.
const LOCAL_API_KEY: &str = "EMPTY";

/// Build an agent from a rig-core client and prompt it once.
///
/// Always sets `max_tokens`; without it some providers (e.g. Gemini)
/// default to a low limit that truncates responses.
macro_rules! prompt_simple {
    ($client:expr, $model:expr, $system:expr, $user:expr, $temperature:expr, $max_tokens:expr, $label:expr) => {{
        let agent = $client
            .agent($model)
            .preamble($system)
            .temperature($temperature)
            .max_tokens($max_tokens)
            .build();
        agent
            .prompt($user)
            .await
            .map_err(|e| ProviderError::ApiError(format!("{} API error: {e}", $label)))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            ProviderError::ApiError(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based completion provider.
pub struct RigProvider {
    config: ProviderConfig,
    backoff: fn(u32) -> Duration,
}

impl RigProvider {
    /// Create a new RigProvider with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.name.requires_api_key() && config.api_key.is_none() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or {}.",
                config.name,
                crate::constants::ENV_API_KEY,
                config.name.api_key_env_var()
            )));
        }
        if config.name == ProviderName::OpenAICompatible && config.base_url.is_none() {
            return Err(ProviderError::NotConfigured(
                "openai-compatible provider requires base_url to be set".to_string(),
            ));
        }
        Ok(Self {
            config,
            backoff: retry_backoff,
        })
    }

    pub fn model(&self) -> &str {
        self.config.resolved_model()
    }

    /// Build an OpenAI-style client, optionally with a custom base URL.
    fn build_openai_client(
        &self,
        api_key: &str,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        let client: providers::openai::CompletionsClient = builder
            .build()
            .map_err(|e| ProviderError::ApiError(format!("failed to create OpenAI client: {e}")))?;
        Ok(client)
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        match self.config.api_key.as_deref() {
            Some(key) => Ok(key),
            None if !self.config.name.requires_api_key() => Ok(LOCAL_API_KEY),
            None => Err(ProviderError::NotConfigured("missing API key".to_string())),
        }
    }

    /// Make a completion call through rig-core and return the raw response text.
    async fn call_rig(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f64,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let model = self.model();
        let max_tokens = self.config.max_output_tokens;

        match self.config.name {
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::ApiError(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_simple!(client, model, system_prompt, user_prompt, temperature, max_tokens, "Anthropic")
            }
            ProviderName::OpenAI => {
                let client = self.build_openai_client(api_key)?;
                prompt_simple!(client, model, system_prompt, user_prompt, temperature, max_tokens, "OpenAI")
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_simple!(client, model, system_prompt, user_prompt, temperature, max_tokens, "Gemini")
            }
            ProviderName::OpenAICompatible => {
                let client = self.build_openai_client(api_key)?;
                prompt_simple!(
                    client,
                    model,
                    system_prompt,
                    user_prompt,
                    temperature,
                    max_tokens,
                    "OpenAI-compatible"
                )
            }
        }
    }
}

#[async_trait]
impl TextCompletionProvider for RigProvider {
    async fn ask(&self, system_prompt: &str, user_prompt: &str, temperature: f64) -> String {
        let max_retries = self.config.request_retries;
        for attempt in 0..=max_retries {
            tracing::debug!(
                provider = %self.config.name,
                model = self.model(),
                attempt = attempt + 1,
                prompt_chars = user_prompt.len(),
                "calling provider"
            );
            match self.call_rig(system_prompt, user_prompt, temperature).await {
                Ok(text) => {
                    tracing::debug!(response_chars = text.len(), "provider answered");
                    return text;
                }
                Err(ref e) if is_retryable(e) && attempt < max_retries => {
                    let backoff = (self.backoff)(attempt);
                    let reason = classify_error(e).unwrap_or("Transient error");
                    tracing::warn!(
                        "{reason}; retrying in {}s ({}/{})",
                        backoff.as_secs(),
                        attempt + 1,
                        max_retries
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::error!("provider call failed: {e}");
                    return String::new();
                }
            }
        }
        String::new()
    }
}

/// Whether a provider error is transient and worth retrying.
pub fn is_retryable(err: &ProviderError) -> bool {
    classify_error(err).is_some()
}

/// Classifies a provider error into a short, user-friendly message.
///
/// Returns `Some(message)` for transient/retryable errors, `None` otherwise.
pub fn classify_error(err: &ProviderError) -> Option<&'static str> {
    match err {
        ProviderError::ApiError(msg) => {
            let msg_lower = msg.to_lowercase();
            if msg_lower.contains("429")
                || msg_lower.contains("rate limit")
                || msg_lower.contains("too many requests")
            {
                Some("Rate limited by API")
            } else if msg_lower.contains("503")
                || msg_lower.contains("service unavailable")
                || msg_lower.contains("high demand")
            {
                Some("High model load")
            } else if msg_lower.contains("529") || msg_lower.contains("overloaded") {
                Some("API overloaded")
            } else if msg_lower.contains("502") {
                Some("API gateway error")
            } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
                Some("Request timed out")
            } else if msg_lower.contains("connection") {
                Some("Connection error")
            } else if msg_lower.contains("temporarily") || msg_lower.contains("try again") {
                Some("Temporary API error")
            } else {
                None
            }
        }
        ProviderError::NotConfigured(_) => None,
    }
}

/// Compute the backoff duration for a retry attempt using exponential backoff.
pub fn retry_backoff(attempt: u32) -> Duration {
    let backoff = INITIAL_BACKOFF.saturating_mul(2u32.saturating_pow(attempt));
    backoff.min(MAX_BACKOFF)
}
