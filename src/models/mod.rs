//! Shared types used across all modules.
//!
//! This module defines the core data structures for diffs, bug reports,
//! merge requests, review summaries and benchmark scenarios. Other modules
//! import from here rather than reaching into each other's internals.

pub mod bug;
pub mod diff;
pub mod merge_request;
pub mod review;
pub mod scenario;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use bug::{BugReport, BugSeverity, MatchKind, ValidatedSuggestion};
pub use diff::{DiffLine, FileChange};
pub use merge_request::{CommitInfo, DiffRefs, InlineComment, MergeRequest, Note};
pub use review::{FollowUpReview, LeadSummary, ReviewContext};
pub use scenario::{
    ContextComparison, FileMap, Scenario, ScenarioComparison, ScenarioResult, SuiteSummary,
    TestOutcome, TestTotals, Verdict, VerdictChange,
};

/// Supported LLM provider backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    /// Any OpenAI-compatible API (vLLM, Ollama, local model servers).
    #[serde(rename = "openai-compatible", alias = "local")]
    OpenAICompatible,
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderName::Gemini => write!(f, "gemini"),
            ProviderName::OpenAI => write!(f, "openai"),
            ProviderName::Anthropic => write!(f, "anthropic"),
            ProviderName::OpenAICompatible => write!(f, "openai-compatible"),
        }
    }
}

impl std::str::FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderName::Gemini),
            "openai" => Ok(ProviderName::OpenAI),
            "anthropic" => Ok(ProviderName::Anthropic),
            "openai-compatible" | "local" => Ok(ProviderName::OpenAICompatible),
            other => Err(format!(
                "unsupported provider: '{other}'. Supported: gemini, openai, anthropic, \
                 openai-compatible (alias: local)"
            )),
        }
    }
}

impl ProviderName {
    /// Provider-specific environment variable holding the API key.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            ProviderName::Gemini => "GEMINI_API_KEY",
            ProviderName::OpenAI | ProviderName::OpenAICompatible => "OPENAI_API_KEY",
            ProviderName::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Model used when the config does not name one.
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderName::Gemini => "gemini-flash-latest",
            ProviderName::OpenAI => "gpt-4-turbo",
            ProviderName::Anthropic => "claude-sonnet-4-20250514",
            ProviderName::OpenAICompatible => "qwen3_30b_deployed",
        }
    }

    /// Whether requests can be made without an API key.
    pub fn requires_api_key(self) -> bool {
        !matches!(self, ProviderName::OpenAICompatible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_display_round_trips_through_from_str() {
        for name in [
            ProviderName::Gemini,
            ProviderName::OpenAI,
            ProviderName::Anthropic,
            ProviderName::OpenAICompatible,
        ] {
            assert_eq!(name.to_string().parse::<ProviderName>(), Ok(name));
        }
    }

    #[test]
    fn local_is_an_alias_for_openai_compatible() {
        assert_eq!(
            "local".parse::<ProviderName>().unwrap(),
            ProviderName::OpenAICompatible
        );
        let parsed: ProviderName = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(parsed, ProviderName::OpenAICompatible);
    }

    #[test]
    fn provider_name_from_str_invalid() {
        let err = "cohere".parse::<ProviderName>().unwrap_err();
        assert!(err.contains("unsupported provider"));
    }

    #[test]
    fn local_servers_do_not_need_keys() {
        assert!(!ProviderName::OpenAICompatible.requires_api_key());
        assert!(ProviderName::Gemini.requires_api_key());
        assert_eq!(ProviderName::Gemini.api_key_env_var(), "GEMINI_API_KEY");
    }
}
