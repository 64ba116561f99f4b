//! Review pipeline: lead summary, suggestion loop and follow-up reviews.
//!
//! [`Reviewer`] bundles the provider with the review settings. Each phase
//! lives in its own module; the initial review (lead summary followed by
//! the suggestion loop) is composed here since both the listener and the
//! benchmark run it.

pub mod comment;
pub mod context;
pub mod followup;
pub mod lead;
pub mod prompts;
pub mod validation;

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ReviewerConfig;
use crate::diff::{DiffLineIndex, ExtensionFilter, render_changes};
use crate::extract::{ExtractedResponse, extract_object};
use crate::host::{HostError, VersionControlHost};
use crate::models::{FileChange, LeadSummary, MergeRequest, ReviewContext};
use crate::providers::TextCompletionProvider;
use crate::transcript::{Transcript, TranscriptEntry};

pub use context::ContextSource;
pub use validation::{
    FeedbackLog, InlineCommentSink, LoopOutcome, LoopState, SuggestionSink,
    SuggestionValidationLoop,
};

/// Everything the initial review produced.
#[derive(Debug, Clone)]
pub struct InitialReview {
    pub lead: Option<LeadSummary>,
    pub outcome: LoopOutcome,
}

impl InitialReview {
    /// Context carried into later follow-up reviews.
    pub fn context(&self) -> ReviewContext {
        ReviewContext {
            lead_summary: self.lead.clone(),
            reported_issues: self
                .outcome
                .suggestions
                .iter()
                .map(|s| s.report.clone())
                .collect(),
        }
    }
}

/// Provider plus review settings.
pub struct Reviewer {
    provider: Arc<dyn TextCompletionProvider>,
    config: ReviewerConfig,
    filter: ExtensionFilter,
    valid_labels: Vec<String>,
    transcript: Transcript,
}

impl Reviewer {
    pub fn new(
        provider: Arc<dyn TextCompletionProvider>,
        config: ReviewerConfig,
        filter: ExtensionFilter,
        valid_labels: Vec<String>,
    ) -> Self {
        Self {
            provider,
            config,
            filter,
            valid_labels,
            transcript: Transcript::disabled(),
        }
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn provider(&self) -> &dyn TextCompletionProvider {
        self.provider.as_ref()
    }

    pub fn config(&self) -> &ReviewerConfig {
        &self.config
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    /// The members of `labels` that belong to the configured vocabulary,
    /// deduplicated, in order.
    pub fn allowed_labels(&self, labels: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.trim();
            if let Some(valid) = self
                .valid_labels
                .iter()
                .find(|v| v.eq_ignore_ascii_case(label))
            {
                if !out.contains(valid) {
                    out.push(valid.clone());
                }
            } else if !label.is_empty() {
                tracing::debug!("ignoring label outside the allowed set: {label}");
            }
        }
        out
    }

    /// Ask until the answer decodes into `T`, up to the retry budget.
    async fn ask_for_object<T: DeserializeOwned>(
        &self,
        agent: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Option<T> {
        let max_attempts = self.config.max_retries_per_agent;
        for attempt in 1..=max_attempts {
            if attempt > 1 && !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            let response = self
                .provider
                .ask(system_prompt, user_prompt, self.config.temperature)
                .await;
            let extracted = extract_object(&response);
            self.transcript.record(&TranscriptEntry {
                agent,
                attempt,
                system_prompt,
                user_prompt,
                response: &response,
                parsed: !extracted.is_failure(),
                timestamp: Utc::now(),
            });

            if let ExtractedResponse::SingleObjectResult(map) = extracted {
                match serde_json::from_value::<T>(Value::Object(map)) {
                    Ok(value) => {
                        tracing::debug!(agent, attempt, "structured answer decoded");
                        return Some(value);
                    }
                    Err(e) => tracing::debug!(agent, attempt, "answer has the wrong fields: {e}"),
                }
            } else {
                tracing::debug!(agent, attempt, "no JSON object in answer");
            }
        }
        tracing::warn!(agent, attempts = max_attempts, "no usable answer");
        None
    }

    /// Run the suggestion loop over `changes`, posting inline comments.
    pub async fn suggest(
        &self,
        host: &dyn VersionControlHost,
        iid: u64,
        changes: &[FileChange],
        instructions: &str,
        repo_context: Option<&str>,
    ) -> LoopOutcome {
        let index = DiffLineIndex::from_changes(changes, &self.filter);
        let diff_text = render_changes(changes, &self.filter);
        let base_prompt = prompts::architect_prompt(instructions, repo_context, &diff_text);
        tracing::info!(
            iid,
            lines = index.len(),
            "running suggestion loop"
        );
        let sink = InlineCommentSink::new(host, iid);
        SuggestionValidationLoop::new(self.provider.as_ref(), &self.config, &self.transcript)
            .run(prompts::ARCHITECT_SYSTEM_PROMPT, &base_prompt, &index, &sink)
            .await
    }

    /// Lead summary followed by the suggestion loop.
    ///
    /// Host failures propagate; model failures only shrink the result.
    pub async fn initial_review(
        &self,
        host: &dyn VersionControlHost,
        mr: &MergeRequest,
        repo_context: Option<&str>,
    ) -> Result<InitialReview, HostError> {
        let changes = host.merge_request_changes(mr.iid).await?;
        let diff_text = render_changes(&changes, &self.filter);
        if diff_text.trim().is_empty() {
            tracing::info!(iid = mr.iid, "no reviewable changes");
            return Ok(InitialReview {
                lead: None,
                outcome: LoopOutcome::exhausted(0),
            });
        }

        let lead = self.lead_summary(mr, &diff_text).await;
        if let Some(summary) = &lead {
            self.publish_lead_summary(host, mr.iid, summary, &mr.head_sha)
                .await?;
        }
        let fallback = LeadSummary::default();
        let instructions = lead
            .as_ref()
            .unwrap_or(&fallback)
            .instructions_or_default()
            .to_string();

        let outcome = self
            .suggest(host, mr.iid, &changes, &instructions, repo_context)
            .await;
        Ok(InitialReview { lead, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl TextCompletionProvider for Silent {
        async fn ask(&self, _s: &str, _u: &str, _t: f64) -> String {
            String::new()
        }
    }

    fn reviewer() -> Reviewer {
        Reviewer::new(
            Arc::new(Silent),
            ReviewerConfig::default(),
            ExtensionFilter::default(),
            vec!["ready-for-merge".into(), "needs-review".into()],
        )
    }

    #[test]
    fn allowed_labels_filters_and_dedups() {
        let labels = reviewer().allowed_labels(&[
            "Needs-Review".into(),
            "security-risk".into(),
            "needs-review".into(),
            "ready-for-merge".into(),
        ]);
        assert_eq!(labels, vec!["needs-review", "ready-for-merge"]);
    }

    #[test]
    fn initial_review_context_collects_reports() {
        let review = InitialReview {
            lead: None,
            outcome: LoopOutcome::exhausted(3),
        };
        assert!(review.context().is_empty());
    }
}
