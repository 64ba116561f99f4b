//! Lead agent: one summary note per merge request.

use crate::host::{HostError, VersionControlHost};
use crate::models::{LeadSummary, MergeRequest};

use super::Reviewer;
use super::comment::lead_summary_note;
use super::prompts::{LEAD_SYSTEM_PROMPT, lead_prompt};

impl Reviewer {
    /// Ask the lead agent for its assessment of `diff_text`.
    pub async fn lead_summary(&self, mr: &MergeRequest, diff_text: &str) -> Option<LeadSummary> {
        let prompt = lead_prompt(mr, diff_text);
        let summary: LeadSummary = self
            .ask_for_object("lead", LEAD_SYSTEM_PROMPT, &prompt)
            .await?;
        tracing::info!(
            iid = mr.iid,
            risk = %summary.risk_assessment,
            decision = %summary.final_decision,
            "lead summary ready"
        );
        Some(summary)
    }

    /// Post the summary note and apply the labels it asks for. Labels
    /// are best effort once the note is up.
    pub async fn publish_lead_summary(
        &self,
        host: &dyn VersionControlHost,
        iid: u64,
        summary: &LeadSummary,
        revision: &str,
    ) -> Result<(), HostError> {
        host.post_note(iid, &lead_summary_note(summary, revision))
            .await?;
        let labels = self.allowed_labels(&summary.labels_to_add);
        if !labels.is_empty() {
            if let Err(e) = host.set_labels(iid, &labels).await {
                tracing::warn!(iid, ?labels, "failed to set labels: {e}");
            }
        }
        Ok(())
    }
}
