//! Follow-up reviews of revisions pushed after the initial review.

use chrono::Utc;

use crate::diff::render_changes;
use crate::host::{HostError, VersionControlHost};
use crate::models::{FollowUpReview, ReviewContext};

use super::Reviewer;
use super::comment::follow_up_note;
use super::prompts::{FOLLOW_UP_SYSTEM_PROMPT, follow_up_prompt};

impl Reviewer {
    /// Review `revision` of merge request `iid` in light of `context`.
    ///
    /// Returns `Ok(None)` when the commit touches no reviewable files or
    /// the model never produced a usable answer. Nothing is posted then.
    pub async fn follow_up(
        &self,
        host: &dyn VersionControlHost,
        iid: u64,
        revision: &str,
        context: &ReviewContext,
    ) -> Result<Option<FollowUpReview>, HostError> {
        let commit = host.commit(revision).await?;
        let changes = host.commit_changes(revision).await?;
        let changes_text = render_changes(&changes, self.filter());
        if changes_text.trim().is_empty() {
            tracing::info!(iid, revision, "commit has no reviewable changes");
            return Ok(None);
        }

        let prompt = follow_up_prompt(&commit, context, &changes_text);
        let Some(review) = self
            .ask_for_object::<FollowUpReview>("follow-up", FOLLOW_UP_SYSTEM_PROMPT, &prompt)
            .await
        else {
            tracing::warn!(iid, revision, "follow-up review produced no answer");
            return Ok(None);
        };

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        host.post_note(iid, &follow_up_note(&commit, &review, &timestamp))
            .await?;
        let labels = self.allowed_labels(std::slice::from_ref(&review.status_label));
        if !labels.is_empty() {
            if let Err(e) = host.set_labels(iid, &labels).await {
                tracing::warn!(iid, ?labels, "failed to set labels: {e}");
            }
        }
        tracing::info!(iid, revision, status = %review.status_label, "follow-up posted");
        Ok(Some(review))
    }
}
