//! Continuous review bot: polls a project's open merge requests and runs
//! whatever review each one is due for.

use std::sync::Arc;
use std::time::Duration;

use crate::host::{HostError, VersionControlHost};
use crate::models::MergeRequest;
use crate::review::Reviewer;
use crate::session::{ReviewAction, ReviewSessionStateMachine};

/// Counts for one polling iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationReport {
    pub open: usize,
    pub initial_reviews: usize,
    pub follow_ups: usize,
    /// Merge requests whose phase failed with a host error.
    pub failures: usize,
}

pub struct Listener {
    host: Arc<dyn VersionControlHost>,
    reviewer: Reviewer,
    state: ReviewSessionStateMachine,
    interval: Duration,
    repo_context: Option<String>,
}

impl Listener {
    pub fn new(host: Arc<dyn VersionControlHost>, reviewer: Reviewer, interval: Duration) -> Self {
        Self {
            host,
            reviewer,
            state: ReviewSessionStateMachine::new(),
            interval,
            repo_context: None,
        }
    }

    pub fn with_repo_context(mut self, context: Option<String>) -> Self {
        self.repo_context = context;
        self
    }

    pub fn state(&self) -> &ReviewSessionStateMachine {
        &self.state
    }

    /// One poll over all open merge requests.
    ///
    /// Fails only when the merge requests cannot be listed. A host error
    /// while handling one request is logged and leaves its state as it
    /// was, so the next poll retries that phase.
    pub async fn run_once(&mut self) -> Result<IterationReport, HostError> {
        let open = self.host.list_open_merge_requests().await?;
        let mut report = IterationReport {
            open: open.len(),
            ..IterationReport::default()
        };

        for mr in &open {
            match self.process(mr).await {
                Ok(ReviewAction::InitialReview) => report.initial_reviews += 1,
                Ok(ReviewAction::FollowUp { .. }) => report.follow_ups += 1,
                Ok(ReviewAction::Idle) => {}
                Err(e) => {
                    tracing::warn!(iid = mr.iid, "review failed, retrying next poll: {e}");
                    report.failures += 1;
                }
            }
        }

        let ids: Vec<u64> = open.iter().map(|mr| mr.iid).collect();
        self.state.retain_open(&ids);
        Ok(report)
    }

    async fn process(&mut self, mr: &MergeRequest) -> Result<ReviewAction, HostError> {
        let host = self.host.as_ref();
        let notes = if self.state.needs_history(mr.iid) {
            host.notes(mr.iid).await?
        } else {
            Vec::new()
        };

        let action = self.state.observe(mr.iid, &mr.head_sha, &notes);
        match &action {
            ReviewAction::InitialReview => {
                tracing::info!(iid = mr.iid, title = %mr.title, "initial review");
                let review = self
                    .reviewer
                    .initial_review(host, mr, self.repo_context.as_deref())
                    .await?;
                self.state
                    .complete_initial(mr.iid, &mr.head_sha, review.context());
            }
            ReviewAction::FollowUp { revision } => {
                tracing::info!(iid = mr.iid, %revision, "follow-up review");
                let context = self.state.context(mr.iid).cloned().unwrap_or_default();
                self.reviewer
                    .follow_up(host, mr.iid, revision, &context)
                    .await?;
                self.state.complete_follow_up(mr.iid, revision);
            }
            ReviewAction::Idle => {}
        }
        Ok(action)
    }

    /// Poll every `interval` until Ctrl-C.
    pub async fn run(&mut self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "listening for merge requests");
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.run_once() => match result {
                    Ok(report) => tracing::debug!(
                        open = report.open,
                        initial = report.initial_reviews,
                        follow_ups = report.follow_ups,
                        failures = report.failures,
                        "poll finished"
                    ),
                    Err(e) => tracing::warn!("poll failed: {e}"),
                },
            }
        }
        tracing::info!("shutting down");
    }
}
