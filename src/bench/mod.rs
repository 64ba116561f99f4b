//! End-to-end benchmark: provision a project per scenario, review the
//! merge request, apply the fixes, and score the result by running the
//! scenario's tests before and after.

pub mod fixes;
pub mod report;
pub mod scenario;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::host::{FileAction, HostError, ProjectProvisioner, ProjectWorkspace};
use crate::models::{
    ContextComparison, FileMap, Scenario, ScenarioResult, SuiteSummary, Verdict,
};
use crate::review::{ContextSource, Reviewer};
use crate::runner::{RunnerError, TestRunner};
use crate::transcript::Transcript;

pub use scenario::ScenarioError;

/// A hard failure that aborts one scenario.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("test run failed: {0}")]
    Runner(#[from] RunnerError),
}

/// Runs scenarios one after another against a provisioner.
pub struct BenchmarkRunner {
    provisioner: Arc<dyn ProjectProvisioner>,
    runner: Arc<dyn TestRunner>,
    reviewer: Reviewer,
    user_tag: String,
    context_source: ContextSource,
    context_cache: HashMap<String, Option<String>>,
    transcript: Transcript,
}

impl BenchmarkRunner {
    pub fn new(
        provisioner: Arc<dyn ProjectProvisioner>,
        runner: Arc<dyn TestRunner>,
        reviewer: Reviewer,
        user_tag: impl Into<String>,
    ) -> Self {
        Self {
            provisioner,
            runner,
            reviewer,
            user_tag: user_tag.into(),
            context_source: ContextSource::None,
            context_cache: HashMap::new(),
            transcript: Transcript::disabled(),
        }
    }

    pub fn with_context(mut self, source: ContextSource) -> Self {
        self.context_source = source;
        self
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    /// Prefix shared by every project created for `scenario`.
    pub fn project_prefix(&self, scenario: &Scenario) -> String {
        format!("{}-{}", scenario.id, self.user_tag).to_lowercase()
    }

    pub async fn run_suite(&mut self, scenarios: &[Scenario]) -> SuiteSummary {
        let mut results = Vec::with_capacity(scenarios.len());
        for (i, scenario) in scenarios.iter().enumerate() {
            tracing::info!(
                "scenario {}/{}: {} ({})",
                i + 1,
                scenarios.len(),
                scenario.name,
                scenario.id
            );
            results.push(self.run_scenario(scenario).await);
        }
        SuiteSummary::from_results(results)
    }

    /// Run the suite twice, first without and then with generated
    /// repository context, and pair the two summaries.
    pub async fn compare_context(&mut self, scenarios: &[Scenario]) -> ContextComparison {
        let configured = std::mem::take(&mut self.context_source);

        tracing::info!("comparison pass 1/2: without repository context");
        let without_context = self.run_suite(scenarios).await;

        self.context_source = ContextSource::Generated;
        self.context_cache.clear();
        tracing::info!("comparison pass 2/2: with generated repository context");
        let with_context = self.run_suite(scenarios).await;

        self.context_source = configured;
        let comparison = ContextComparison {
            without_context,
            with_context,
        };
        tracing::info!(delta = comparison.passed_delta(), "context comparison finished");
        comparison
    }

    /// Run one scenario. Hard errors become a `Crash` verdict; whatever
    /// was recorded before the error is kept.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> ScenarioResult {
        let mut result = ScenarioResult {
            scenario_id: scenario.id.clone(),
            verdict: Verdict::Fail,
            mr_url: None,
            pre_fix: None,
            post_fix: None,
            suggestions: 0,
            error: None,
        };
        if let Err(e) = self.execute(scenario, &mut result).await {
            tracing::error!(id = %scenario.id, "scenario crashed: {e}");
            result.verdict = Verdict::Crash;
            result.error = Some(e.to_string());
        }
        tracing::info!(id = %scenario.id, verdict = %result.verdict, "scenario finished");
        result
    }

    async fn execute(
        &mut self,
        scenario: &Scenario,
        result: &mut ScenarioResult,
    ) -> Result<(), BenchError> {
        let prefix = self.project_prefix(scenario);
        match self.provisioner.cleanup_projects(&prefix).await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, %prefix, "removed stale projects"),
            Err(e) => tracing::warn!(%prefix, "cleanup failed: {e}"),
        }

        let name = format!("{prefix}-{}", Utc::now().timestamp());
        let project = self.provisioner.create_project(&name).await?;
        let mr = provision(project.as_ref(), scenario).await?;
        result.mr_url = Some(if mr.web_url.is_empty() {
            project.web_url().to_string()
        } else {
            mr.web_url.clone()
        });

        let mut files = scenario.full_file_map();
        let pre = self.runner.run(&files).await?;
        tracing::info!(score = %pre.score(), success = pre.success, "pre-fix tests");
        result.pre_fix = Some(pre.clone());

        let repo_context = self.repo_context(scenario).await;
        let review = self
            .reviewer
            .initial_review(project.as_host(), &mr, repo_context.as_deref())
            .await?;
        let suggestions = review.outcome.suggestions;
        result.suggestions = suggestions.len();

        let updated = if suggestions.is_empty() {
            tracing::warn!(id = %scenario.id, "no suggestions accepted, nothing to fix");
            FileMap::new()
        } else {
            fixes::apply_fixes(self.reviewer.provider(), &files, &suggestions, &self.transcript)
                .await
        };

        if !updated.is_empty() {
            project
                .commit_files(
                    &scenario.branch,
                    "Apply AI review fixes",
                    &updated,
                    FileAction::Update,
                )
                .await?;
        }
        match project.merge(mr.iid).await {
            Ok(true) => tracing::info!(iid = mr.iid, "merged"),
            Ok(false) => tracing::warn!(iid = mr.iid, "merge did not complete"),
            Err(e) => tracing::warn!(iid = mr.iid, "merge failed: {e}"),
        }
        files.extend(updated.iter().map(|(k, v)| (k.clone(), v.clone())));

        let post = self.runner.run(&files).await?;
        tracing::info!(score = %post.score(), success = post.success, "post-fix tests");

        let passed = post.success && !updated.is_empty();
        project
            .post_note(mr.iid, &report::benchmark_report(&pre, &post, passed))
            .await?;
        result.post_fix = Some(post);
        result.verdict = if passed { Verdict::Pass } else { Verdict::Fail };
        Ok(())
    }

    /// Repository context for `scenario`, generated at most once per id.
    async fn repo_context(&mut self, scenario: &Scenario) -> Option<String> {
        if let Some(cached) = self.context_cache.get(&scenario.id) {
            return cached.clone();
        }
        let files = scenario.main_branch_files();
        let context = self
            .context_source
            .resolve(self.reviewer.provider(), Some(&files), &scenario.id)
            .await;
        self.context_cache
            .insert(scenario.id.clone(), context.clone());
        context
    }
}

/// Seed `main`, push the feature branch and open the merge request.
async fn provision(
    project: &dyn ProjectWorkspace,
    scenario: &Scenario,
) -> Result<crate::models::MergeRequest, HostError> {
    if !scenario.base_files.is_empty() {
        project
            .commit_files("main", "Initial commit", &scenario.base_files, FileAction::Create)
            .await?;
    }
    if !scenario.tests.is_empty() {
        project
            .commit_files("main", "Add tests", &scenario.tests, FileAction::Create)
            .await?;
    }
    project.create_branch(&scenario.branch, "main").await?;

    let on_main = scenario.main_branch_files();
    let (updates, creates): (FileMap, FileMap) = scenario
        .changes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .partition(|(path, _)| on_main.contains_key(path));
    let message = format!("Feat: {}", scenario.name);
    if !creates.is_empty() {
        project
            .commit_files(&scenario.branch, &message, &creates, FileAction::Create)
            .await?;
    }
    if !updates.is_empty() {
        project
            .commit_files(&scenario.branch, &message, &updates, FileAction::Update)
            .await?;
    }

    let mr = project
        .open_merge_request(&scenario.branch, "main", &message, &scenario.description)
        .await?;
    tracing::info!(iid = mr.iid, url = %mr.web_url, "merge request opened");
    Ok(mr)
}
