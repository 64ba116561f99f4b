//! Benchmark scenario definitions and scoring types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered mapping of repository-relative path to file content.
pub type FileMap = IndexMap<String, String>;

/// One benchmark case: a feature branch with an injected bug and the
/// tests that expose it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Stable identifier, also used as the project name prefix.
    pub id: String,
    pub name: String,
    pub branch: String,
    #[serde(default)]
    pub description: String,
    /// Files committed on the feature branch.
    pub changes: FileMap,
    /// Test files committed on the main branch.
    #[serde(default)]
    pub tests: FileMap,
    /// Files committed on the main branch before the tests.
    #[serde(default)]
    pub base_files: FileMap,
}

impl Scenario {
    /// Files committed to the main branch: base files then tests.
    pub fn main_branch_files(&self) -> FileMap {
        let mut files = self.base_files.clone();
        files.extend(self.tests.iter().map(|(k, v)| (k.clone(), v.clone())));
        files
    }

    /// The full working tree after the feature branch lands.
    pub fn full_file_map(&self) -> FileMap {
        let mut files = self.main_branch_files();
        files.extend(self.changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        files
    }
}

/// Result of one test-suite execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub passed: u32,
    pub failed: u32,
    pub success: bool,
    pub raw_output: String,
}

impl TestOutcome {
    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }

    /// `passed/total`, as shown in reports.
    pub fn score(&self) -> String {
        format!("{}/{}", self.passed, self.total())
    }

    /// Outcome used when the suite could not be run at all.
    pub fn not_run(reason: impl Into<String>) -> Self {
        Self {
            passed: 0,
            failed: 0,
            success: false,
            raw_output: reason.into(),
        }
    }
}

/// Final scoring of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// The post-fix test run succeeded.
    Pass,
    /// The pipeline completed but the post-fix run did not succeed.
    Fail,
    /// A hard error aborted the scenario.
    Crash,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Crash => write!(f, "CRASH"),
        }
    }
}

/// Everything recorded about one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_id: String,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_fix: Option<TestOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_fix: Option<TestOutcome>,
    /// Number of inline suggestions accepted by the review loop.
    pub suggestions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counts over a suite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub crashed: usize,
    pub results: Vec<ScenarioResult>,
}

impl SuiteSummary {
    pub fn from_results(results: Vec<ScenarioResult>) -> Self {
        let mut summary = SuiteSummary {
            total: results.len(),
            ..SuiteSummary::default()
        };
        for result in &results {
            match result.verdict {
                Verdict::Pass => summary.passed += 1,
                Verdict::Fail => summary.failed += 1,
                Verdict::Crash => summary.crashed += 1,
            }
        }
        summary.results = results;
        summary
    }
}

impl SuiteSummary {
    /// Share of scenarios that passed, in percent.
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 * 100.0 / self.total as f64
        }
    }

    /// Test counts summed over every scenario that reached the runner.
    pub fn test_totals(&self) -> TestTotals {
        let mut totals = TestTotals::default();
        for result in &self.results {
            if let Some(pre) = &result.pre_fix {
                totals.pre_passed += pre.passed;
                totals.pre_total += pre.total();
            }
            if let Some(post) = &result.post_fix {
                totals.post_passed += post.passed;
                totals.post_total += post.total();
            }
        }
        totals
    }
}

/// Individual test counts across a suite, before and after fixes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTotals {
    pub pre_passed: u32,
    pub pre_total: u32,
    pub post_passed: u32,
    pub post_total: u32,
}

/// How a scenario's verdict moved once repository context was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictChange {
    Improved,
    Regressed,
    Changed,
    Unchanged,
}

impl VerdictChange {
    pub fn between(without: Verdict, with: Verdict) -> Self {
        match (without, with) {
            (a, b) if a == b => VerdictChange::Unchanged,
            (_, Verdict::Pass) => VerdictChange::Improved,
            (Verdict::Pass, _) => VerdictChange::Regressed,
            _ => VerdictChange::Changed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub scenario_id: String,
    pub without_context: Verdict,
    pub with_context: Verdict,
    pub change: VerdictChange,
}

/// The same suite run without and with repository context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextComparison {
    pub without_context: SuiteSummary,
    pub with_context: SuiteSummary,
}

impl ContextComparison {
    /// Scenarios passed with context minus scenarios passed without.
    pub fn passed_delta(&self) -> i64 {
        self.with_context.passed as i64 - self.without_context.passed as i64
    }

    /// Per-scenario verdicts, in the order of the run without context.
    /// Scenarios missing from either run are left out.
    pub fn scenarios(&self) -> Vec<ScenarioComparison> {
        self.without_context
            .results
            .iter()
            .filter_map(|without| {
                let with = self
                    .with_context
                    .results
                    .iter()
                    .find(|r| r.scenario_id == without.scenario_id)?;
                Some(ScenarioComparison {
                    scenario_id: without.scenario_id.clone(),
                    without_context: without.verdict,
                    with_context: with.verdict,
                    change: VerdictChange::between(without.verdict, with.verdict),
                })
            })
            .collect()
    }
}
