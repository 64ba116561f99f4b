//! Local test execution.
//!
//! [`CommandTestRunner`] writes a file map into a temporary directory,
//! runs the configured test command there with a wall-clock timeout, and
//! reads pass/fail counts back out of the textual summary.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;

use crate::config::RunnerConfig;
use crate::models::{FileMap, TestOutcome};

/// Errors from preparing or running a test suite.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to prepare test workspace: {0}")]
    Io(#[from] std::io::Error),

    #[error("test command is empty")]
    EmptyCommand,

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("refusing to write outside the workspace: {0}")]
    UnsafePath(String),
}

/// Runs a test suite over a set of files.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run(&self, files: &FileMap) -> Result<TestOutcome, RunnerError>;
}

/// Runs an external command (pytest by default) in a scratch directory.
#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandTestRunner {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl TestRunner for CommandTestRunner {
    async fn run(&self, files: &FileMap) -> Result<TestOutcome, RunnerError> {
        let (program, args) = self.command.split_first().ok_or(RunnerError::EmptyCommand)?;

        let workspace = tempfile::tempdir()?;
        write_files(workspace.path(), files)?;

        tracing::debug!(
            "Running: {} in {:?}",
            self.command.join(" "),
            workspace.path()
        );

        let child = Command::new(program)
            .args(args)
            .current_dir(workspace.path())
            .env("PYTHONPATH", workspace.path())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(RunnerError::Spawn {
                    program: program.clone(),
                    source,
                });
            }
            Err(_) => {
                tracing::warn!("test run timed out after {}s", self.timeout.as_secs());
                return Ok(TestOutcome {
                    passed: 0,
                    failed: 1,
                    success: false,
                    raw_output: format!("Timeout after {}s", self.timeout.as_secs()),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{stdout}\n{stderr}");
        let outcome = parse_test_summary(&combined, output.status.success());
        tracing::info!(
            passed = outcome.passed,
            failed = outcome.failed,
            success = outcome.success,
            "test run finished"
        );
        Ok(outcome)
    }
}

/// Write `files` under `root`, creating parent directories. Absolute
/// paths and `..` components are rejected.
fn write_files(root: &Path, files: &FileMap) -> Result<(), RunnerError> {
    for (rel, content) in files {
        let rel_path = Path::new(rel);
        if rel_path.is_absolute()
            || rel_path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(RunnerError::UnsafePath(rel.clone()));
        }
        let path = root.join(rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
    }
    Ok(())
}

static PASSED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+) passed").unwrap());
static FAILED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+) failed").unwrap());
static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+) errors?\b").unwrap());

fn count(re: &Regex, text: &str) -> u32 {
    re.captures_iter(text)
        .filter_map(|cap| cap.get(1)?.as_str().parse::<u32>().ok())
        .last()
        .unwrap_or(0)
}

/// Derive a [`TestOutcome`] from runner output.
///
/// Errors count as failures. When nothing was counted and the command did
/// not succeed, the run counts as one failure so that "no tests ran" is
/// never mistaken for a green suite.
pub fn parse_test_summary(output: &str, success: bool) -> TestOutcome {
    let passed = count(&PASSED_RE, output);
    let mut failed = count(&FAILED_RE, output) + count(&ERROR_RE, output);
    if passed + failed == 0 && !success {
        failed = 1;
    }
    TestOutcome {
        passed,
        failed,
        success,
        raw_output: output.to_string(),
    }
}
