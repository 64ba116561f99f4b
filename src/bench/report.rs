//! The benchmark report note posted on each scenario's merge request.

use crate::constants::BENCHMARK_REPORT_MARKER;
use crate::models::TestOutcome;

/// How much of each test log the report keeps.
pub const LOG_TAIL_CHARS: usize = 800;

/// Last [`LOG_TAIL_CHARS`] characters of `output`, with triple backticks
/// removed so the log cannot close the report's code block.
pub fn log_tail(output: &str) -> String {
    let count = output.chars().count();
    let tail: String = output
        .chars()
        .skip(count.saturating_sub(LOG_TAIL_CHARS))
        .collect();
    tail.replace("```", "")
}

fn status(outcome: &TestOutcome) -> &'static str {
    if outcome.success {
        "🟢 Passed"
    } else {
        "🔴 Failed"
    }
}

/// Markdown body of the report. `passed` is the scenario verdict.
pub fn benchmark_report(pre: &TestOutcome, post: &TestOutcome, passed: bool) -> String {
    let conclusion = if passed {
        "🏆 **BENCHMARK PASSED**"
    } else {
        "💀 **BENCHMARK FAILED**"
    };
    format!(
        "{BENCHMARK_REPORT_MARKER}\n\n\
         | Stage | Status | Score | Details |\n\
         |-------|:------:|:-----:|---------|\n\
         | **Pre-Fix** | {} | **{}** | Original Code |\n\
         | **Post-Fix** | {} | **{}** | AI Auto-Fix |\n\n\
         **Conclusion:** {conclusion}\n\n\
         <details><summary>🔍 View Test Logs</summary>\n\n\
         **Pre-Fix Output:**\n```\n{}\n```\n\n\
         **Post-Fix Output:**\n```\n{}\n```\n\
         </details>",
        status(pre),
        pre.score(),
        status(post),
        post.score(),
        log_tail(&pre.raw_output),
        log_tail(&post.raw_output),
    )
}
