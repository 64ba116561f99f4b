//! Terminal renderer: one line per scenario, then a totals line.

use colored::Colorize;

use crate::models::{ContextComparison, ScenarioResult, SuiteSummary, Verdict, VerdictChange};
use crate::output::SuiteRenderer;

pub struct TerminalRenderer;

fn score(result: &ScenarioResult) -> String {
    let pre = result
        .pre_fix
        .as_ref()
        .map(|o| o.score())
        .unwrap_or_else(|| "-".into());
    let post = result
        .post_fix
        .as_ref()
        .map(|o| o.score())
        .unwrap_or_else(|| "-".into());
    format!("{pre} → {post}")
}

impl SuiteRenderer for TerminalRenderer {
    fn render(&self, summary: &SuiteSummary) -> String {
        if summary.results.is_empty() {
            return format!("{}", "  No scenarios were run.\n".yellow());
        }

        let mut output = String::new();
        for result in &summary.results {
            let (icon, verdict) = match result.verdict {
                Verdict::Pass => ("✔".green().bold(), "PASS".green().bold()),
                Verdict::Fail => ("✖".red().bold(), "FAIL".red().bold()),
                Verdict::Crash => ("⚠".yellow().bold(), "CRASH".yellow().bold()),
            };
            output.push_str(&format!(
                " {} {:<5} {}  tests {}, {} suggestion{}\n",
                icon,
                verdict,
                result.scenario_id.bold(),
                score(result),
                result.suggestions,
                if result.suggestions == 1 { "" } else { "s" }
            ));
            if let Some(url) = &result.mr_url {
                output.push_str(&format!("   {} {}\n", "→".cyan(), url.dimmed()));
            }
            if let Some(error) = &result.error {
                output.push_str(&format!("   {}\n", error.red()));
            }
        }

        output.push_str(&format!("{}\n", "───────────────────────────────────".dimmed()));
        output.push_str(&format!(
            " {} scenarios: {} passed, {} failed, {} crashed\n",
            summary.total.to_string().bold(),
            summary.passed.to_string().green().bold(),
            summary.failed.to_string().red().bold(),
            summary.crashed.to_string().yellow().bold(),
        ));
        output
    }

    fn render_comparison(&self, comparison: &ContextComparison) -> String {
        let without = &comparison.without_context;
        let with = &comparison.with_context;
        let (before, after) = (without.test_totals(), with.test_totals());

        let header = format!(
            " {:<24} {:>16} {:>16} {:>8}",
            "", "without context", "with context", "Δ"
        );
        let mut output = format!("{}\n", header.bold());
        let mut row = |label: &str, a: String, b: String, delta: String| {
            output.push_str(&format!(" {label:<24} {a:>16} {b:>16} {delta:>8}\n"));
        };
        row(
            "Scenarios",
            without.total.to_string(),
            with.total.to_string(),
            "-".into(),
        );
        row(
            "Passed",
            without.passed.to_string(),
            with.passed.to_string(),
            signed(comparison.passed_delta()),
        );
        row(
            "Pass rate",
            format!("{:.1}%", without.pass_rate()),
            format!("{:.1}%", with.pass_rate()),
            format!("{:+.1}%", with.pass_rate() - without.pass_rate()),
        );
        row(
            "Failed",
            without.failed.to_string(),
            with.failed.to_string(),
            signed(with.failed as i64 - without.failed as i64),
        );
        row(
            "Crashed",
            without.crashed.to_string(),
            with.crashed.to_string(),
            signed(with.crashed as i64 - without.crashed as i64),
        );
        row(
            "Tests passed (pre-fix)",
            format!("{}/{}", before.pre_passed, before.pre_total),
            format!("{}/{}", after.pre_passed, after.pre_total),
            "-".into(),
        );
        row(
            "Tests passed (post-fix)",
            format!("{}/{}", before.post_passed, before.post_total),
            format!("{}/{}", after.post_passed, after.post_total),
            signed(after.post_passed as i64 - before.post_passed as i64),
        );

        output.push_str(&format!("{}\n", "───────────────────────────────────".dimmed()));
        let scenarios = comparison.scenarios();
        let count = |kind| scenarios.iter().filter(|s| s.change == kind).count();
        for scenario in scenarios.iter().filter(|s| s.change != VerdictChange::Unchanged) {
            let label = match scenario.change {
                VerdictChange::Improved => format!("{:<9}", "IMPROVED").green().bold(),
                VerdictChange::Regressed => format!("{:<9}", "REGRESSED").red().bold(),
                _ => format!("{:<9}", "CHANGED").yellow().bold(),
            };
            output.push_str(&format!(
                " {label} {}  {} → {}\n",
                scenario.scenario_id.bold(),
                scenario.without_context,
                scenario.with_context
            ));
        }
        output.push_str(&format!(
            " {} improved, {} regressed, {} unchanged\n",
            count(VerdictChange::Improved).to_string().green().bold(),
            count(VerdictChange::Regressed).to_string().red().bold(),
            count(VerdictChange::Unchanged).to_string().bold(),
        ));

        let verdict = match comparison.passed_delta() {
            d if d > 0 => "Repository context improved the pass count".green().bold(),
            0 => "Repository context had no net effect".bold(),
            _ => "Repository context lowered the pass count".red().bold(),
        };
        output.push_str(&format!(" {verdict}\n"));
        output
    }
}

fn signed(delta: i64) -> String {
    format!("{delta:+}")
}
