//! JSON output renderer.
//!
//! Outputs the [`SuiteSummary`] as `{"total", "passed", "failed", "crashed", "results": [...]}`.
//! A context comparison adds both summaries, their test totals, the
//! pass delta and the per-scenario verdict changes.

use serde_json::json;

use crate::models::{ContextComparison, SuiteSummary};
use crate::output::SuiteRenderer;

pub struct JsonRenderer;

impl SuiteRenderer for JsonRenderer {
    fn render(&self, summary: &SuiteSummary) -> String {
        serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
    }

    fn render_comparison(&self, comparison: &ContextComparison) -> String {
        let value = json!({
            "without_context": comparison.without_context,
            "with_context": comparison.with_context,
            "test_totals": {
                "without_context": comparison.without_context.test_totals(),
                "with_context": comparison.with_context.test_totals(),
            },
            "passed_delta": comparison.passed_delta(),
            "scenarios": comparison.scenarios(),
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScenarioResult, Verdict};

    #[test]
    fn render_json() {
        let summary = SuiteSummary::from_results(vec![ScenarioResult {
            scenario_id: "FEE-01".into(),
            verdict: Verdict::Fail,
            mr_url: None,
            pre_fix: None,
            post_fix: None,
            suggestions: 1,
            error: None,
        }]);
        let parsed: serde_json::Value =
            serde_json::from_str(&JsonRenderer.render(&summary)).unwrap();
        assert_eq!(parsed["total"], 1);
        assert_eq!(parsed["failed"], 1);
        assert_eq!(parsed["results"][0]["verdict"], "FAIL");
        assert!(parsed["results"][0].get("mr_url").is_none());
    }

    #[test]
    fn render_comparison_json() {
        let run = |verdict| {
            SuiteSummary::from_results(vec![ScenarioResult {
                scenario_id: "FEE-01".into(),
                verdict,
                mr_url: None,
                pre_fix: None,
                post_fix: None,
                suggestions: 0,
                error: None,
            }])
        };
        let comparison = ContextComparison {
            without_context: run(Verdict::Fail),
            with_context: run(Verdict::Pass),
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&JsonRenderer.render_comparison(&comparison)).unwrap();
        assert_eq!(parsed["passed_delta"], 1);
        assert_eq!(parsed["with_context"]["passed"], 1);
        assert_eq!(parsed["scenarios"][0]["change"], "improved");
        assert_eq!(parsed["test_totals"]["with_context"]["post_total"], 0);
    }
}
