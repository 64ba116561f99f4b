//! Full benchmark scenario against an in-memory host and test runner.

mod common;

use common::{
    FakeHost, FakeProvisioner, FakeRunner, LEAD_JSON, ScriptedProvider, TWO_BUGS_JSON,
    fees_change, outcome, reviewer,
};
use reviewbench::bench::BenchmarkRunner;
use reviewbench::host::FileAction;
use reviewbench::models::{FileMap, Scenario, Verdict, VerdictChange};

const FIXED_FEES: &str = "```python\nfrom decimal import Decimal, ROUND_HALF_UP\n\n\
def apply_fee(amount):\n    fee = amount * Decimal('0.015')\n    total = amount + fee\n    \
return total.quantize(Decimal('0.01'), rounding=ROUND_HALF_UP)\n```";

fn scenario() -> Scenario {
    let mut base_files = FileMap::new();
    base_files.insert("requirements.txt".into(), "pytest\n".into());
    let mut tests = FileMap::new();
    tests.insert(
        "tests/test_fees.py".into(),
        "from decimal import Decimal\nfrom bank.fees import apply_fee\n\n\
         def test_fee():\n    assert apply_fee(Decimal('100.00')) == Decimal('101.50')\n"
            .into(),
    );
    let mut changes = FileMap::new();
    changes.insert(
        "bank/fees.py".into(),
        "def apply_fee(amount):\n    fee = amount * 0.015\n    total = amount + fee\n    return round(total, 2)\n\n"
            .into(),
    );
    Scenario {
        id: "FEE-01".into(),
        name: "Transaction fees".into(),
        branch: "feat/fees".into(),
        description: "Adds a percentage fee.".into(),
        changes,
        tests,
        base_files,
    }
}

fn host_with_fees_mr() -> FakeHost {
    let host = FakeHost::new();
    host.with_state(|s| {
        s.mr_changes.insert(1, vec![fees_change()]);
    });
    host
}

#[tokio::test]
async fn float_fee_scenario_passes_after_fixes() {
    let host = host_with_fees_mr();
    let provisioner = FakeProvisioner::new(host.clone());
    let runner = FakeRunner::new(vec![outcome(0, 1, false), outcome(1, 0, true)]);
    let provider = ScriptedProvider::new([LEAD_JSON, TWO_BUGS_JSON, FIXED_FEES]);

    let mut bench = BenchmarkRunner::new(
        provisioner.clone(),
        runner.clone(),
        reviewer(provider.clone(), 3),
        "ci",
    );
    let summary = bench.run_suite(&[scenario()]).await;

    assert_eq!(summary.total, 1);
    assert_eq!(summary.passed, 1);
    let result = &summary.results[0];
    assert_eq!(result.verdict, Verdict::Pass);
    assert_eq!(result.suggestions, 2);
    assert_eq!(result.pre_fix.as_ref().map(|o| o.success), Some(false));
    assert_eq!(result.post_fix.as_ref().map(|o| o.success), Some(true));
    assert!(result.mr_url.as_deref().unwrap_or_default().contains("merge_requests/1"));

    // Provisioning and cleanup are keyed by scenario and user tag.
    assert_eq!(provisioner.cleaned.lock().unwrap().as_slice(), ["fee-01-ci"]);
    assert!(provisioner.created.lock().unwrap()[0].starts_with("fee-01-ci-"));

    assert!(host.inline_comments().len() >= 2);

    let state = host.state.lock().unwrap();
    assert_eq!(state.branches, vec!["feat/fees".to_string()]);
    assert_eq!(state.merged, vec![1]);
    let (branch, _, files, action) = state.committed.last().unwrap();
    assert_eq!(branch, "feat/fees");
    assert_eq!(*action, FileAction::Update);
    assert!(files["bank/fees.py"].contains("Decimal('0.015')"));
    assert!(!files["bank/fees.py"].contains("```"));
    drop(state);

    // The post-fix run sees the rewritten file next to the tests.
    let runs = runner.runs.lock().unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs[1]["bank/fees.py"].contains("ROUND_HALF_UP"));
    assert!(runs[1].contains_key("tests/test_fees.py"));
    drop(runs);

    // The integration call runs deterministically.
    assert_eq!(provider.calls()[2].temperature, 0.0);

    let notes = host.notes_for(1);
    let report = notes.last().unwrap();
    assert!(report.starts_with("### 🧪 Automated Benchmark Report"));
    assert!(report.contains("**Conclusion:** 🏆 **BENCHMARK PASSED**"));
}

#[tokio::test]
async fn no_accepted_suggestions_scores_fail() {
    let host = host_with_fees_mr();
    let provisioner = FakeProvisioner::new(host.clone());
    let runner = FakeRunner::new(vec![outcome(0, 1, false), outcome(0, 1, false)]);
    let provider = ScriptedProvider::new([LEAD_JSON, "[]", "[]"]);

    let mut bench = BenchmarkRunner::new(provisioner, runner, reviewer(provider, 2), "ci");
    let result = bench.run_scenario(&scenario()).await;

    assert_eq!(result.verdict, Verdict::Fail);
    assert_eq!(result.suggestions, 0);
    assert!(result.error.is_none());
    assert_eq!(host.state.lock().unwrap().merged, vec![1]);
    let notes = host.notes_for(1);
    assert!(notes.last().unwrap().contains("💀 **BENCHMARK FAILED**"));
}

#[tokio::test]
async fn report_logs_are_truncated_and_unfenced() {
    let host = host_with_fees_mr();
    let provisioner = FakeProvisioner::new(host.clone());
    let mut noisy = outcome(0, 1, false);
    noisy.raw_output = format!("HEAD{}```tail```", "y".repeat(900));
    let runner = FakeRunner::new(vec![noisy.clone(), noisy]);
    let provider = ScriptedProvider::new([LEAD_JSON]);

    let mut bench = BenchmarkRunner::new(provisioner, runner, reviewer(provider, 1), "ci");
    bench.run_scenario(&scenario()).await;

    let notes = host.notes_for(1);
    let report = notes.last().unwrap();
    assert!(!report.contains("HEAD"));
    assert!(report.contains("yyytail\n```"));
    assert!(!report.contains("```tail"));
}

#[tokio::test]
async fn provisioning_failure_crashes_the_scenario() {
    let host = host_with_fees_mr();
    let provisioner = FakeProvisioner::refusing(host.clone());
    let runner = FakeRunner::new(Vec::new());
    let provider = ScriptedProvider::new(Vec::<String>::new());

    let mut bench = BenchmarkRunner::new(provisioner, runner.clone(), reviewer(provider.clone(), 1), "ci");
    let summary = bench.run_suite(&[scenario()]).await;

    assert_eq!(summary.crashed, 1);
    assert_eq!(summary.passed, 0);
    let result = &summary.results[0];
    assert_eq!(result.verdict, Verdict::Crash);
    assert!(result.error.as_deref().unwrap_or_default().contains("namespace is full"));
    assert!(result.mr_url.is_none());
    assert!(runner.runs.lock().unwrap().is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn runner_failure_crashes_but_keeps_the_merge_request_link() {
    let host = host_with_fees_mr();
    let provisioner = FakeProvisioner::new(host.clone());
    let provider = ScriptedProvider::new(Vec::<String>::new());

    let mut bench =
        BenchmarkRunner::new(provisioner, FakeRunner::broken(), reviewer(provider, 1), "ci");
    let result = bench.run_scenario(&scenario()).await;

    assert_eq!(result.verdict, Verdict::Crash);
    assert!(result.error.as_deref().unwrap_or_default().contains("test command is empty"));
    assert!(result.mr_url.as_deref().unwrap_or_default().contains("merge_requests/1"));
    assert!(result.pre_fix.is_none());
    assert!(host.notes_for(1).is_empty());
}

#[tokio::test]
async fn context_comparison_runs_the_suite_twice() {
    let host = host_with_fees_mr();
    host.with_state(|s| {
        s.mr_changes.insert(2, vec![fees_change()]);
    });
    let provisioner = FakeProvisioner::new(host.clone());
    let runner = FakeRunner::new(vec![
        outcome(0, 1, false),
        outcome(0, 1, false),
        outcome(0, 1, false),
        outcome(1, 0, true),
    ]);
    let provider = ScriptedProvider::new([
        LEAD_JSON,
        "[]",
        "[]",
        "Core banking service. Money is handled with Decimal.",
        LEAD_JSON,
        TWO_BUGS_JSON,
        FIXED_FEES,
    ]);

    let mut bench = BenchmarkRunner::new(
        provisioner.clone(),
        runner,
        reviewer(provider.clone(), 2),
        "ci",
    );
    let comparison = bench.compare_context(&[scenario()]).await;

    assert_eq!(comparison.without_context.failed, 1);
    assert_eq!(comparison.with_context.passed, 1);
    assert_eq!(comparison.passed_delta(), 1);
    let scenarios = comparison.scenarios();
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].change, VerdictChange::Improved);
    assert_eq!(comparison.with_context.test_totals().post_passed, 1);
    assert_eq!(provisioner.created.lock().unwrap().len(), 2);

    let calls = provider.calls();
    assert!(!calls[1].user_prompt.contains("REPOSITORY CONTEXT"));
    assert!(calls[5].user_prompt.contains("### REPOSITORY CONTEXT (Reference Only)"));
    assert!(calls[5].user_prompt.contains("Money is handled with Decimal."));
}
