//! Retry-until-valid loop for diff-anchored suggestions.
//!
//! Each attempt asks the provider for bug reports, decodes them, anchors
//! every snippet to a diff line and either accepts the batch (posting one
//! inline comment per suggestion) or retries with the unmatched snippets
//! fed back into the prompt. Nothing is posted before a batch has been
//! accepted, and a batch is only accepted once at least one post went
//! through.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::ReviewerConfig;
use crate::diff::{DiffLineIndex, SnippetMatcher};
use crate::extract::{ExtractedResponse, extract_bug_reports};
use crate::host::{HostError, VersionControlHost};
use crate::models::{BugReport, InlineComment, ValidatedSuggestion};
use crate::providers::TextCompletionProvider;
use crate::transcript::{Transcript, TranscriptEntry};

use super::comment::inline_comment_body;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Requesting,
    Parsing,
    Matching,
    Accepted,
    Exhausted,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Requesting => "requesting",
            LoopState::Parsing => "parsing",
            LoopState::Matching => "matching",
            LoopState::Accepted => "accepted",
            LoopState::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// Receives accepted suggestions, one call each.
#[async_trait]
pub trait SuggestionSink: Send + Sync {
    async fn post(&self, suggestion: &ValidatedSuggestion) -> Result<(), HostError>;
}

/// Posts suggestions as positioned comments on a merge request.
pub struct InlineCommentSink<'a> {
    host: &'a dyn VersionControlHost,
    iid: u64,
}

impl<'a> InlineCommentSink<'a> {
    pub fn new(host: &'a dyn VersionControlHost, iid: u64) -> Self {
        Self { host, iid }
    }
}

#[async_trait]
impl SuggestionSink for InlineCommentSink<'_> {
    async fn post(&self, suggestion: &ValidatedSuggestion) -> Result<(), HostError> {
        let comment = InlineComment {
            file_path: suggestion.report.file_path.clone(),
            new_line: suggestion.target_line,
            body: inline_comment_body(&suggestion.report),
        };
        self.host.post_inline_comment(self.iid, &comment).await
    }
}

/// Bounded record of snippets that failed to match, most recent last.
#[derive(Debug, Clone)]
pub struct FeedbackLog {
    window: usize,
    snippets: VecDeque<String>,
}

impl FeedbackLog {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            snippets: VecDeque::new(),
        }
    }

    /// Remember `snippet`, moving a repeat to the back and evicting the
    /// oldest entry once the window is full.
    pub fn record(&mut self, snippet: &str) {
        let snippet = snippet.trim();
        if snippet.is_empty() || self.window == 0 {
            return;
        }
        self.snippets.retain(|s| s != snippet);
        self.snippets.push_back(snippet.to_string());
        while self.snippets.len() > self.window {
            self.snippets.pop_front();
        }
    }

    pub fn snippets(&self) -> impl Iterator<Item = &str> {
        self.snippets.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// The prompt section describing earlier failures, if any.
    pub fn render(&self) -> Option<String> {
        if self.snippets.is_empty() {
            return None;
        }
        let mut out = String::from(
            "### PREVIOUSLY UNMATCHED SNIPPETS\n\
             These snippets from your earlier answers do not appear in the diff. \
             Copy lines exactly from the diff, whitespace included:\n",
        );
        for snippet in &self.snippets {
            out.push_str(&format!("- `{snippet}`\n"));
        }
        Some(out)
    }
}

/// Matched and unmatched halves of one decoded batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchMatch {
    pub valid: Vec<ValidatedSuggestion>,
    pub unmatched: Vec<String>,
}

/// Anchor every report of a batch. The first suggestion for a given
/// `(file, line)` wins; later ones are dropped.
pub fn match_batch(
    reports: Vec<BugReport>,
    index: &DiffLineIndex,
    matcher: &SnippetMatcher,
) -> BatchMatch {
    let mut batch = BatchMatch::default();
    let mut seen: HashSet<(String, u32)> = HashSet::new();

    for report in reports {
        match matcher.find(&report.bad_code_snippet, index, &report.file_path) {
            Some(found) => {
                if !seen.insert((report.file_path.clone(), found.line_number)) {
                    tracing::debug!(
                        file = %report.file_path,
                        line = found.line_number,
                        "dropping duplicate suggestion"
                    );
                    continue;
                }
                batch.valid.push(ValidatedSuggestion {
                    report,
                    target_line: found.line_number,
                    match_kind: found.kind,
                });
            }
            None => batch.unmatched.push(report.bad_code_snippet),
        }
    }
    batch
}

/// Terminal result of a loop run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    /// Suggestions of the accepted batch; empty when exhausted.
    pub suggestions: Vec<ValidatedSuggestion>,
    /// How many of them were posted successfully.
    pub posted: usize,
    /// Provider calls made.
    pub attempts: u32,
    pub final_state: LoopState,
}

impl LoopOutcome {
    pub fn accepted(&self) -> bool {
        self.final_state == LoopState::Accepted
    }

    pub(crate) fn exhausted(attempts: u32) -> Self {
        Self {
            suggestions: Vec::new(),
            posted: 0,
            attempts,
            final_state: LoopState::Exhausted,
        }
    }
}

/// The suggestion validation loop.
pub struct SuggestionValidationLoop<'a> {
    provider: &'a dyn TextCompletionProvider,
    config: &'a ReviewerConfig,
    matcher: SnippetMatcher,
    transcript: &'a Transcript,
}

impl<'a> SuggestionValidationLoop<'a> {
    pub fn new(
        provider: &'a dyn TextCompletionProvider,
        config: &'a ReviewerConfig,
        transcript: &'a Transcript,
    ) -> Self {
        Self {
            provider,
            config,
            matcher: SnippetMatcher::new(config.similarity_threshold),
            transcript,
        }
    }

    /// Run until a batch is accepted or the attempt budget is spent.
    pub async fn run(
        &self,
        system_prompt: &str,
        base_prompt: &str,
        index: &DiffLineIndex,
        sink: &dyn SuggestionSink,
    ) -> LoopOutcome {
        let max_attempts = self.config.max_retries_per_agent;
        let mut feedback = FeedbackLog::new(self.config.feedback_window);

        for attempt in 1..=max_attempts {
            if attempt > 1 && !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }

            let mut state = LoopState::Requesting;
            let prompt = match feedback.render() {
                Some(section) => format!("{base_prompt}\n\n{section}"),
                None => base_prompt.to_string(),
            };
            tracing::debug!(attempt, max_attempts, %state, prompt_chars = prompt.len());
            let response = self
                .provider
                .ask(system_prompt, &prompt, self.config.temperature)
                .await;

            state = LoopState::Parsing;
            let extracted = extract_bug_reports(&response);
            self.transcript.record(&TranscriptEntry {
                agent: "architect",
                attempt,
                system_prompt,
                user_prompt: &prompt,
                response: &response,
                parsed: !extracted.is_failure(),
                timestamp: Utc::now(),
            });
            let reports = match extracted {
                ExtractedResponse::BugReportList(reports) if !reports.is_empty() => reports,
                ExtractedResponse::BugReportList(_) => {
                    tracing::info!(attempt, %state, "no bug reports in response, retrying");
                    continue;
                }
                _ => {
                    tracing::info!(attempt, %state, "unusable response, retrying");
                    continue;
                }
            };

            state = LoopState::Matching;
            let reported = reports.len();
            let batch = match_batch(reports, index, &self.matcher);
            tracing::info!(
                attempt,
                %state,
                reported,
                matched = batch.valid.len(),
                unmatched = batch.unmatched.len(),
                "matched suggestions against diff"
            );

            if batch.valid.is_empty() || batch.valid.len() < self.config.min_valid_suggestions {
                for snippet in &batch.unmatched {
                    feedback.record(snippet);
                }
                tracing::info!(
                    attempt,
                    required = self.config.min_valid_suggestions,
                    "not enough matched suggestions, retrying"
                );
                continue;
            }

            let posted = post_all(sink, &batch.valid).await;
            if posted == 0 {
                tracing::warn!(attempt, "every inline post failed, retrying");
                continue;
            }

            tracing::info!(attempt, posted, "suggestion batch accepted");
            return LoopOutcome {
                suggestions: batch.valid,
                posted,
                attempts: attempt,
                final_state: LoopState::Accepted,
            };
        }

        tracing::warn!(
            attempts = max_attempts,
            "retry budget exhausted without a valid suggestion batch"
        );
        LoopOutcome::exhausted(max_attempts)
    }
}

/// Post every suggestion independently; returns how many succeeded.
async fn post_all(sink: &dyn SuggestionSink, suggestions: &[ValidatedSuggestion]) -> usize {
    let mut posted = 0;
    for suggestion in suggestions {
        match sink.post(suggestion).await {
            Ok(()) => posted += 1,
            Err(e) => tracing::warn!(
                file = suggestion.file_path(),
                line = suggestion.target_line,
                "failed to post suggestion: {e}"
            ),
        }
    }
    posted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ExtensionFilter;
    use crate::models::BugSeverity;
    use std::sync::Mutex;
    use std::time::Duration;

    fn report(file: &str, snippet: &str) -> BugReport {
        BugReport {
            file_path: file.into(),
            bad_code_snippet: snippet.into(),
            issue_type: String::new(),
            severity: BugSeverity::High,
            description: String::new(),
            suggested_fix: String::new(),
        }
    }

    const DIFF: &str = "File: fees.py\n@@ -0,0 +1,3 @@\n+rate = 0.015\n+fee = amount * rate\n+total = amount + fee\n";

    struct Canned(Mutex<VecDeque<String>>);

    #[async_trait]
    impl TextCompletionProvider for Canned {
        async fn ask(&self, _s: &str, _u: &str, _t: f64) -> String {
            self.0.lock().unwrap().pop_front().unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<u32>>);

    #[async_trait]
    impl SuggestionSink for Recorder {
        async fn post(&self, s: &ValidatedSuggestion) -> Result<(), HostError> {
            self.0.lock().unwrap().push(s.target_line);
            Ok(())
        }
    }

    fn config(max: u32) -> ReviewerConfig {
        ReviewerConfig {
            max_retries_per_agent: max,
            retry_delay: Duration::ZERO,
            ..ReviewerConfig::default()
        }
    }

    #[test]
    fn feedback_log_is_bounded_and_deduplicated() {
        let mut log = FeedbackLog::new(2);
        log.record("a");
        log.record("b");
        log.record("a");
        log.record("c");
        assert_eq!(log.snippets().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(log.render().unwrap().contains("- `c`"));
        assert!(FeedbackLog::new(3).render().is_none());
    }

    #[test]
    fn match_batch_collapses_duplicate_targets() {
        let index = DiffLineIndex::build(DIFF, &ExtensionFilter::default());
        let batch = match_batch(
            vec![
                report("fees.py", "fee = amount * rate"),
                report("fees.py", "fee=amount*rate"),
                report("fees.py", "import decimal"),
            ],
            &index,
            &SnippetMatcher::default(),
        );
        assert_eq!(batch.valid.len(), 1);
        assert_eq!(batch.valid[0].target_line, 2);
        assert_eq!(batch.unmatched, vec!["import decimal"]);
    }

    #[tokio::test]
    async fn unmatched_snippets_are_fed_back() {
        let provider = Canned(Mutex::new(VecDeque::from(vec![
            r#"[{"file_path": "fees.py", "bad_code_snippet": "fee = amount * 0.1"}]"#.to_string(),
            r#"[{"file_path": "fees.py", "bad_code_snippet": "rate = 0.015"},
                {"file_path": "fees.py", "bad_code_snippet": "total = amount + fee"}]"#
                .to_string(),
        ])));
        let cfg = config(5);
        let transcript = Transcript::disabled();
        let sink = Recorder::default();
        let index = DiffLineIndex::build(DIFF, &ExtensionFilter::default());

        let outcome = SuggestionValidationLoop::new(&provider, &cfg, &transcript)
            .run("sys", "base", &index, &sink)
            .await;

        assert!(outcome.accepted());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(*sink.0.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn zero_budget_is_immediately_exhausted() {
        let provider = Canned(Mutex::new(VecDeque::new()));
        let cfg = config(0);
        let transcript = Transcript::disabled();
        let index = DiffLineIndex::build(DIFF, &ExtensionFilter::default());
        let outcome = SuggestionValidationLoop::new(&provider, &cfg, &transcript)
            .run("sys", "base", &index, &Recorder::default())
            .await;
        assert_eq!(outcome.final_state, LoopState::Exhausted);
        assert_eq!(outcome.attempts, 0);
    }
}
