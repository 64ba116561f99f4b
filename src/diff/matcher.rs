//! Locating a model-quoted code snippet inside a [`DiffLineIndex`].
//!
//! Exact comparison of whitespace-free text first, then the best
//! normalized edit-distance ratio above a threshold. A wrong anchor is
//! worse than none, so anything under the threshold is rejected.

use crate::models::bug::MatchKind;

use super::parser::{DiffLineIndex, normalize_code};

/// Default minimum similarity for a fuzzy match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Slack for ratios that are mathematically on the threshold but land a
/// rounding error below it.
const SCORE_EPSILON: f64 = 1e-9;

/// Where a snippet was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnippetMatch {
    pub line_number: u32,
    pub kind: MatchKind,
}

/// Exact-then-fuzzy snippet lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnippetMatcher {
    threshold: f64,
}

impl Default for SnippetMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl SnippetMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find the line of `file_path` that `snippet` refers to.
    pub fn find(
        &self,
        snippet: &str,
        index: &DiffLineIndex,
        file_path: &str,
    ) -> Option<SnippetMatch> {
        let key = normalize_code(snippet);
        if key.is_empty() {
            return None;
        }

        let candidates = index.candidates(file_path);
        if candidates.is_empty() {
            tracing::debug!(file = file_path, "no candidate lines for file");
            return None;
        }

        if let Some(line) = candidates.iter().find(|l| l.normalized_text == key) {
            tracing::debug!(file = file_path, line = line.line_number, "exact snippet match");
            return Some(SnippetMatch {
                line_number: line.line_number,
                kind: MatchKind::Exact,
            });
        }

        let mut best: Option<(f64, u32)> = None;
        for line in &candidates {
            let score = similarity(&key, &line.normalized_text);
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, line.line_number));
            }
        }

        let (score, line_number) = best?;
        if score + SCORE_EPSILON >= self.threshold {
            tracing::debug!(
                file = file_path,
                line = line_number,
                score = format!("{score:.3}"),
                "fuzzy snippet match"
            );
            Some(SnippetMatch {
                line_number,
                kind: MatchKind::Fuzzy(score),
            })
        } else {
            tracing::debug!(
                file = file_path,
                best = format!("{score:.3}"),
                "snippet below similarity threshold"
            );
            None
        }
    }
}

/// Normalized edit-distance ratio in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}
