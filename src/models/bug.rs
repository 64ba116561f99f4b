//! Bug report types: the untrusted records decoded from a model response
//! and the suggestions that survived diff matching.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::review::lenient_string;

/// Severity of a reported bug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BugSeverity {
    Low,
    Medium,
    #[default]
    High,
    Critical,
}

/// Lenient deserializer for [`BugSeverity`].
///
/// Models answer with "Blocker", "major", "P1" and the like. Known
/// synonyms are mapped; anything else (including non-string values)
/// falls back to the default rather than rejecting the whole report.
impl<'de> Deserialize<'de> for BugSeverity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Other(serde::de::IgnoredAny),
        }

        let raw = Raw::deserialize(deserializer)?;
        let Raw::Text(s) = raw else {
            return Ok(BugSeverity::default());
        };
        Ok(match s.trim().to_lowercase().as_str() {
            "critical" | "blocker" | "fatal" | "severe" | "p0" => BugSeverity::Critical,
            "high" | "error" | "major" | "p1" => BugSeverity::High,
            "medium" | "moderate" | "warning" | "warn" | "p2" => BugSeverity::Medium,
            "low" | "minor" | "info" | "trivial" | "p3" => BugSeverity::Low,
            _ => BugSeverity::default(),
        })
    }
}

impl fmt::Display for BugSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BugSeverity::Low => write!(f, "LOW"),
            BugSeverity::Medium => write!(f, "MEDIUM"),
            BugSeverity::High => write!(f, "HIGH"),
            BugSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A bug record as claimed by the model. Nothing in it is trusted until
/// `bad_code_snippet` has been located in the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugReport {
    pub file_path: String,
    pub bad_code_snippet: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub issue_type: String,
    #[serde(default)]
    pub severity: BugSeverity,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub suggested_fix: String,
}

impl BugReport {
    /// Decode a list of loosely-typed values, dropping elements that lack
    /// the required fields.
    pub fn from_values(values: Vec<serde_json::Value>) -> Vec<BugReport> {
        values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<BugReport>(value) {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::debug!("dropping malformed bug report: {e}");
                    None
                }
            })
            .collect()
    }
}

/// How a snippet was anchored to its diff line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "score", rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy(f64),
}

/// A bug report resolved to a line of the new file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedSuggestion {
    pub report: BugReport,
    pub target_line: u32,
    pub match_kind: MatchKind,
}

impl ValidatedSuggestion {
    pub fn file_path(&self) -> &str {
        &self.report.file_path
    }
}
