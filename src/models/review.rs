//! Structured answers of the summary agents and the context carried
//! between review phases of one merge request.

use serde::{Deserialize, Deserializer, Serialize};

use super::bug::BugReport;

/// The lead agent's assessment of a merge request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadSummary {
    #[serde(deserialize_with = "lenient_string")]
    pub tldr: String,
    #[serde(deserialize_with = "lenient_string")]
    pub risk_assessment: String,
    #[serde(deserialize_with = "lenient_string")]
    pub review_summary: String,
    /// Directives handed to the suggestion agent.
    #[serde(deserialize_with = "lenient_string")]
    pub architect_instructions: String,
    #[serde(deserialize_with = "string_or_list")]
    pub labels_to_add: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub final_decision: String,
}

impl LeadSummary {
    /// Instructions for the suggestion agent, with a fallback when the
    /// lead produced none.
    pub fn instructions_or_default(&self) -> &str {
        let trimmed = self.architect_instructions.trim();
        if trimmed.is_empty() {
            "Find critical bugs."
        } else {
            trimmed
        }
    }
}

/// The follow-up agent's answer for a new revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUpReview {
    #[serde(deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(deserialize_with = "lenient_string")]
    pub feedback: String,
    #[serde(deserialize_with = "lenient_string")]
    pub risk: String,
    #[serde(deserialize_with = "lenient_string")]
    pub status_label: String,
}

/// What earlier phases found, used to brief follow-up reviews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewContext {
    pub lead_summary: Option<LeadSummary>,
    pub reported_issues: Vec<BugReport>,
}

impl ReviewContext {
    pub fn is_empty(&self) -> bool {
        self.lead_summary.is_none() && self.reported_issues.is_empty()
    }
}

/// Accept any JSON value where a string is expected.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Accept either a list of strings or a single comma-separated string.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
