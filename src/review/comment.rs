//! Note and inline-comment bodies, and the markers read back from them.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{FOLLOW_UP_MARKER, INITIAL_REVIEW_MARKER};
use crate::models::merge_request::short_revision;
use crate::models::{BugReport, CommitInfo, FollowUpReview, LeadSummary};

/// `**Revision:** `abc12345`` or `**Commit:** `abc12345``.
static REVISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*(?:Revision|Commit):\*\*\s*`([0-9a-fA-F]{7,40})`").unwrap()
});

/// Body of an inline suggestion comment.
pub fn inline_comment_body(report: &BugReport) -> String {
    let mut body = format!("🚨 **{}**", report.severity);
    if !report.issue_type.trim().is_empty() {
        body.push_str(&format!(" · {}", report.issue_type.trim()));
    }
    if !report.description.trim().is_empty() {
        body.push_str(&format!("\n\n{}", report.description.trim()));
    }
    if !report.suggested_fix.trim().is_empty() {
        body.push_str(&format!(
            "\n\n```suggestion\n{}\n```",
            report.suggested_fix.trim_end()
        ));
    }
    body
}

/// Note posted by the initial review.
pub fn lead_summary_note(summary: &LeadSummary, revision: &str) -> String {
    let decision = if summary.final_decision.trim().is_empty() {
        "N/A"
    } else {
        summary.final_decision.trim()
    };
    let mut note = format!(
        "{INITIAL_REVIEW_MARKER}\n\n**Revision:** `{}`\n\n**TL;DR:** {}\n\n",
        short_revision(revision),
        summary.tldr.trim()
    );
    if !summary.review_summary.trim().is_empty() {
        note.push_str(summary.review_summary.trim());
        note.push_str("\n\n");
    }
    note.push_str(&format!(
        "**Risk:** {}\n**Decision:** **{}**",
        summary.risk_assessment.trim(),
        decision
    ));
    note
}

/// Note posted by a follow-up review. `timestamp` is pre-formatted.
pub fn follow_up_note(commit: &CommitInfo, review: &FollowUpReview, timestamp: &str) -> String {
    let author = if commit.author_name.trim().is_empty() {
        "unknown"
    } else {
        commit.author_name.trim()
    };
    let mut note = format!(
        "{FOLLOW_UP_MARKER}\n\n**Commit:** `{}` by {}\n**Time:** {}\n\n",
        short_revision(&commit.id),
        author,
        timestamp
    );
    if !review.summary.trim().is_empty() {
        note.push_str(review.summary.trim());
        note.push_str("\n\n");
    }
    note.push_str(&format!("**Feedback:** {}\n\n", review.feedback.trim()));
    if !review.risk.trim().is_empty() {
        note.push_str(&format!("**Risk:** {}\n", review.risk.trim()));
    }
    let status = if review.status_label.trim().is_empty() {
        "n/a"
    } else {
        review.status_label.trim()
    };
    note.push_str(&format!("**Status:** `{status}`\n\n*Automated review* 🤖"));
    note
}

pub fn is_initial_review_note(body: &str) -> bool {
    body.contains(INITIAL_REVIEW_MARKER)
}

pub fn is_follow_up_note(body: &str) -> bool {
    body.contains(FOLLOW_UP_MARKER)
}

/// Revision id recorded in a review note, if any.
///
/// Both note kinds put the marker line first, ahead of any model-written
/// text, so the first match wins.
pub fn parse_revision_marker(body: &str) -> Option<String> {
    REVISION_RE
        .captures(body)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BugSeverity;

    #[test]
    fn inline_body_has_suggestion_block() {
        let report = BugReport {
            file_path: "fees.py".into(),
            bad_code_snippet: "fee = amount * 0.015".into(),
            issue_type: "Precision Error".into(),
            severity: BugSeverity::Critical,
            description: "Float arithmetic on money.".into(),
            suggested_fix: "    fee = amount * Decimal('0.015')\n".into(),
        };
        assert_eq!(
            inline_comment_body(&report),
            "🚨 **CRITICAL** · Precision Error\n\nFloat arithmetic on money.\n\n\
             ```suggestion\n    fee = amount * Decimal('0.015')\n```"
        );
    }

    #[test]
    fn lead_note_round_trips_revision() {
        let summary = LeadSummary {
            tldr: "Adds fees".into(),
            risk_assessment: "HIGH".into(),
            final_decision: "CHANGES_REQUESTED".into(),
            ..LeadSummary::default()
        };
        let note = lead_summary_note(&summary, "0123456789abcdef0123");
        assert!(is_initial_review_note(&note));
        assert!(note.contains("**Decision:** **CHANGES_REQUESTED**"));
        assert_eq!(parse_revision_marker(&note).as_deref(), Some("01234567"));
    }

    #[test]
    fn follow_up_note_round_trips_revision() {
        let commit = CommitInfo {
            id: "ABCDEF0123456789".into(),
            title: "fix".into(),
            message: "fix".into(),
            author_name: "dev".into(),
        };
        let review = FollowUpReview {
            summary: "Switched to Decimal.".into(),
            feedback: "Nice.".into(),
            risk: "LOW".into(),
            status_label: "ready-for-merge".into(),
        };
        let note = follow_up_note(&commit, &review, "2026-01-01 10:00:00 UTC");
        assert!(is_follow_up_note(&note));
        assert!(!is_initial_review_note(&note));
        assert!(note.contains("**Commit:** `ABCDEF01` by dev"));
        assert!(note.contains("**Status:** `ready-for-merge`"));
        assert_eq!(parse_revision_marker(&note).as_deref(), Some("abcdef01"));
    }

    #[test]
    fn quoted_marker_in_summary_does_not_override_revision() {
        let summary = LeadSummary {
            tldr: "Reverts **Commit:** `deadbeef` from last week".into(),
            review_summary: "See **Revision:** `cafebabe` for context.".into(),
            ..LeadSummary::default()
        };
        let note = lead_summary_note(&summary, "0123456789abcdef");
        assert!(note.starts_with(&format!("{INITIAL_REVIEW_MARKER}\n\n**Revision:** `01234567`")));
        assert_eq!(parse_revision_marker(&note).as_deref(), Some("01234567"));
    }

    #[test]
    fn marker_requires_hex_revision() {
        assert_eq!(parse_revision_marker("**Revision:** `N/A`"), None);
        assert_eq!(parse_revision_marker("no marker here"), None);
    }
}
