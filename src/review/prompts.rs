//! System prompts and user-prompt builders for each review agent.

use crate::models::{BugReport, CommitInfo, MergeRequest, ReviewContext, ValidatedSuggestion};

pub const LEAD_SYSTEM_PROMPT: &str = r#"You are a senior technical lead reviewing a merge request for a financial system.
Assess the change as a whole: business value, architectural soundness, risk.

Answer with a single JSON object and nothing else:
{
  "tldr": "two or three sentence executive summary",
  "risk_assessment": "CRITICAL | HIGH | MEDIUM | LOW",
  "review_summary": "one paragraph on the quality of the approach",
  "architect_instructions": "what the bug-hunting reviewer should look for in this diff",
  "labels_to_add": ["ready-for-merge" | "needs-review" | "changes-requested"],
  "final_decision": "APPROVE | CHANGES_REQUESTED | BLOCK"
}"#;

pub const ARCHITECT_SYSTEM_PROMPT: &str = r#"You are a principal engineer hunting for critical defects in a code diff.
Report only bugs that crash, corrupt data (including floating-point money math), leak resources or open security holes. Ignore style.
Report at most three bugs and only bugs present in the diff.

Answer with a JSON list and nothing else:
[
  {
    "file_path": "path/of/the/file",
    "bad_code_snippet": "one line copied exactly from the diff",
    "issue_type": "Precision Error | Race Condition | Logic Error | Security | ...",
    "severity": "CRITICAL | HIGH | MEDIUM | LOW",
    "description": "why this breaks in production",
    "suggested_fix": "the corrected line, same indentation, no markdown"
  }
]
Return [] when there is nothing critical."#;

pub const FOLLOW_UP_SYSTEM_PROMPT: &str = r#"You are a friendly senior developer reviewing a teammate's latest commit.
Be encouraging and concrete. If earlier review issues are listed, say whether this commit fixes them.

Answer with a single JSON object and nothing else:
{
  "summary": "two or three sentences on what changed",
  "feedback": "one or two sentences of constructive feedback",
  "risk": "CRITICAL | HIGH | MEDIUM | LOW",
  "status_label": "ready-for-merge | needs-review | changes-requested"
}"#;

pub const INTEGRATION_SYSTEM_PROMPT: &str = "You are a code integration tool. \
Apply the requested replacements to the file and return the complete updated file. \
Output only the code, with no explanations and no markdown fences.";

/// Input for the lead agent.
pub fn lead_prompt(mr: &MergeRequest, diff_text: &str) -> String {
    format!(
        "TITLE: {}\nDESC: {}\n\nDIFF:\n{}",
        mr.title, mr.description, diff_text
    )
}

/// Base input for the suggestion agent, before any retry feedback.
pub fn architect_prompt(instructions: &str, repo_context: Option<&str>, diff_text: &str) -> String {
    let mut prompt = format!("DIRECTIVES FROM THE LEAD: \"{instructions}\"\n\n");
    prompt.push_str(
        "RULES:\n\
         1. `bad_code_snippet` must be copied character for character from a `+` or context line of the diff, whitespace included.\n\
         2. Use the file path exactly as it appears after `File:`.\n\
         3. Only report bugs inside the diff.\n\n",
    );
    if let Some(context) = repo_context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("### REPOSITORY CONTEXT (Reference Only)\n");
        prompt.push_str(context.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str("FULL DIFF:\n");
    prompt.push_str(diff_text);
    prompt
}

/// Input for the follow-up agent.
pub fn follow_up_prompt(commit: &CommitInfo, context: &ReviewContext, changes_text: &str) -> String {
    let message = if commit.message.trim().is_empty() {
        &commit.title
    } else {
        &commit.message
    };
    let mut prompt = format!(
        "COMMIT: {}\nAUTHOR: {}\nMSG: {}\n\n",
        commit.id,
        commit.author_name,
        message.trim()
    );

    if !context.is_empty() {
        prompt.push_str("PREVIOUS REVIEW CONTEXT:\n");
        if let Some(lead) = &context.lead_summary {
            prompt.push_str(&format!("Lead summary: {}\n", lead.tldr));
            if !lead.risk_assessment.is_empty() {
                prompt.push_str(&format!("Risk: {}\n", lead.risk_assessment));
            }
        }
        if !context.reported_issues.is_empty() {
            prompt.push_str("Previously reported issues:\n");
            for (i, issue) in context.reported_issues.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, issue_line(issue)));
            }
            prompt.push_str("Check whether this commit fixes them.\n");
        }
        prompt.push('\n');
    }

    prompt.push_str("CHANGES:\n");
    prompt.push_str(changes_text);
    prompt
}

fn issue_line(issue: &BugReport) -> String {
    let kind = if issue.issue_type.is_empty() {
        "Issue"
    } else {
        issue.issue_type.as_str()
    };
    format!(
        "[{}] {} in {}: {}",
        issue.severity, kind, issue.file_path, issue.description
    )
}

/// Input for the integration agent: one file plus its replacements.
pub fn integration_prompt(file_path: &str, content: &str, fixes: &[&ValidatedSuggestion]) -> String {
    let mut prompt = format!("FILE: {file_path}\n```\n{content}\n```\n\n");
    for (i, fix) in fixes.iter().enumerate() {
        prompt.push_str(&format!(
            "--- FIX #{} ({}) ---\nReplace:\n{}\nWith:\n{}\n\n",
            i + 1,
            fix.report.issue_type,
            fix.report.bad_code_snippet,
            fix.report.suggested_fix
        ));
    }
    prompt.push_str("Return the complete updated file.");
    prompt
}
