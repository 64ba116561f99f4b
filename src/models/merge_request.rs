//! Merge request types shared by the host implementations and the
//! review pipeline.

use serde::{Deserialize, Serialize};

/// An open (or recently merged) merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Project-scoped merge request number.
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Current head revision of the source branch.
    pub head_sha: String,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub target_branch: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub state: String,
}

/// A comment on a merge request. Higher ids were posted later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub body: String,
}

/// Revision triple a positioned comment is anchored to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRefs {
    pub base_sha: String,
    pub start_sha: String,
    pub head_sha: String,
}

/// Metadata of a single commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author_name: String,
}

/// A comment anchored to a line of the new file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineComment {
    pub file_path: String,
    pub new_line: u32,
    pub body: String,
}

/// Shorten a revision id for display in notes.
pub fn short_revision(revision: &str) -> &str {
    let end = revision
        .char_indices()
        .nth(crate::constants::SHORT_REVISION_LEN)
        .map(|(i, _)| i)
        .unwrap_or(revision.len());
    &revision[..end]
}

/// Whether two revision ids name the same commit.
///
/// Notes carry shortened ids, so an id equals any longer id it prefixes.
/// Ids shorter than 7 characters only match exactly.
pub fn same_revision(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= 7 && long.starts_with(short)
}
