//! Diff data model types.

use serde::{Deserialize, Serialize};

/// One per-file change as returned by the version-control host.
///
/// `diff` holds the unified-diff body for this file, usually starting at
/// the first `@@` hunk header (hosts strip the `diff --git` preamble).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    #[serde(default)]
    pub old_path: String,
    pub new_path: String,
    #[serde(default)]
    pub diff: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
}

impl FileChange {
    /// Render this change as a `File:`-headed section of plain diff text.
    ///
    /// This is the format prompts carry and the format
    /// [`crate::diff::DiffLineIndex::build`] reads back.
    pub fn to_section(&self) -> String {
        format!("File: {}\n{}\n", self.new_path, self.diff.trim_end_matches('\n'))
    }
}

/// A single line of a unified diff, addressed by its new-file position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// Path of the file in the new revision.
    pub file_path: String,
    /// 1-based line number in the new file.
    pub line_number: u32,
    /// Line content without the leading diff marker.
    pub raw_text: String,
    /// `raw_text` with every whitespace character removed.
    pub normalized_text: String,
    /// The line was added by the change.
    pub is_added: bool,
    /// The line is unchanged context present in both versions.
    pub is_context: bool,
}
