//! Diff engine: unified diff indexing and snippet matching.

pub mod matcher;
pub mod parser;

pub use matcher::{DEFAULT_SIMILARITY_THRESHOLD, SnippetMatch, SnippetMatcher};
pub use parser::{DiffLineIndex, ExtensionFilter, normalize_code};

use crate::models::diff::FileChange;

/// Render per-file changes as the `File:`-sectioned text used in prompts.
///
/// Files outside `filter` are left out so the model only sees code it
/// can anchor suggestions to.
pub fn render_changes(changes: &[FileChange], filter: &ExtensionFilter) -> String {
    changes
        .iter()
        .filter(|c| !c.deleted_file && filter.allows(&c.new_path))
        .map(FileChange::to_section)
        .collect::<Vec<_>>()
        .join("\n")
}
