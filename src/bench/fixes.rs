//! Applying accepted suggestions to the scenario's files.

use chrono::Utc;
use indexmap::IndexMap;

use crate::extract::strip_code_fences;
use crate::models::{FileMap, ValidatedSuggestion};
use crate::providers::TextCompletionProvider;
use crate::review::prompts::{INTEGRATION_SYSTEM_PROMPT, integration_prompt};
use crate::transcript::{Transcript, TranscriptEntry};

/// Rewrite every file that has suggestions and return only the files
/// that changed.
///
/// The provider rewrites one whole file at a time at temperature 0.
/// Files missing from `files` and files whose rewrite comes back empty
/// are left alone.
pub async fn apply_fixes(
    provider: &dyn TextCompletionProvider,
    files: &FileMap,
    suggestions: &[ValidatedSuggestion],
    transcript: &Transcript,
) -> FileMap {
    let mut by_file: IndexMap<&str, Vec<&ValidatedSuggestion>> = IndexMap::new();
    for suggestion in suggestions {
        by_file
            .entry(suggestion.file_path())
            .or_default()
            .push(suggestion);
    }

    let mut updated = FileMap::new();
    for (path, fixes) in by_file {
        let Some(content) = files.get(path) else {
            tracing::warn!(path, "suggestion targets a file outside the scenario");
            continue;
        };

        let prompt = integration_prompt(path, content, &fixes);
        let response = provider.ask(INTEGRATION_SYSTEM_PROMPT, &prompt, 0.0).await;
        let code = strip_code_fences(&response);
        transcript.record(&TranscriptEntry {
            agent: "integration",
            attempt: 1,
            system_prompt: INTEGRATION_SYSTEM_PROMPT,
            user_prompt: &prompt,
            response: &response,
            parsed: !code.trim().is_empty(),
            timestamp: Utc::now(),
        });

        if code.trim().is_empty() {
            tracing::warn!(path, "integration returned nothing, keeping original");
            continue;
        }
        let mut code = code;
        if content.ends_with('\n') && !code.ends_with('\n') {
            code.push('\n');
        }
        if &code == content {
            tracing::info!(path, "integration left the file unchanged");
            continue;
        }
        tracing::info!(path, fixes = fixes.len(), "applied fixes");
        updated.insert(path.to_string(), code);
    }
    updated
}
