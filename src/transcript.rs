//! Optional on-disk log of every model exchange.
//!
//! One JSON object per line in `<dir>/transcript.jsonl`. Writing is best
//! effort: a failed write is logged and the review carries on.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single prompt/response pair.
#[derive(Debug, Serialize)]
pub struct TranscriptEntry<'a> {
    pub agent: &'a str,
    pub attempt: u32,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub response: &'a str,
    /// Whether the response decoded into the expected shape.
    pub parsed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Append-only transcript writer. Disabled by default.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    path: Option<PathBuf>,
}

impl Transcript {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: Some(dir.join("transcript.jsonl")),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn record(&self, entry: &TranscriptEntry<'_>) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_line(path, entry) {
            tracing::warn!("failed to write transcript {}: {e}", path.display());
        }
    }
}

fn append_line(path: &Path, entry: &TranscriptEntry<'_>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(entry)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}
