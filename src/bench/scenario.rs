//! Loading benchmark scenarios from TOML files.
//!
//! A scenario file holds shared `[base_files]` plus one or more
//! `[[scenarios]]`:
//!
//! ```toml
//! [base_files]
//! "requirements.txt" = "pytest\n"
//!
//! [[scenarios]]
//! id = "FEE-01"
//! name = "Transaction fees"
//! branch = "feat/fees"
//! description = "Adds a percentage fee."
//!
//! [scenarios.changes]
//! "bank/fees.py" = "..."
//!
//! [scenarios.tests]
//! "tests/test_fees.py" = "..."
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::models::{FileMap, Scenario};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid scenario '{id}' in {path}: {reason}")]
    Invalid {
        path: PathBuf,
        id: String,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    base_files: FileMap,
    #[serde(default)]
    scenarios: Vec<Scenario>,
}

/// Parse one scenario file. Shared base files are layered under each
/// scenario's own base files.
pub fn parse_scenarios(text: &str, path: &Path) -> Result<Vec<Scenario>, ScenarioError> {
    let file: ScenarioFile = toml::from_str(text).map_err(|source| ScenarioError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    file.scenarios
        .into_iter()
        .map(|mut scenario| {
            let mut base = file.base_files.clone();
            base.extend(std::mem::take(&mut scenario.base_files));
            scenario.base_files = base;
            validate(&scenario).map_err(|reason| ScenarioError::Invalid {
                path: path.to_path_buf(),
                id: scenario.id.clone(),
                reason,
            })?;
            Ok(scenario)
        })
        .collect()
}

fn validate(scenario: &Scenario) -> Result<(), String> {
    let id = scenario.id.trim();
    if id.is_empty() {
        return Err("id is empty".into());
    }
    if id.contains(|c: char| c.is_whitespace() || c == '/') {
        return Err("id must not contain whitespace or '/'".into());
    }
    let branch = scenario.branch.trim();
    if branch.is_empty() || branch == "main" {
        return Err("branch must be set and differ from 'main'".into());
    }
    if scenario.changes.is_empty() {
        return Err("scenario has no changes".into());
    }
    Ok(())
}

pub fn load_file(path: &Path) -> Result<Vec<Scenario>, ScenarioError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scenarios(&text, path)
}

/// Load a scenario file, or every `*.toml` in a directory in file-name
/// order.
///
/// In a directory, files that fail to load are logged and skipped, as
/// are scenarios whose id was already seen.
pub fn load(path: &Path) -> Result<Vec<Scenario>, ScenarioError> {
    let meta = std::fs::metadata(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.is_file() {
        return load_file(path);
    }

    let mut scenarios: Vec<Scenario> = Vec::new();
    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        let file = entry.path();
        if !entry.file_type().is_file() || file.extension().is_none_or(|ext| ext != "toml") {
            continue;
        }
        match load_file(file) {
            Ok(loaded) => {
                for scenario in loaded {
                    if scenarios.iter().any(|s| s.id == scenario.id) {
                        tracing::warn!(id = %scenario.id, file = %file.display(), "duplicate scenario id, skipping");
                    } else {
                        scenarios.push(scenario);
                    }
                }
            }
            Err(e) => tracing::warn!("skipping scenario file: {e}"),
        }
    }
    Ok(scenarios)
}

/// Keep only the scenarios named in `only`; all of them when it is empty.
pub fn select(scenarios: Vec<Scenario>, only: &[String]) -> Vec<Scenario> {
    if only.is_empty() {
        return scenarios;
    }
    for id in only {
        if !scenarios.iter().any(|s| s.id.eq_ignore_ascii_case(id)) {
            tracing::warn!(%id, "no scenario with this id");
        }
    }
    scenarios
        .into_iter()
        .filter(|s| only.iter().any(|id| s.id.eq_ignore_ascii_case(id)))
        .collect()
}
