//! Optional repository context handed to the suggestion agent.
//!
//! The context is reference material only: it helps the model match the
//! project's conventions but bugs must still come from the diff.

use std::collections::BTreeSet;

use crate::models::FileMap;
use crate::providers::TextCompletionProvider;

const CONTEXT_SYSTEM_PROMPT: &str = "You write concise repository overviews for code reviewers. \
Cover what the project does, its tech stack, how the code is organised, the conventions \
visible in the code, the key files, and what a reviewer should keep in mind. \
Stay under 400 words. Use short markdown sections.";

const README_LIMIT: usize = 3000;
const CONFIG_LIMIT: usize = 500;
const CONFIG_FILES_MAX: usize = 3;
const CODE_SAMPLE_LIMIT: usize = 800;
const CODE_SAMPLES_MAX: usize = 5;

const CONFIG_FILE_NAMES: &[&str] = &[
    "pyproject.toml",
    "requirements.txt",
    "setup.py",
    "package.json",
    "go.mod",
    "Cargo.toml",
    "pom.xml",
    "build.gradle",
];

const CODE_EXTENSIONS: &[&str] = &["py", "js", "ts", "go", "java", "rb", "rs", "cpp"];

/// How the repository context is obtained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContextSource {
    #[default]
    None,
    /// Fixed text, e.g. read from a file.
    Static(String),
    /// Summarised from the files by the provider.
    Generated,
}

impl ContextSource {
    /// Produce the context text, if any.
    ///
    /// `Generated` needs the repository files; without them it yields
    /// nothing.
    pub async fn resolve(
        &self,
        provider: &dyn TextCompletionProvider,
        files: Option<&FileMap>,
        project_name: &str,
    ) -> Option<String> {
        match self {
            ContextSource::None => None,
            ContextSource::Static(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            ContextSource::Generated => {
                let Some(files) = files.filter(|f| !f.is_empty()) else {
                    tracing::debug!("no files available for generated repository context");
                    return None;
                };
                let prompt = context_prompt(project_name, files);
                let answer = provider.ask(CONTEXT_SYSTEM_PROMPT, &prompt, 0.1).await;
                if answer.trim().is_empty() {
                    tracing::warn!("context generation failed, using basic overview");
                    Some(basic_overview(project_name, files))
                } else {
                    tracing::info!("generated repository context ({} chars)", answer.len());
                    Some(answer.trim().to_string())
                }
            }
        }
    }
}

/// What kind of file a path is, for context selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Readme,
    Config,
    Code,
    Other,
}

fn classify(path: &str) -> FileKind {
    let name = path.rsplit('/').next().unwrap_or(path);
    if name.to_uppercase().starts_with("README") {
        return FileKind::Readme;
    }
    if CONFIG_FILE_NAMES.contains(&name) {
        return FileKind::Config;
    }
    match name.rsplit_once('.') {
        Some((_, ext)) if CODE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => FileKind::Code,
        _ => FileKind::Other,
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Indented directory tree of every path in `files`.
fn file_tree(files: &FileMap) -> String {
    let mut entries: BTreeSet<String> = BTreeSet::new();
    for path in files.keys() {
        let parts: Vec<&str> = path.split('/').collect();
        for depth in 0..parts.len() {
            let prefix = parts[..=depth].join("/");
            if depth + 1 < parts.len() {
                entries.insert(format!("{prefix}/"));
            } else {
                entries.insert(prefix);
            }
        }
    }
    entries
        .iter()
        .map(|entry| {
            let trimmed = entry.trim_end_matches('/');
            let depth = trimmed.matches('/').count();
            let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
            let suffix = if entry.ends_with('/') { "/" } else { "" };
            format!("{}{}{}", "  ".repeat(depth), name, suffix)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn context_prompt(project_name: &str, files: &FileMap) -> String {
    let mut prompt = format!(
        "Repository: {project_name}\nFiles: {}\n\n## File Structure\n{}\n\n",
        files.len(),
        file_tree(files)
    );

    if let Some((path, content)) = files.iter().find(|(p, _)| classify(p) == FileKind::Readme) {
        prompt.push_str(&format!(
            "## README ({path})\n```\n{}\n```\n\n",
            truncate(content, README_LIMIT)
        ));
    }

    let configs: Vec<_> = files
        .iter()
        .filter(|(p, _)| classify(p) == FileKind::Config)
        .take(CONFIG_FILES_MAX)
        .collect();
    if !configs.is_empty() {
        prompt.push_str("## Configuration Files\n");
        for (path, content) in configs {
            prompt.push_str(&format!(
                "### {path}\n```\n{}\n```\n\n",
                truncate(content, CONFIG_LIMIT)
            ));
        }
    }

    let code: Vec<_> = files
        .iter()
        .filter(|(p, _)| classify(p) == FileKind::Code)
        .take(CODE_SAMPLES_MAX)
        .collect();
    if !code.is_empty() {
        prompt.push_str("## Sample Code Files\n");
        for (path, content) in code {
            prompt.push_str(&format!(
                "### {path} ({} lines)\n```\n{}\n```\n\n",
                content.lines().count(),
                truncate(content, CODE_SAMPLE_LIMIT)
            ));
        }
    }

    prompt.push_str("Summarise this repository for a code reviewer.");
    prompt
}

/// Deterministic overview used when the provider gives no answer.
pub fn basic_overview(project_name: &str, files: &FileMap) -> String {
    let mut languages: BTreeSet<String> = BTreeSet::new();
    for path in files.keys() {
        if classify(path) == FileKind::Code {
            if let Some((_, ext)) = path.rsplit_once('.') {
                languages.insert(ext.to_lowercase());
            }
        }
    }
    let languages = if languages.is_empty() {
        "unknown".to_string()
    } else {
        languages.into_iter().collect::<Vec<_>>().join(", ")
    };
    format!(
        "# Repository Overview\n{project_name} ({} files)\n\n# Languages\n{languages}\n\n# File Structure\n{}",
        files.len(),
        file_tree(files)
    )
}
