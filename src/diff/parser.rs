//! Unified diff parsing into a flat, line-addressable index.
//!
//! Accepts the three shapes hosts hand us: full `git diff` output
//! (`diff --git` headers), per-file bodies joined as `File: path`
//! sections, and per-file bodies passed alongside their path
//! ([`DiffLineIndex::from_changes`]).

use crate::models::diff::{DiffLine, FileChange};

/// File extensions whose lines are indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    /// Build a filter from extensions with or without the leading dot.
    /// An empty list admits every file.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// A filter that admits every file.
    pub fn any() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }

    pub fn allows(&self, path: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let Some((_, ext)) = path.rsplit_once('.') else {
            return false;
        };
        if ext.contains('/') {
            return false;
        }
        let ext = ext.to_lowercase();
        self.extensions.iter().any(|allowed| *allowed == ext)
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(["go", "py", "js", "java", "cpp", "ts", "rs"])
    }
}

/// Ordered table of the new-file lines of a diff.
///
/// Built fresh for every review cycle and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffLineIndex {
    lines: Vec<DiffLine>,
}

impl DiffLineIndex {
    /// Parse unified-diff text that may span several files.
    ///
    /// Never fails: an unparsable hunk header restarts numbering at 0 and
    /// empty input yields an empty index. Lines that appear before any
    /// file marker are indexed under an empty path and bypass `filter`.
    pub fn build(diff_text: &str, filter: &ExtensionFilter) -> Self {
        let mut builder = IndexBuilder::new(filter);
        for line in diff_text.lines() {
            builder.feed(line);
        }
        builder.finish()
    }

    /// Index the per-file changes returned by a host.
    pub fn from_changes(changes: &[FileChange], filter: &ExtensionFilter) -> Self {
        let mut builder = IndexBuilder::new(filter);
        for change in changes {
            builder.start_file(&change.new_path);
            for line in change.diff.lines() {
                builder.feed(line);
            }
        }
        builder.finish()
    }

    pub fn lines(&self) -> &[DiffLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines added by the change, in diff order.
    pub fn added_lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.is_added)
    }

    /// Matchable lines of `file_path`: added lines first, then context
    /// lines, each group in diff order.
    pub fn candidates(&self, file_path: &str) -> Vec<&DiffLine> {
        let wanted = normalize_path(file_path);
        let in_file = |l: &&DiffLine| normalize_path(&l.file_path) == wanted;
        self.lines
            .iter()
            .filter(in_file)
            .filter(|l| l.is_added)
            .chain(self.lines.iter().filter(in_file).filter(|l| l.is_context))
            .collect()
    }

    /// Whether `(file_path, line_number)` names an added or context line.
    pub fn contains(&self, file_path: &str, line_number: u32) -> bool {
        let wanted = normalize_path(file_path);
        self.lines.iter().any(|l| {
            l.line_number == line_number
                && (l.is_added || l.is_context)
                && normalize_path(&l.file_path) == wanted
        })
    }
}

/// Strip every whitespace character, the comparison form of a line.
pub fn normalize_code(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn normalize_path(path: &str) -> &str {
    path.trim().trim_start_matches("./")
}

/// Remaining old/new line counts of the hunk being read.
#[derive(Debug, Clone, Copy)]
struct HunkBudget {
    old: u32,
    new: u32,
}

impl HunkBudget {
    fn exhausted(self) -> bool {
        self.old == 0 && self.new == 0
    }
}

struct IndexBuilder<'a> {
    filter: &'a ExtensionFilter,
    lines: Vec<DiffLine>,
    file: Option<String>,
    include: bool,
    /// Set once a hunk header has been seen for the current file.
    in_hunk: bool,
    /// Known only when the hunk header parsed.
    budget: Option<HunkBudget>,
    counter: u32,
}

impl<'a> IndexBuilder<'a> {
    fn new(filter: &'a ExtensionFilter) -> Self {
        Self {
            filter,
            lines: Vec::new(),
            file: None,
            include: true,
            in_hunk: false,
            budget: None,
            counter: 0,
        }
    }

    fn start_file(&mut self, path: &str) {
        let path = path.trim();
        self.include = self.filter.allows(path);
        if !self.include {
            tracing::trace!(file = path, "skipping file outside allowed extensions");
        }
        self.file = Some(path.to_string());
        self.in_hunk = false;
        self.budget = None;
        self.counter = 0;
    }

    fn feed(&mut self, line: &str) {
        if line.starts_with("@@") {
            self.start_hunk(line);
            return;
        }

        // Inside a hunk with known counts every line is body, even one
        // that looks like `+++` or `diff`.
        if let Some(budget) = self.budget {
            if !budget.exhausted() {
                self.body_line(line);
                return;
            }
            self.in_hunk = false;
            self.budget = None;
        }

        if let Some(path) = line.strip_prefix("diff --git ") {
            let (_, new_path) = parse_diff_header(path);
            self.start_file(&new_path);
            return;
        }
        if let Some(path) = line.strip_prefix("File: ") {
            self.start_file(path);
            return;
        }
        if let Some(path) = line.strip_prefix("+++ ") {
            let path = path.trim();
            if path != "/dev/null" && self.file.is_none() {
                self.start_file(strip_diff_prefix(path));
            }
            return;
        }
        if is_metadata(line) {
            return;
        }

        if self.in_hunk {
            self.body_line(line);
        }
    }

    fn start_hunk(&mut self, header: &str) {
        self.in_hunk = true;
        match parse_hunk_header(header) {
            Some((_, old_count, new_start, new_count)) => {
                self.counter = new_start.saturating_sub(1);
                self.budget = Some(HunkBudget {
                    old: old_count,
                    new: new_count,
                });
            }
            None => {
                tracing::debug!(header, "unparsable hunk header, numbering from 0");
                self.counter = 0;
                self.budget = None;
            }
        }
    }

    fn body_line(&mut self, line: &str) {
        if line.starts_with('\\') {
            // "\ No newline at end of file"
            return;
        }
        if line.starts_with('-') {
            if let Some(budget) = self.budget.as_mut() {
                budget.old = budget.old.saturating_sub(1);
            }
            return;
        }

        let (is_added, raw) = match line.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, line.strip_prefix(' ').unwrap_or(line)),
        };
        if let Some(budget) = self.budget.as_mut() {
            budget.new = budget.new.saturating_sub(1);
            if !is_added {
                budget.old = budget.old.saturating_sub(1);
            }
        }
        self.counter += 1;

        if !self.include {
            return;
        }
        self.lines.push(DiffLine {
            file_path: self.file.clone().unwrap_or_default(),
            line_number: self.counter,
            raw_text: raw.to_string(),
            normalized_text: normalize_code(raw),
            is_added,
            is_context: !is_added,
        });
    }

    fn finish(self) -> DiffLineIndex {
        DiffLineIndex { lines: self.lines }
    }
}

/// Header lines that never carry file content.
fn is_metadata(line: &str) -> bool {
    const PREFIXES: [&str; 12] = [
        "diff ",
        "index ",
        "--- ",
        "+++ ",
        "new file mode",
        "deleted file mode",
        "old mode",
        "new mode",
        "similarity index",
        "rename from",
        "rename to",
        "Binary files",
    ];
    line == "Diff:" || PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Split the `a/path b/path` part of a `diff --git` header.
fn parse_diff_header(rest: &str) -> (String, String) {
    if let Some(b_idx) = find_second_prefix(rest) {
        let old_path = strip_diff_prefix(&rest[..b_idx]).to_string();
        let new_path = strip_diff_prefix(&rest[b_idx + 1..]).to_string();
        (old_path, new_path)
    } else {
        let mut parts = rest.splitn(2, ' ');
        let old_path = strip_diff_prefix(parts.next().unwrap_or("")).to_string();
        let new_path = strip_diff_prefix(parts.next().unwrap_or("")).to_string();
        (old_path, new_path)
    }
}

/// Strip a single-character git diff prefix (`a/`, `b/`, `c/`, `w/`, `i/`, `o/`).
fn strip_diff_prefix(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2
        && bytes[1] == b'/'
        && matches!(bytes[0], b'a' | b'b' | b'c' | b'w' | b'i' | b'o')
    {
        return &path[2..];
    }
    path
}

/// Position of the space before the second path prefix in a header.
fn find_second_prefix(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (1..bytes.len().saturating_sub(1)).find(|&i| {
        bytes[i] == b' '
            && bytes.get(i + 2) == Some(&b'/')
            && matches!(bytes.get(i + 1), Some(b'a' | b'b' | b'c' | b'w' | b'i' | b'o'))
    })
}

/// Parse `@@ -old_start,old_count +new_start,new_count @@ ...`.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let line = line.strip_prefix("@@ ")?;
    let end = line.find(" @@")?;
    let mut parts = line[..end].split(' ');
    let (old_start, old_count) = parse_range(parts.next()?.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(parts.next()?.strip_prefix('+')?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((old_start, old_count, new_start, new_count))
}

/// Parse "start,count" or "start" (count defaults to 1).
fn parse_range(s: &str) -> Option<(u32, u32)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}
