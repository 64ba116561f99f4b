//! Recovering structured JSON from noisy model output.
//!
//! Models wrap their answer in prose, markdown fences, `<think>` blocks,
//! or a `{"bugs": [...]}` envelope, and regularly leave trailing commas
//! behind. [`extract`] tries a fixed sequence of recovery strategies and
//! returns `None` when none of them produce a value of the requested
//! shape. It never retries and never fails loudly; the caller owns the
//! retry policy.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::bug::BugReport;

/// Shape of the value the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    List,
    Object,
}

impl Shape {
    fn delimiters(self) -> (char, char) {
        match self {
            Shape::List => ('[', ']'),
            Shape::Object => ('{', '}'),
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Shape::List => value.is_array(),
            Shape::Object => value.is_object(),
        }
    }
}

/// Typed result of decoding a model answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedResponse {
    /// Nothing usable was found.
    ParseFailure,
    /// A list of bug reports; elements missing required fields were dropped.
    BugReportList(Vec<BugReport>),
    /// A single JSON object.
    SingleObjectResult(Map<String, Value>),
}

impl ExtractedResponse {
    pub fn is_failure(&self) -> bool {
        matches!(self, ExtractedResponse::ParseFailure)
    }
}

/// Keys commonly used by models to wrap a list answer, tried in order
/// before falling back to the first array-valued key.
const LIST_WRAPPER_KEYS: &[&str] = &["bugs", "issues", "findings", "suggestions"];

/// Reasoning blocks some models emit before the answer.
static THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Fenced block content. The closing fence must start a line so that
/// backticks inside JSON string values do not end the block early.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\n(.*?)\n[ \t]*```").unwrap());

/// Bare fence markers, used when fences are unbalanced.
static FENCE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*").unwrap());

/// A comma directly before a closing bracket.
static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([\]}])").unwrap());

/// Recover a value of `shape` from `text`.
pub fn extract(text: &str, shape: Shape) -> Option<Value> {
    let text = THINK_RE.replace_all(text, "");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(value) = parse_bracketed(text, shape) {
        return Some(value);
    }

    if let Some(value) = unfenced(text)
        .iter()
        .find_map(|inner| parse_bracketed(inner, shape))
    {
        return Some(value);
    }

    if shape == Shape::List {
        let object = parse_bracketed(text, Shape::Object).or_else(|| {
            unfenced(text)
                .iter()
                .find_map(|inner| parse_bracketed(inner, Shape::Object))
        })?;
        return unwrap_list(object);
    }

    None
}

/// Decode a list of bug reports.
pub fn extract_bug_reports(text: &str) -> ExtractedResponse {
    match extract(text, Shape::List) {
        Some(Value::Array(items)) => ExtractedResponse::BugReportList(BugReport::from_values(items)),
        _ => ExtractedResponse::ParseFailure,
    }
}

/// Decode a single object.
pub fn extract_object(text: &str) -> ExtractedResponse {
    match extract(text, Shape::Object) {
        Some(Value::Object(map)) => ExtractedResponse::SingleObjectResult(map),
        _ => ExtractedResponse::ParseFailure,
    }
}

/// Remove markdown fences from a model answer that should be plain code.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(inner) = FENCE_RE
        .captures(trimmed)
        .and_then(|cap| cap.get(1))
        .filter(|_| trimmed.starts_with("```"))
    {
        return inner.as_str().to_string();
    }
    FENCE_MARKER_RE.replace_all(trimmed, "").trim().to_string()
}

/// Slice from the first opening to the last closing delimiter, repair,
/// and parse.
fn parse_bracketed(text: &str, shape: Shape) -> Option<Value> {
    let (open, close) = shape.delimiters();
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    let slice = &text[start..=end];
    let value = parse_repaired(slice)?;
    shape.matches(&value).then_some(value)
}

/// Candidate payloads with markdown fences removed: the content of each
/// balanced block, then the whole text with every marker stripped.
fn unfenced(text: &str) -> Vec<String> {
    let mut out: Vec<String> = FENCE_RE
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if text.contains("```") {
        out.push(FENCE_MARKER_RE.replace_all(text, "").trim().to_string());
    }
    out
}

fn parse_repaired(candidate: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }
    let repaired = TRAILING_COMMA_RE.replace_all(candidate, "$1");
    let repaired = escape_control_chars(&repaired);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("structured parse failed: {e}");
            None
        }
    }
}

/// Escape raw newlines and tabs that appear inside JSON strings. Models
/// often paste multi-line code into `suggested_fix` without escaping.
fn escape_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }
    out
}

fn unwrap_list(object: Value) -> Option<Value> {
    let Value::Object(mut map) = object else {
        return None;
    };
    for key in LIST_WRAPPER_KEYS {
        if let Some(list @ Value::Array(_)) = map.remove(*key) {
            return Some(list);
        }
    }
    map.into_iter()
        .map(|(_, value)| value)
        .find(Value::is_array)
}
