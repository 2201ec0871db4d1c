//! Parse ladder for raw model text.
//!
//! Used only when no tool result produced a GitHub item. Tries, in order: the
//! whole text, the first fenced code block, and the span from the first `{`
//! to the last `}`. The first attempt that parses to a JSON object wins.

use nippo_core::report::{CollectedData, GithubItem, Signal};
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

fn fence_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)```(?:json)?\r?\n([\s\S]*?)\r?\n```").ok())
        .as_ref()
}

/// Contents of the first fenced code block, trimmed.
pub fn fenced_block(text: &str) -> Option<&str> {
    fence_regex()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// The span from the first `{` through the last `}`.
pub fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn whole(text: &str) -> Option<&str> {
    Some(text)
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Run the ladder and return the first object-shaped parse.
pub fn parse_record(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let steps: [(&str, fn(&str) -> Option<&str>); 3] = [
        ("whole", whole),
        ("fenced", fenced_block),
        ("braces", brace_span),
    ];

    steps.iter().find_map(|(step, extract)| {
        let record = parse_object(extract(trimmed)?)?;
        debug!(step, "Parsed model output");
        Some(record)
    })
}

/// Read `github` and `calendar` out of a parsed record.
///
/// Non-array fields count as empty. GitHub entries that do not deserialize
/// into an item are skipped; calendar entries must be strings.
pub fn collected_from_record(record: &Map<String, Value>) -> CollectedData {
    let entries = |key: &str| record.get(key).and_then(Value::as_array).into_iter().flatten();

    let github = entries("github")
        .filter_map(|entry| serde_json::from_value::<GithubItem>(entry.clone()).ok())
        .map(Signal::Github);
    let calendar = entries("calendar")
        .filter_map(Value::as_str)
        .map(|text| Signal::Calendar(text.to_string()));

    github.chain(calendar).collect()
}

/// Parse model text into collected data; empty when every step fails.
pub fn parse_text(text: &str) -> CollectedData {
    parse_record(text)
        .map(|record| collected_from_record(&record))
        .unwrap_or_default()
}
