//! Tool-output normalizer.
//!
//! Turns whatever the collector agent produced (buffered tool-invocation
//! records plus its final output) into [`CollectedData`]. Signals derived
//! from tool results always win; the model's own text is parsed only when no
//! tool result produced a GitHub item.

pub mod github;
pub mod rules;
pub mod text;

use nippo_core::generation::GenerationOutput;
use nippo_core::report::{CollectedData, GithubItem, Signal};
use nippo_tools::filter::strip_namespace;
use serde_json::Value;
use tracing::debug;

/// Fields of a structured output that may carry the model's text.
const TEXT_FIELDS: &[&str] = &["text", "content", "output", "message", "result", "data"];

/// The text of a generation output, or `""` when none can be found.
pub fn coerce_text(output: &GenerationOutput) -> String {
    match output {
        GenerationOutput::Text(text) => text.clone(),
        GenerationOutput::Structured(Value::String(text)) => text.clone(),
        GenerationOutput::Structured(value) => TEXT_FIELDS
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(String::from)
            .unwrap_or_default(),
    }
}

/// GitHub items derivable from tool-invocation records, in record order.
pub fn items_from_tool_results<'a>(
    records: impl IntoIterator<Item = &'a Value>,
    namespace: &str,
) -> Vec<GithubItem> {
    let mut items = Vec::new();

    for record in records {
        let Some(payload) = rules::unwrap_payload(record) else {
            continue;
        };
        let Some(name) = payload.tool_name.as_deref() else {
            continue;
        };
        let Some(kind) = github::record_kind(strip_namespace(name, namespace)) else {
            debug!(tool = name, "No mapping for tool result");
            continue;
        };

        let records = rules::extract_items(&payload.data);
        let before = items.len();
        items.extend(records.iter().filter_map(|r| kind.map(r)));
        debug!(
            tool = name,
            records = records.len(),
            mapped = items.len() - before,
            "Mapped tool result"
        );
    }

    items
}

/// Build collected data from a collection run.
///
/// `records` is the round buffer; any `toolResults` carried by `output` are
/// considered after it.
pub fn normalize(records: &[Value], output: Option<&GenerationOutput>, namespace: &str) -> CollectedData {
    let trailing = output.map(GenerationOutput::tool_results).unwrap_or_default();
    let github = items_from_tool_results(records.iter().chain(trailing.iter()), namespace);

    if !github.is_empty() {
        return github.into_iter().map(Signal::Github).collect();
    }

    match output {
        Some(output) => text::parse_text(&coerce_text(output)),
        None => CollectedData::empty(),
    }
}
