//! Ordered extractor rules for weakly-typed tool payloads.
//!
//! Each rule is a total function from a JSON value to an optional match.
//! Rules are tried in table order and the first match wins; supporting a new
//! payload shape means appending a row.

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// How deep envelope-decoding rules may recurse into re-encoded payloads.
const MAX_DECODE_DEPTH: usize = 2;

/// Where the underlying item list of a tool payload may live.
#[derive(Debug, Clone, Copy)]
pub enum ItemListRule {
    /// The payload is itself the list.
    Root,
    /// An array found at a field path.
    Field(&'static [&'static str]),
    /// A JSON document encoded as a string.
    JsonString,
    /// An MCP `tools/call` result: `{"content": [{"type": "text", "text": ...}]}`.
    McpContent,
}

/// Priority order for item-list extraction.
pub const ITEM_LIST_RULES: &[ItemListRule] = &[
    ItemListRule::Root,
    ItemListRule::Field(&["items"]),
    ItemListRule::Field(&["data"]),
    ItemListRule::Field(&["results"]),
    ItemListRule::Field(&["result"]),
    ItemListRule::Field(&["pull_requests"]),
    ItemListRule::Field(&["issues"]),
    ItemListRule::Field(&["commits"]),
    ItemListRule::Field(&["repositories"]),
    ItemListRule::Field(&["data", "items"]),
    ItemListRule::Field(&["data", "results"]),
    ItemListRule::Field(&["data", "result"]),
    ItemListRule::Field(&["data", "pull_requests"]),
    ItemListRule::Field(&["data", "issues"]),
    ItemListRule::Field(&["data", "commits"]),
    ItemListRule::Field(&["data", "repositories"]),
    ItemListRule::Field(&["result", "items"]),
    ItemListRule::Field(&["result", "results"]),
    ItemListRule::Field(&["result", "result"]),
    ItemListRule::Field(&["result", "pull_requests"]),
    ItemListRule::Field(&["result", "issues"]),
    ItemListRule::Field(&["result", "commits"]),
    ItemListRule::Field(&["result", "repositories"]),
    ItemListRule::JsonString,
    ItemListRule::McpContent,
];

impl ItemListRule {
    fn label(&self) -> String {
        match self {
            ItemListRule::Root => "root".into(),
            ItemListRule::Field(path) => path.join("."),
            ItemListRule::JsonString => "json-string".into(),
            ItemListRule::McpContent => "mcp-content".into(),
        }
    }

    fn apply(&self, value: &Value, depth: usize) -> Option<Vec<Value>> {
        match self {
            ItemListRule::Root => value.as_array().map(|items| objects_only(items)),
            ItemListRule::Field(path) => get_path(value, path)
                .and_then(Value::as_array)
                .map(|items| objects_only(items)),
            ItemListRule::JsonString => {
                if depth >= MAX_DECODE_DEPTH {
                    return None;
                }
                let decoded: Value = serde_json::from_str(value.as_str()?.trim()).ok()?;
                find_items(&decoded, depth + 1)
            }
            ItemListRule::McpContent => {
                if depth >= MAX_DECODE_DEPTH {
                    return None;
                }
                let text = value
                    .get("content")?
                    .as_array()?
                    .iter()
                    .find_map(|part| part.get("text").and_then(Value::as_str))?;
                let decoded: Value = serde_json::from_str(text.trim()).ok()?;
                find_items(&decoded, depth + 1)
            }
        }
    }
}

fn objects_only(items: &[Value]) -> Vec<Value> {
    items.iter().filter(|item| item.is_object()).cloned().collect()
}

fn find_items(value: &Value, depth: usize) -> Option<Vec<Value>> {
    ITEM_LIST_RULES.iter().find_map(|rule| {
        let items = rule.apply(value, depth)?;
        debug!(rule = %rule.label(), depth, count = items.len(), "Selected item list");
        Some(items)
    })
}

/// Locate the list of records inside an arbitrary tool payload.
///
/// Non-object entries of the selected list are discarded. A payload with no
/// recognisable list yields an empty vector.
pub fn extract_items(payload: &Value) -> Vec<Value> {
    match find_items(payload, 0) {
        Some(items) => items,
        None => {
            let keys: Vec<&str> = payload
                .as_object()
                .map(|m| m.keys().map(String::as_str).collect())
                .unwrap_or_default();
            warn!(top_level_keys = ?keys, "No item list found in tool payload");
            Vec::new()
        }
    }
}

/// Follow `path` through nested objects.
pub fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// First candidate path resolving to a string.
pub fn first_string(value: &Value, candidates: &[&[&str]]) -> Option<String> {
    candidates
        .iter()
        .find_map(|path| get_path(value, path).and_then(Value::as_str))
        .map(String::from)
}

/// Loose truthiness: empty strings, zero, `false` and `null` are false.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// A tool-invocation record reduced to the fields the normalizer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPayload {
    pub tool_name: Option<String>,
    pub data: Value,
}

const TOOL_NAME_FIELDS: &[&str] = &["toolName", "tool_name"];
const DATA_FIELDS: &[&str] = &["result", "output", "data"];

/// Unwrap one buffered record.
///
/// A record may nest its fields under `payload`. The data is the first
/// non-null of `result`, `output`, `data`, falling back to the record
/// itself. Non-object records are ignored.
pub fn unwrap_payload(record: &Value) -> Option<ToolPayload> {
    let record: &Map<String, Value> = record.as_object()?;
    let fields = match record.get("payload") {
        Some(Value::Object(inner)) => inner,
        _ => record,
    };

    let tool_name = TOOL_NAME_FIELDS
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
        .map(String::from);

    let data = DATA_FIELDS
        .iter()
        .find_map(|key| fields.get(*key).filter(|v| !v.is_null()))
        .cloned()
        .unwrap_or_else(|| Value::Object(fields.clone()));

    Some(ToolPayload { tool_name, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_array_drops_non_objects() {
        let items = extract_items(&json!([{"a": 1}, "x", 3, null, {"b": 2}]));
        assert_eq!(items, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn top_level_candidates_follow_priority() {
        let payload = json!({"results": [{"n": "results"}], "items": [{"n": "items"}]});
        assert_eq!(extract_items(&payload)[0]["n"], "items");
    }

    #[test]
    fn non_array_candidate_is_skipped() {
        let payload = json!({"items": "nope", "data": {"commits": [{"sha": "1"}]}});
        let items = extract_items(&payload);
        assert_eq!(items, vec![json!({"sha": "1"})]);
    }

    #[test]
    fn nested_result_candidates() {
        let payload = json!({"result": {"total_count": 1, "items": [{"title": "t"}]}});
        assert_eq!(extract_items(&payload)[0]["title"], "t");
    }

    #[test]
    fn domain_plural_field() {
        let payload = json!({"pull_requests": [{"title": "p"}]});
        assert_eq!(extract_items(&payload).len(), 1);
    }

    #[test]
    fn json_string_is_decoded() {
        let payload = Value::String(r#"{"items":[{"title":"t"}]}"#.into());
        assert_eq!(extract_items(&payload).len(), 1);
    }

    #[test]
    fn mcp_envelope_is_decoded() {
        let payload = json!({
            "content": [{"type": "text", "text": "[{\"sha\":\"abc\"},{\"sha\":\"def\"}]"}],
            "isError": false
        });
        assert_eq!(extract_items(&payload).len(), 2);
    }

    #[test]
    fn decoding_depth_is_bounded() {
        let inner = serde_json::to_string(&json!([{"x": 1}])).unwrap();
        let twice = serde_json::to_string(&Value::String(inner.clone())).unwrap();
        let thrice = Value::String(serde_json::to_string(&Value::String(twice)).unwrap());
        assert!(extract_items(&thrice).is_empty());
        assert_eq!(extract_items(&Value::String(inner)).len(), 1);
    }

    #[test]
    fn unrecognised_payloads_yield_nothing() {
        assert!(extract_items(&json!({"total_count": 0})).is_empty());
        assert!(extract_items(&json!("plain words")).is_empty());
        assert!(extract_items(&json!(42)).is_empty());
    }

    #[test]
    fn first_string_respects_candidate_order() {
        let item = json!({"url": "api", "html_url": "web", "repository": {"full_name": 7}, "repository_url": "r"});
        assert_eq!(first_string(&item, &[&["html_url"], &["url"]]).as_deref(), Some("web"));
        assert_eq!(
            first_string(&item, &[&["repository", "full_name"], &["repository_url"]]).as_deref(),
            Some("r")
        );
        assert!(first_string(&item, &[&["missing"]]).is_none());
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(Some(&json!("https://x"))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&Value::Null)));
        assert!(!is_truthy(None));
        assert!(is_truthy(Some(&json!({}))));
    }

    #[test]
    fn payload_wrapper_is_unwrapped() {
        let record = json!({"type": "tool-result", "payload": {"toolName": "github_list_commits", "result": [1]}});
        let payload = unwrap_payload(&record).unwrap();
        assert_eq!(payload.tool_name.as_deref(), Some("github_list_commits"));
        assert_eq!(payload.data, json!([1]));
    }

    #[test]
    fn data_falls_back_through_fields_then_record() {
        let record = json!({"tool_name": "t", "result": null, "output": {"items": []}});
        assert_eq!(unwrap_payload(&record).unwrap().data, json!({"items": []}));

        let bare = json!({"toolName": "t", "items": [{"a": 1}]});
        assert_eq!(unwrap_payload(&bare).unwrap().data, bare);

        assert!(unwrap_payload(&json!("text")).is_none());
    }
}
