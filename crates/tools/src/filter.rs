//! Read-only tool filtering.
//!
//! Only tools that look like reads (`get_`, `list_`, `search_`) are handed
//! to the collector. Anything that looks like a write is refused even when it
//! also matches a read prefix; deny wins.

use nippo_core::tool::Tool;
use std::collections::BTreeMap;
use std::sync::Arc;

const ALLOW_PREFIXES: &[&str] = &["get_", "list_", "search_"];

const DENY_PREFIXES: &[&str] = &[
    "add_", "assign_", "create_", "delete_", "enable_", "disable_", "fork_", "merge_", "remove_",
    "set_", "update_",
];

/// Strip a `<namespace>_` prefix, if present.
pub fn strip_namespace<'a>(name: &'a str, namespace: &str) -> &'a str {
    name.strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(name)
}

/// Whether a tool name is an allowed read-only operation.
///
/// Accepts both the bare remote name and the namespaced form.
pub fn is_read_only(name: &str, namespace: &str) -> bool {
    let bare = strip_namespace(name, namespace);
    if DENY_PREFIXES.iter().any(|p| bare.starts_with(p)) {
        return false;
    }
    ALLOW_PREFIXES.iter().any(|p| bare.starts_with(p))
}

/// Keep only the read-only tools of a listing.
pub fn read_only_tools(
    tools: BTreeMap<String, Arc<dyn Tool>>,
    namespace: &str,
) -> BTreeMap<String, Arc<dyn Tool>> {
    tools
        .into_iter()
        .filter(|(name, _)| is_read_only(name, namespace))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nippo_core::error::ToolError;
    use nippo_core::tool::ToolResult;

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            ""
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::Unavailable(self.0.into()))
        }
    }

    #[test]
    fn read_prefixes_are_allowed() {
        assert!(is_read_only("github_search_pull_requests", "github"));
        assert!(is_read_only("github_list_commits", "github"));
        assert!(is_read_only("get_me", "github"));
    }

    #[test]
    fn write_prefixes_are_denied() {
        for name in [
            "github_create_issue",
            "github_merge_pull_request",
            "github_update_pull_request_branch",
            "delete_file",
            "fork_repository",
        ] {
            assert!(!is_read_only(name, "github"), "{name} should be denied");
        }
    }

    #[test]
    fn unknown_prefixes_are_not_allowed() {
        assert!(!is_read_only("github_push_files", "github"));
        assert!(!is_read_only("github_run_workflow", "github"));
    }

    #[test]
    fn namespace_is_stripped_before_matching() {
        assert!(!is_read_only("list_create_thing", "list"));
        assert!(is_read_only("search_search_code", "search"));
    }

    #[test]
    fn strip_namespace_only_strips_whole_prefix() {
        assert_eq!(strip_namespace("github_list_commits", "github"), "list_commits");
        assert_eq!(strip_namespace("githubby_list", "github"), "githubby_list");
        assert_eq!(strip_namespace("search_issues", "github"), "search_issues");
    }

    #[test]
    fn filters_a_listing() {
        let listing: BTreeMap<String, Arc<dyn Tool>> = [
            "github_search_issues",
            "github_create_issue",
            "github_list_commits",
            "github_push_files",
        ]
        .into_iter()
        .map(|n| (n.to_string(), Arc::new(NamedTool(n)) as Arc<dyn Tool>))
        .collect();

        let kept: Vec<String> = read_only_tools(listing, "github").into_keys().collect();
        assert_eq!(kept, vec!["github_list_commits", "github_search_issues"]);
    }
}
