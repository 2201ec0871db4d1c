//! Per-tool mapping from raw GitHub records to [`GithubItem`]s.

use super::rules::{first_string, get_path, is_truthy};
use nippo_core::report::{GithubItem, GithubItemType};
use serde_json::Value;

/// How the records returned by one tool are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Every record is a pull request.
    PullRequest,
    /// Issues; a record linking a pull request is a PR, otherwise a discussion.
    Issue,
    /// Commit listing.
    Commit,
}

/// Tool name (without namespace) to record kind.
pub const TOOL_MAPPINGS: &[(&str, RecordKind)] = &[
    ("search_pull_requests", RecordKind::PullRequest),
    ("list_pull_requests", RecordKind::PullRequest),
    ("search_issues", RecordKind::Issue),
    ("list_issues", RecordKind::Issue),
    ("list_commits", RecordKind::Commit),
];

/// Look up the mapping for a bare tool name.
pub fn record_kind(bare_name: &str) -> Option<RecordKind> {
    TOOL_MAPPINGS
        .iter()
        .find(|(name, _)| *name == bare_name)
        .map(|(_, kind)| *kind)
}

const TITLE: &[&[&str]] = &[&["title"]];
const URL: &[&[&str]] = &[&["html_url"], &["url"]];
const REPO: &[&[&str]] = &[&["repository", "full_name"], &["repository_url"]];
const AUTHOR: &[&[&str]] = &[&["user", "login"]];
const DATE: &[&[&str]] = &[&["created_at"]];

const COMMIT_TITLE: &[&[&str]] = &[&["commit", "message"], &["message"]];
const COMMIT_AUTHOR: &[&[&str]] = &[&["author", "login"], &["committer", "login"]];
const COMMIT_DATE: &[&[&str]] = &[&["commit", "author", "date"], &["commit", "committer", "date"]];

impl RecordKind {
    /// Map one record. `None` when title or url cannot be resolved.
    pub fn map(&self, record: &Value) -> Option<GithubItem> {
        match self {
            RecordKind::PullRequest => issue_like(record, GithubItemType::Pr),
            RecordKind::Issue => {
                let kind = if is_truthy(get_path(record, &["pull_request", "url"])) {
                    GithubItemType::Pr
                } else {
                    GithubItemType::Discussion
                };
                issue_like(record, kind)
            }
            RecordKind::Commit => commit(record),
        }
    }
}

fn issue_like(record: &Value, kind: GithubItemType) -> Option<GithubItem> {
    build(
        kind,
        first_string(record, TITLE),
        first_string(record, URL),
        first_string(record, REPO),
        first_string(record, AUTHOR),
        first_string(record, DATE),
    )
}

fn commit(record: &Value) -> Option<GithubItem> {
    build(
        GithubItemType::Commit,
        first_string(record, COMMIT_TITLE),
        first_string(record, URL),
        first_string(record, REPO),
        first_string(record, COMMIT_AUTHOR),
        first_string(record, COMMIT_DATE),
    )
}

fn build(
    kind: GithubItemType,
    title: Option<String>,
    url: Option<String>,
    repo: Option<String>,
    author: Option<String>,
    date: Option<String>,
) -> Option<GithubItem> {
    let title = title.filter(|t| !t.is_empty())?;
    let url = url.filter(|u| !u.is_empty())?;
    Some(GithubItem {
        kind,
        title,
        url,
        repo,
        author,
        date,
    })
}
