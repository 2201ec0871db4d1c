//! Report domain types.
//!
//! A request arrives as a [`ReportRequest`], is split into a [`Draft`] (the
//! user's outline) and a template, and flows through the pipeline:
//! Draft → [`CollectionPlan`] → [`CollectedData`] → rendered text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An external signal source the user enabled for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKey {
    Github,
    GoogleCalendar,
}

impl ToolKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKey::Github => "github",
            ToolKey::GoogleCalendar => "google_calendar",
        }
    }
}

impl std::fmt::Display for ToolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(ToolKey::Github),
            "google_calendar" | "calendar" => Ok(ToolKey::GoogleCalendar),
            other => Err(format!("unknown tool '{other}' (expected github or google_calendar)")),
        }
    }
}

/// The user-supplied report skeleton. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub date: String,
    pub tools: BTreeSet<ToolKey>,
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repos: Option<Vec<String>>,
}

impl Draft {
    pub fn uses(&self, tool: ToolKey) -> bool {
        self.tools.contains(&tool)
    }
}

/// The query strategy derived from a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPlan {
    pub date: String,
    pub repos: Vec<String>,
    pub queries: Vec<String>,
    pub use_recent_activity: bool,
}

/// Kind of a GitHub signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GithubItemType {
    Pr,
    Commit,
    Discussion,
}

impl GithubItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GithubItemType::Pr => "pr",
            GithubItemType::Commit => "commit",
            GithubItemType::Discussion => "discussion",
        }
    }
}

/// One pull request, commit or discussion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubItem {
    #[serde(rename = "type")]
    pub kind: GithubItemType,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl GithubItem {
    pub fn new(kind: GithubItemType, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            url: url.into(),
            repo: None,
            author: None,
            date: None,
        }
    }
}

/// A single external-activity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Github(GithubItem),
    Calendar(String),
}

/// Everything collected for one report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedData {
    #[serde(default)]
    pub github: Vec<GithubItem>,
    #[serde(default)]
    pub calendar: Vec<String>,
}

impl CollectedData {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, signal: Signal) {
        match signal {
            Signal::Github(item) => self.github.push(item),
            Signal::Calendar(text) => self.calendar.push(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.github.is_empty() && self.calendar.is_empty()
    }
}

impl FromIterator<Signal> for CollectedData {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        let mut collected = Self::empty();
        for signal in iter {
            collected.push(signal);
        }
        collected
    }
}

/// A report-generation request as received from a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub date: String,
    pub template: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repos: Option<Vec<String>>,
    #[serde(default)]
    pub tools: BTreeSet<ToolKey>,
    pub model: String,
}

impl ReportRequest {
    /// The draft part of the request.
    pub fn draft(&self) -> Draft {
        Draft {
            date: self.date.clone(),
            tools: self.tools.clone(),
            values: self.values.clone(),
            repos: self.repos.clone(),
        }
    }
}

/// Response metadata echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub model: String,
    pub tools: BTreeSet<ToolKey>,
}

/// The transport-facing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub output: String,
    pub meta: ReportMeta,
}
