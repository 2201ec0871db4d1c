//! Summarizer: dedupe, truncate and cap collected signals.
//!
//! The result satisfies every [`CollectedData`] invariant, and running it
//! twice changes nothing.

use nippo_config::LimitsConfig;
use nippo_core::report::{CollectedData, GithubItem, GithubItemType};
use std::collections::{HashMap, HashSet};

pub const MAX_TITLE_CHARS: usize = 160;
pub const MAX_URL_CHARS: usize = 200;
/// Cap for `repo`, `author` and `date`.
pub const MAX_FIELD_CHARS: usize = 200;
pub const MAX_CALENDAR_CHARS: usize = 200;

const ELLIPSIS: &str = "...";

/// Count caps applied by [`summarize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLimits {
    pub max_github_items: usize,
    pub max_github_items_per_type: usize,
    pub max_calendar_items: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for SummaryLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_github_items: config.max_github_items,
            max_github_items_per_type: config.max_github_items_per_type,
            max_calendar_items: config.max_calendar_items,
        }
    }
}

/// Trim `value` and cut it to `max` characters, ending in `...` when cut.
/// Blank input yields `None`.
pub fn truncate(value: &str, max: usize) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= max {
        return Some(trimmed.to_string());
    }
    let kept: String = trimmed.chars().take(max.saturating_sub(ELLIPSIS.len())).collect();
    Some(kept + ELLIPSIS)
}

fn dedupe_key(item: &GithubItem) -> String {
    if !item.url.is_empty() {
        return format!("url:{}", item.url);
    }
    format!(
        "{}:{}:{}",
        item.kind.as_str(),
        item.repo.as_deref().unwrap_or(""),
        item.title
    )
}

fn normalize_item(item: &GithubItem) -> Option<GithubItem> {
    Some(GithubItem {
        kind: item.kind,
        title: truncate(&item.title, MAX_TITLE_CHARS)?,
        url: truncate(&item.url, MAX_URL_CHARS)?,
        repo: item.repo.as_deref().and_then(|v| truncate(v, MAX_FIELD_CHARS)),
        author: item.author.as_deref().and_then(|v| truncate(v, MAX_FIELD_CHARS)),
        date: item.date.as_deref().and_then(|v| truncate(v, MAX_FIELD_CHARS)),
    })
}

fn summarize_github(items: &[GithubItem], limits: &SummaryLimits) -> Vec<GithubItem> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut per_type: HashMap<GithubItemType, usize> = HashMap::new();

    for item in items {
        if out.len() >= limits.max_github_items {
            break;
        }
        if per_type.get(&item.kind).copied().unwrap_or(0) >= limits.max_github_items_per_type {
            continue;
        }
        let Some(item) = normalize_item(item) else {
            continue;
        };
        if !seen.insert(dedupe_key(&item)) {
            continue;
        }
        *per_type.entry(item.kind).or_default() += 1;
        out.push(item);
    }

    out
}

fn summarize_calendar(texts: &[String], limits: &SummaryLimits) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen = HashSet::new();

    for text in texts {
        if out.len() >= limits.max_calendar_items {
            break;
        }
        let Some(text) = truncate(text, MAX_CALENDAR_CHARS) else {
            continue;
        };
        if seen.insert(text.clone()) {
            out.push(text);
        }
    }

    out
}

/// Bound and deduplicate collected signals.
pub fn summarize(collected: &CollectedData, limits: &SummaryLimits) -> CollectedData {
    CollectedData {
        github: summarize_github(&collected.github, limits),
        calendar: summarize_calendar(&collected.calendar, limits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr(title: &str, url: &str) -> GithubItem {
        GithubItem::new(GithubItemType::Pr, title, url)
    }

    fn commit(n: usize) -> GithubItem {
        GithubItem::new(GithubItemType::Commit, format!("Commit {n}"), format!("https://x/c/{n}"))
    }

    #[test]
    fn truncate_marks_cut_values() {
        assert_eq!(truncate("  short  ", 10).as_deref(), Some("short"));
        assert_eq!(truncate("abcdefghijk", 10).as_deref(), Some("abcdefg..."));
        assert_eq!(truncate("abcdefghij", 10).as_deref(), Some("abcdefghij"));
        assert_eq!(truncate("   ", 10), None);
    }

    #[test]
    fn truncate_counts_characters() {
        let text = "日報".repeat(100);
        let cut = truncate(&text, MAX_TITLE_CHARS).unwrap();
        assert_eq!(cut.chars().count(), MAX_TITLE_CHARS);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn long_fields_are_capped() {
        let item = GithubItem {
            repo: Some("r".repeat(500)),
            ..pr(&"t".repeat(500), &format!("https://x/{}", "u".repeat(500)))
        };
        let out = summarize(&CollectedData { github: vec![item], calendar: vec![] }, &SummaryLimits::default());
        let item = &out.github[0];
        assert_eq!(item.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(item.url.chars().count(), MAX_URL_CHARS);
        assert_eq!(item.repo.as_ref().map(|r| r.chars().count()), Some(MAX_FIELD_CHARS));
    }

    #[test]
    fn blank_title_or_url_is_dropped_and_blank_optionals_cleared() {
        let items = vec![
            pr("  ", "https://x/p/1"),
            pr("t", " "),
            GithubItem {
                author: Some("  ".into()),
                ..pr("kept", "https://x/p/3")
            },
        ];
        let out = summarize(&CollectedData { github: items, calendar: vec![] }, &SummaryLimits::default());
        assert_eq!(out.github.len(), 1);
        assert_eq!(out.github[0].author, None);
    }

    #[test]
    fn duplicates_by_url_are_removed() {
        let items = vec![pr("A", "https://x/p/1"), pr("B", "https://x/p/1 "), pr("C", "https://x/p/2")];
        let out = summarize(&CollectedData { github: items, calendar: vec![] }, &SummaryLimits::default());
        let titles: Vec<&str> = out.github.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[test]
    fn per_type_and_total_caps() {
        let limits = SummaryLimits {
            max_github_items: 5,
            max_github_items_per_type: 3,
            max_calendar_items: 2,
        };
        let mut items: Vec<GithubItem> = (0..10).map(commit).collect();
        items.push(pr("P1", "https://x/p/1"));
        items.push(pr("P2", "https://x/p/2"));
        items.push(pr("P3", "https://x/p/3"));

        let out = summarize(&CollectedData { github: items, calendar: vec![] }, &limits);
        let commits = out.github.iter().filter(|i| i.kind == GithubItemType::Commit).count();
        assert_eq!(commits, 3);
        assert_eq!(out.github.len(), 5);
        assert_eq!(out.github[3].title, "P1");
    }

    #[test]
    fn calendar_is_trimmed_deduped_and_capped() {
        let limits = SummaryLimits {
            max_calendar_items: 2,
            ..SummaryLimits::default()
        };
        let calendar = vec![" Standup ".into(), "".into(), "Standup".into(), "Review".into(), "Retro".into()];
        let out = summarize(&CollectedData { github: vec![], calendar }, &limits);
        assert_eq!(out.calendar, vec!["Standup", "Review"]);
    }

    #[test]
    fn summarize_is_idempotent() {
        let long = "x".repeat(300);
        let mut items: Vec<GithubItem> = (0..30).map(commit).collect();
        items.push(pr(&long, &format!("https://x/{long}")));
        items.push(pr(&long, &format!("https://x/{long}-other")));
        items.push(GithubItem::new(GithubItemType::Discussion, " spaced ", " https://x/d/1 "));
        let calendar = vec![long.clone(), format!("{long}!"), " a ".into(), "a".into()];

        let once = summarize(&CollectedData { github: items, calendar }, &SummaryLimits::default());
        let twice = summarize(&once, &SummaryLimits::default());
        assert_eq!(once, twice);
        // The two long URLs collapse to the same truncated key.
        assert_eq!(once.github.iter().filter(|i| i.kind == GithubItemType::Pr).count(), 1);
        assert_eq!(once.calendar.len(), 2);
    }
}
