//! Plan builder: draft → collection plan.

use nippo_core::report::{CollectionPlan, Draft};

/// Derive the query strategy for a draft.
///
/// Queries are the non-blank summary values, trimmed, in their original
/// order. With no queries left the collector falls back to recent activity.
pub fn build_plan(draft: &Draft) -> CollectionPlan {
    let queries: Vec<String> = draft
        .values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect();

    CollectionPlan {
        date: draft.date.clone(),
        repos: draft.repos.clone().unwrap_or_default(),
        use_recent_activity: queries.is_empty(),
        queries,
    }
}
