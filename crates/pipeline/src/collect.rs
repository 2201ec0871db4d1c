//! Collector: gather GitHub signals through a bounded tool-calling run.
//!
//! Collection never fails. A missing credential or an unselected GitHub
//! source short-circuits to empty data without touching the network; tool
//! listing failures degrade to no tools; generation failures are retried once
//! with relaxed tool forcing and then degrade to whatever the round buffer
//! captured.

use crate::normalize::normalize;
use nippo_agent::AgentRegistry;
use nippo_config::CollectorConfig;
use nippo_core::generation::{GenerateOptions, GenerationOutput, ToolChoice, ToolResultBuffer};
use nippo_core::report::{CollectedData, CollectionPlan, Draft, ToolKey};
use nippo_core::tool::{ToolRegistry, ToolSource};
use nippo_tools::filter::read_only_tools;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// System prompt of the collector agent.
pub const COLLECTOR_INSTRUCTIONS: &str = "You collect signals for a daily report.
Use tools if needed to fetch GitHub data.
Only return JSON. Do not include Markdown fences.
Return an object with keys: github (array), calendar (array).
github items must include: type (pr|commit|discussion), title, url.
Optional fields: repo, author, date.
If nothing found, return empty arrays.";

/// Tool-forcing mode per generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    modes: Vec<ToolChoice>,
}

impl RetryPolicy {
    /// Force a tool call first when tools exist, then retry once in auto
    /// mode. Without tools there is a single auto attempt.
    pub fn for_tools(has_tools: bool) -> Self {
        let modes = if has_tools {
            vec![ToolChoice::Required, ToolChoice::Auto]
        } else {
            vec![ToolChoice::Auto]
        };
        Self { modes }
    }

    /// `(attempt index, mode)` pairs in order.
    pub fn attempts(&self) -> impl Iterator<Item = (usize, ToolChoice)> + '_ {
        self.modes.iter().copied().enumerate()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

/// Build the collector prompt for a plan and the names of the usable tools.
pub fn build_prompt(plan: &CollectionPlan, tool_names: &[&str]) -> String {
    let has_repos = !plan.repos.is_empty();
    let has_tools = !tool_names.is_empty();
    let queries = serde_json::to_string_pretty(&plan.queries).unwrap_or_else(|_| "[]".into());

    let lines = [
        "Collect GitHub signals for the daily report.".to_string(),
        format!("Target date: {}", plan.date),
        if has_repos {
            format!("Target repos (only these): {}", plan.repos.join(", "))
        } else {
            "Target repos: all accessible repos".to_string()
        },
        "Work summary items:".to_string(),
        queries,
        String::new(),
        if has_repos {
            "Restrict all searches to the target repos.".to_string()
        } else {
            "First list accessible repositories, then search within those repositories.".to_string()
        },
        if has_tools {
            format!("Available tools: {}", tool_names.join(","))
        } else {
            "No tools available.".to_string()
        },
        "If GitHub tools are available, search PRs, commits, and discussions related to the summary items."
            .to_string(),
        if plan.use_recent_activity {
            "Work summary items is empty, so use recent activity for the target date instead (recent PRs, commits, and discussions).".to_string()
        } else {
            "Work summary items is not empty, use them as search queries.".to_string()
        },
        if plan.use_recent_activity && has_tools {
            "You MUST call at least one GitHub tool to retrieve recent activity.".to_string()
        } else {
            "If tools are available, call them to gather matching PRs, commits, and discussions.".to_string()
        },
        "Keep tool usage efficient. Do not repeat the same query unless previous results are empty.".to_string(),
        "Limit gathered GitHub items to the most relevant and recent ones.".to_string(),
        "Use ONLY the listed tools (exact names). Do not invent tool names.".to_string(),
        "Prefer using GitHub tools when available; do not ask questions.".to_string(),
        "Return JSON only with keys: github (array), calendar (array).".to_string(),
        "Calendar can be empty for now.".to_string(),
    ];

    lines.join("\n")
}

/// Gathers external signals for a report.
pub struct Collector {
    tools: Arc<dyn ToolSource>,
    agents: AgentRegistry,
    credential_present: bool,
    namespace: String,
    max_steps: u32,
    tool_call_concurrency: usize,
}

impl Collector {
    pub fn new(tools: Arc<dyn ToolSource>, agents: AgentRegistry, credential_present: bool) -> Self {
        let defaults = CollectorConfig::default();
        Self {
            tools,
            agents,
            credential_present,
            namespace: "github".into(),
            max_steps: defaults.max_steps,
            tool_call_concurrency: defaults.tool_call_concurrency,
        }
    }

    /// Namespace prefix of the remote tool names.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Step and concurrency bounds for the generation call.
    pub fn with_limits(mut self, config: &CollectorConfig) -> Self {
        self.max_steps = config.max_steps;
        self.tool_call_concurrency = config.tool_call_concurrency;
        self
    }

    /// Collect signals for `draft` following `plan`, using `model`.
    pub async fn collect(&self, draft: &Draft, plan: &CollectionPlan, model: &str) -> CollectedData {
        if !self.credential_present {
            debug!("No model credential; skipping collection");
            return CollectedData::empty();
        }
        if !draft.uses(ToolKey::Github) {
            debug!("GitHub source not selected; skipping collection");
            return CollectedData::empty();
        }

        let available = read_only_tools(self.tools.list_tools().await, &self.namespace);
        let registry: ToolRegistry = available.into_values().collect();
        let tool_names: Vec<String> = registry.names().into_iter().map(String::from).collect();
        info!(tool_count = tool_names.len(), tools = ?tool_names, "Collector tools available");

        let name_refs: Vec<&str> = tool_names.iter().map(String::as_str).collect();
        let prompt = build_prompt(plan, &name_refs);
        let policy = RetryPolicy::for_tools(!registry.is_empty());

        let agent = match self.agents.get_or_build(model, registry) {
            Ok(agent) => agent,
            Err(e) => {
                warn!(model, error = %e, "Collector agent unavailable");
                return CollectedData::empty();
            }
        };

        let mut buffer = ToolResultBuffer::new();
        let mut output: Option<GenerationOutput> = None;

        for (attempt, tool_choice) in policy.attempts() {
            let options = GenerateOptions {
                max_steps: self.max_steps,
                tool_call_concurrency: self.tool_call_concurrency,
                tool_choice,
            };
            match agent.generate(&prompt, &options, &mut buffer).await {
                Ok(out) => {
                    output = Some(out);
                    break;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        tool_choice = %tool_choice,
                        buffered = buffer.len(),
                        error = %e,
                        "Collector generation failed"
                    );
                    if attempt + 1 < policy.len() {
                        info!("Retrying collection with relaxed tool choice");
                    }
                }
            }
        }

        let collected = normalize(buffer.as_slice(), output.as_ref(), &self.namespace);
        info!(
            tool_results = buffer.len(),
            github = collected.github.len(),
            calendar = collected.calendar.len(),
            "Collection finished"
        );
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nippo_core::error::{ProviderError, ToolError};
    use nippo_core::generation::Generator;
    use nippo_core::report::GithubItemType;
    use nippo_core::tool::{Tool, ToolResult};
    use serde_json::{Value, json};
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            ""
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _arguments: Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::Unavailable(self.0.into()))
        }
    }

    struct StaticSource {
        names: Vec<&'static str>,
        listed: AtomicUsize,
    }

    impl StaticSource {
        fn new(names: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                names: names.to_vec(),
                listed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ToolSource for StaticSource {
        async fn list_tools(&self) -> BTreeMap<String, Arc<dyn Tool>> {
            self.listed.fetch_add(1, Ordering::SeqCst);
            self.names
                .iter()
                .map(|n| (n.to_string(), Arc::new(NamedTool(*n)) as Arc<dyn Tool>))
                .collect()
        }
    }

    /// Records every attempt; fails for the listed modes after pushing `record`.
    struct ScriptedGenerator {
        seen: Arc<Mutex<Vec<ToolChoice>>>,
        fail_on: Vec<ToolChoice>,
        record: Option<Value>,
        text: String,
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            options: &GenerateOptions,
            tool_results: &mut ToolResultBuffer,
        ) -> Result<GenerationOutput, ProviderError> {
            self.seen.lock().unwrap().push(options.tool_choice);
            if let Some(record) = &self.record {
                tool_results.push(record.clone());
            }
            if self.fail_on.contains(&options.tool_choice) {
                return Err(ProviderError::Network("connection reset".into()));
            }
            Ok(GenerationOutput::Text(self.text.clone()))
        }
    }

    struct Harness {
        source: Arc<StaticSource>,
        seen: Arc<Mutex<Vec<ToolChoice>>>,
        built_with: Arc<Mutex<Vec<String>>>,
        collector: Collector,
    }

    fn harness(
        tools: &[&'static str],
        credential: bool,
        fail_on: Vec<ToolChoice>,
        record: Option<Value>,
        text: &str,
    ) -> Harness {
        let source = StaticSource::new(tools);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let built_with = Arc::new(Mutex::new(Vec::new()));

        let (seen_b, built_b, text) = (Arc::clone(&seen), Arc::clone(&built_with), text.to_string());
        let agents = AgentRegistry::new(Arc::new(
            move |_model: &str, tools: ToolRegistry| -> Result<Arc<dyn Generator>, ProviderError> {
                built_b
                    .lock()
                    .unwrap()
                    .extend(tools.names().into_iter().map(String::from));
                Ok(Arc::new(ScriptedGenerator {
                    seen: Arc::clone(&seen_b),
                    fail_on: fail_on.clone(),
                    record: record.clone(),
                    text: text.clone(),
                }))
            },
        ));

        let collector = Collector::new(source.clone(), agents, credential);
        Harness {
            source,
            seen,
            built_with,
            collector,
        }
    }

    fn draft(tools: &[ToolKey]) -> Draft {
        Draft {
            date: "2024-01-01".into(),
            tools: tools.iter().copied().collect::<BTreeSet<_>>(),
            values: vec!["login fix".into()],
            repos: None,
        }
    }

    fn plan(queries: &[&str], repos: &[&str]) -> CollectionPlan {
        CollectionPlan {
            date: "2024-01-01".into(),
            repos: repos.iter().map(|r| r.to_string()).collect(),
            queries: queries.iter().map(|q| q.to_string()).collect(),
            use_recent_activity: queries.is_empty(),
        }
    }

    fn pr_record() -> Value {
        json!({
            "toolName": "github_search_pull_requests",
            "result": {"items": [{"title": "Add login", "html_url": "https://github.com/o/r/pull/1"}]}
        })
    }

    #[test]
    fn retry_policy_shapes() {
        let with_tools: Vec<_> = RetryPolicy::for_tools(true).attempts().collect();
        assert_eq!(with_tools, vec![(0, ToolChoice::Required), (1, ToolChoice::Auto)]);
        let without: Vec<_> = RetryPolicy::for_tools(false).attempts().collect();
        assert_eq!(without, vec![(0, ToolChoice::Auto)]);
    }

    #[test]
    fn prompt_for_scoped_queries() {
        let prompt = build_prompt(&plan(&["login fix"], &["o/r", "o/s"]), &["github_list_commits"]);
        assert!(prompt.starts_with("Collect GitHub signals for the daily report.\nTarget date: 2024-01-01\n"));
        assert!(prompt.contains("Target repos (only these): o/r, o/s"));
        assert!(prompt.contains("[\n  \"login fix\"\n]"));
        assert!(prompt.contains("Restrict all searches to the target repos."));
        assert!(prompt.contains("Available tools: github_list_commits"));
        assert!(prompt.contains("use them as search queries"));
        assert!(!prompt.contains("You MUST call"));
    }

    #[test]
    fn prompt_for_recent_activity_without_scope() {
        let prompt = build_prompt(&plan(&[], &[]), &["github_list_commits", "github_search_issues"]);
        assert!(prompt.contains("Target repos: all accessible repos"));
        assert!(prompt.contains("First list accessible repositories"));
        assert!(prompt.contains("Available tools: github_list_commits,github_search_issues"));
        assert!(prompt.contains("use recent activity for the target date"));
        assert!(prompt.contains("You MUST call at least one GitHub tool"));

        let no_tools = build_prompt(&plan(&[], &[]), &[]);
        assert!(no_tools.contains("No tools available."));
        assert!(!no_tools.contains("You MUST call"));
    }

    #[tokio::test]
    async fn missing_credential_skips_everything() {
        let h = harness(&["github_list_commits"], false, vec![], None, "{}");
        let data = h.collector.collect(&draft(&[ToolKey::Github]), &plan(&[], &[]), "m").await;
        assert!(data.is_empty());
        assert_eq!(h.source.listed.load(Ordering::SeqCst), 0);
        assert!(h.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unselected_github_skips_everything() {
        let h = harness(&["github_list_commits"], true, vec![], None, "{}");
        let data = h
            .collector
            .collect(&draft(&[ToolKey::GoogleCalendar]), &plan(&[], &[]), "m")
            .await;
        assert!(data.is_empty());
        assert_eq!(h.source.listed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn only_read_only_tools_reach_the_agent() {
        let h = harness(
            &["github_search_issues", "github_create_issue", "github_list_commits", "github_merge_pull_request"],
            true,
            vec![],
            None,
            "{}",
        );
        h.collector.collect(&draft(&[ToolKey::Github]), &plan(&[], &[]), "m").await;
        assert_eq!(
            *h.built_with.lock().unwrap(),
            vec!["github_list_commits".to_string(), "github_search_issues".to_string()]
        );
        assert_eq!(*h.seen.lock().unwrap(), vec![ToolChoice::Required]);
    }

    #[tokio::test]
    async fn no_tools_means_single_auto_attempt() {
        let h = harness(&["github_create_issue"], true, vec![ToolChoice::Auto], None, "{}");
        let data = h.collector.collect(&draft(&[ToolKey::Github]), &plan(&[], &[]), "m").await;
        assert!(data.is_empty());
        assert_eq!(*h.seen.lock().unwrap(), vec![ToolChoice::Auto]);
    }

    #[tokio::test]
    async fn unavailable_source_means_single_auto_attempt() {
        let h = harness(&[], true, vec![], None, r#"{"github":[],"calendar":["Standup"]}"#);
        let data = h.collector.collect(&draft(&[ToolKey::Github]), &plan(&["fix"], &[]), "m").await;
        assert_eq!(h.source.listed.load(Ordering::SeqCst), 1);
        assert!(h.built_with.lock().unwrap().is_empty());
        assert_eq!(*h.seen.lock().unwrap(), vec![ToolChoice::Auto]);
        assert_eq!(data.calendar, vec!["Standup".to_string()]);
    }

    #[tokio::test]
    async fn required_failure_retries_in_auto_mode() {
        let text = r#"{"github":[{"type":"commit","title":"Fix","url":"https://x/c/1"}],"calendar":[]}"#;
        let h = harness(&["github_list_commits"], true, vec![ToolChoice::Required], None, text);
        let data = h.collector.collect(&draft(&[ToolKey::Github]), &plan(&["fix"], &[]), "m").await;
        assert_eq!(*h.seen.lock().unwrap(), vec![ToolChoice::Required, ToolChoice::Auto]);
        assert_eq!(data.github.len(), 1);
        assert_eq!(data.github[0].kind, GithubItemType::Commit);
    }

    #[tokio::test]
    async fn double_failure_keeps_partial_buffer() {
        let h = harness(
            &["github_search_pull_requests"],
            true,
            vec![ToolChoice::Required, ToolChoice::Auto],
            Some(pr_record()),
            "",
        );
        let data = h.collector.collect(&draft(&[ToolKey::Github]), &plan(&[], &[]), "m").await;
        assert_eq!(h.seen.lock().unwrap().len(), 2);
        // Same record captured on both attempts; deduplication happens later.
        assert_eq!(data.github.len(), 2);
        assert_eq!(data.github[0].title, "Add login");
    }

    #[tokio::test]
    async fn builder_failure_yields_empty() {
        let source = StaticSource::new(&["github_list_commits"]);
        let agents = AgentRegistry::new(Arc::new(
            |model: &str, _tools: ToolRegistry| -> Result<Arc<dyn Generator>, ProviderError> {
                Err(ProviderError::NotConfigured(model.to_string()))
            },
        ));
        let collector = Collector::new(source, agents, true);
        let data = collector.collect(&draft(&[ToolKey::Github]), &plan(&[], &[]), "m").await;
        assert!(data.is_empty());
    }
}
