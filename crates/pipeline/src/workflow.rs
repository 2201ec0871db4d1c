//! Orchestrator: the linear Plan → Collect → Format workflow.
//!
//! Every request walks `Plan → Collect → Format → Done` exactly once.
//! Collection never fails; formatting fails only under the `propagate`
//! generation-failure policy, and that failure is the single outcome the
//! caller sees.

use crate::collect::{COLLECTOR_INSTRUCTIONS, Collector};
use crate::format::{FORMATTER_INSTRUCTIONS, Formatter};
use crate::plan::build_plan;
use crate::summarize::{SummaryLimits, summarize};
use nippo_agent::{AgentBuilder, AgentRegistry, ToolAgent};
use nippo_config::AppConfig;
use nippo_core::error::{Error, ProviderError, Result};
use nippo_core::generation::Generator;
use nippo_core::report::{CollectedData, CollectionPlan, ReportMeta, ReportRequest, ReportResponse};
use nippo_core::tool::{ToolRegistry, ToolSource};
use nippo_providers::ProviderRouter;
use nippo_tools::GithubMcpClient;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Workflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    Plan,
    Collect,
    Format,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Plan => "PLAN",
            Stage::Collect => "COLLECT",
            Stage::Format => "FORMAT",
            Stage::Done => "DONE",
        }
    }

    /// The stage that follows this one. `Done` is terminal.
    pub fn next(&self) -> Stage {
        match self {
            Stage::Plan => Stage::Collect,
            Stage::Collect => Stage::Format,
            Stage::Format | Stage::Done => Stage::Done,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutcome {
    pub output: String,
    pub plan: CollectionPlan,
    /// Summarized signals, as handed to the formatter.
    pub collected: CollectedData,
}

impl ReportOutcome {
    /// Transport response for `request`.
    pub fn into_response(self, request: &ReportRequest) -> ReportResponse {
        ReportResponse {
            output: self.output,
            meta: ReportMeta {
                model: request.model.clone(),
                tools: request.tools.clone(),
            },
        }
    }
}

/// Agent builder that resolves the model through `router` and configures
/// the agent with `instructions`.
pub fn agent_builder(
    router: Arc<ProviderRouter>,
    instructions: &'static str,
    temperature: f32,
    max_tokens: u32,
) -> AgentBuilder {
    Arc::new(move |model: &str, tools: ToolRegistry| -> std::result::Result<Arc<dyn Generator>, ProviderError> {
        let (provider, model_name) = router
            .resolve(model)
            .ok_or_else(|| ProviderError::NotConfigured(format!("no provider for model '{model}'")))?;
        let agent = ToolAgent::new(provider, model_name, tools)
            .with_instructions(instructions)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);
        Ok(Arc::new(agent))
    })
}

/// The report-generation workflow.
pub struct ReportWorkflow {
    collector: Collector,
    formatter: Formatter,
    limits: SummaryLimits,
}

impl ReportWorkflow {
    pub fn new(collector: Collector, formatter: Formatter) -> Self {
        Self {
            collector,
            formatter,
            limits: SummaryLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SummaryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Wire the workflow from configuration: the provider router, the GitHub
    /// MCP tool source, and one agent registry per role.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let router = Arc::new(nippo_providers::build_from_config(config));
        let tools: Arc<dyn ToolSource> = Arc::new(
            GithubMcpClient::from_config(&config.github).map_err(|e| Error::Config {
                message: format!("GitHub MCP client: {e}"),
            })?,
        );
        let credential_present = config.has_api_key();

        let collector_agents = AgentRegistry::new(agent_builder(
            Arc::clone(&router),
            COLLECTOR_INSTRUCTIONS,
            config.default_temperature,
            config.default_max_tokens,
        ));
        let formatter_agents = AgentRegistry::new(agent_builder(
            router,
            FORMATTER_INSTRUCTIONS,
            config.default_temperature,
            config.default_max_tokens,
        ));

        let collector = Collector::new(tools, collector_agents, credential_present)
            .with_namespace(&config.github.namespace)
            .with_limits(&config.collector);
        let formatter = Formatter::new(formatter_agents, credential_present).with_config(config.formatter.clone());

        Ok(Self::new(collector, formatter).with_limits(SummaryLimits::from(&config.limits)))
    }

    /// Run one request through every stage.
    pub async fn run(&self, request: &ReportRequest) -> Result<ReportOutcome> {
        let draft = request.draft();
        let mut stage = Stage::Plan;
        info!(stage = %stage, date = %draft.date, model = %request.model, "Report workflow started");

        let plan = build_plan(&draft);
        debug!(
            queries = plan.queries.len(),
            repos = plan.repos.len(),
            recent = plan.use_recent_activity,
            "Plan built"
        );

        stage = stage.next();
        info!(stage = %stage, "Collecting signals");
        let raw = self.collector.collect(&draft, &plan, &request.model).await;
        let collected = summarize(&raw, &self.limits);
        debug!(
            github = collected.github.len(),
            calendar = collected.calendar.len(),
            dropped = (raw.github.len() + raw.calendar.len())
                .saturating_sub(collected.github.len() + collected.calendar.len()),
            "Signals summarized"
        );

        stage = stage.next();
        info!(stage = %stage, "Formatting report");
        let output = self
            .formatter
            .format(&request.model, &request.template, &draft, &collected)
            .await?;

        stage = stage.next();
        info!(stage = %stage, output_chars = output.chars().count(), "Report workflow finished");

        Ok(ReportOutcome {
            output,
            plan,
            collected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_only_move_forward() {
        let mut stage = Stage::Plan;
        let mut seen = vec![stage];
        while stage != Stage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(seen, vec![Stage::Plan, Stage::Collect, Stage::Format, Stage::Done]);
        assert_eq!(Stage::Done.next(), Stage::Done);
        assert_eq!(Stage::Collect.to_string(), "COLLECT");
    }

    #[test]
    fn unknown_provider_fails_the_builder() {
        let router = Arc::new(ProviderRouter::new("missing"));
        let builder = agent_builder(router, FORMATTER_INSTRUCTIONS, 0.7, 1024);
        let err = builder("google/gemini-2.5-flash-lite", ToolRegistry::new()).err();
        assert!(matches!(err, Some(ProviderError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn config_without_credentials_runs_offline() {
        let workflow = ReportWorkflow::from_config(&AppConfig::default()).unwrap();
        let request = ReportRequest {
            date: "2024-01-01".into(),
            template: "# {{date}}".into(),
            values: vec![],
            repos: None,
            tools: [nippo_core::report::ToolKey::Github].into_iter().collect(),
            model: "google/gemini-2.5-flash-lite".into(),
        };
        let outcome = workflow.run(&request).await.unwrap();
        assert_eq!(outcome.output, "# 2024-01-01");
        assert!(outcome.plan.use_recent_activity);
        assert!(outcome.collected.is_empty());

        let response = outcome.into_response(&request);
        assert_eq!(response.meta.model, "google/gemini-2.5-flash-lite");
    }
}
