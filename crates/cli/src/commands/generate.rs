//! `nippo generate`: Build one daily report.

use crate::GenerateArgs;
use nippo_config::AppConfig;
use nippo_core::report::ReportRequest;
use nippo_pipeline::ReportWorkflow;
use nippo_pipeline::format::today;

/// Template used when neither `--template` nor `--template-text` is given.
pub const DEFAULT_TEMPLATE: &str = "# {{date}}

## Done
- {{dummy.todo1}}
- {{dummy.todo2}}

## Next
- {{dummy.next1}}
";

/// Turn CLI arguments into a report request.
pub fn build_request(args: &GenerateArgs, config: &AppConfig) -> Result<ReportRequest, Box<dyn std::error::Error>> {
    let template = match (&args.template, &args.template_text) {
        (Some(path), _) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read template {}: {e}", path.display()))?,
        (None, Some(text)) => text.clone(),
        (None, None) => DEFAULT_TEMPLATE.to_string(),
    };

    Ok(ReportRequest {
        date: args.date.clone().unwrap_or_else(today),
        template,
        values: args.values.clone(),
        repos: (!args.repos.is_empty()).then(|| args.repos.clone()),
        tools: args.tools.iter().copied().collect(),
        model: args.model.clone().unwrap_or_else(|| config.default_model.clone()),
    })
}

pub async fn run(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!("  No model API key configured; rendering the template without a model.");
        eprintln!("  Set NIPPO_API_KEY or GOOGLE_GENERATIVE_AI_API_KEY to enable generation.");
    }

    let request = build_request(&args, &config)?;
    tracing::debug!(date = %request.date, model = %request.model, tools = request.tools.len(), "Report request built");
    let workflow = ReportWorkflow::from_config(&config)?;
    let outcome = workflow.run(&request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.output);
    }

    Ok(())
}
