//! `nippo tools`: List the read-only GitHub tools the collector may use.

use nippo_config::AppConfig;
use nippo_core::tool::ToolSource;
use nippo_tools::{GithubMcpClient, read_only_tools};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if config.github.token.is_none() {
        eprintln!("  GITHUB_PERSONAL_ACCESS_TOKEN is not set; no remote tools are available.");
        return Ok(());
    }

    let client = GithubMcpClient::from_config(&config.github)?;
    let listed = client.list_tools().await;
    let total = listed.len();
    let tools = read_only_tools(listed, client.namespace());

    println!("GitHub tools ({} of {} are read-only)", tools.len(), total);
    println!("   Server: {}", config.github.mcp_url);
    println!();
    for (name, tool) in &tools {
        let summary = tool.description().lines().next().unwrap_or("");
        println!("  {name:<40} {summary}");
    }

    Ok(())
}
