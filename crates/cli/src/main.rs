//! Nippo CLI: the main entry point.
//!
//! Commands:
//! - `generate`: Build one daily report and print it
//! - `serve`   : Start the HTTP gateway
//! - `tools`   : List the read-only GitHub tools the collector may use

use clap::{Args, Parser, Subcommand};
use nippo_core::report::ToolKey;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "nippo", about = "Nippo daily report generator", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a daily report
    Generate(GenerateArgs),

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the remote GitHub tools available to the collector
    Tools,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Report date (YYYY-MM-DD); defaults to today
    #[arg(short, long)]
    pub date: Option<String>,

    /// Read the template from a file
    #[arg(short, long, conflicts_with = "template_text")]
    pub template: Option<PathBuf>,

    /// Inline template text
    #[arg(long = "template-text", value_name = "TEXT")]
    pub template_text: Option<String>,

    /// A work summary item (repeatable)
    #[arg(long = "value", value_name = "TEXT")]
    pub values: Vec<String>,

    /// Restrict GitHub searches to this repository, `owner/name` (repeatable)
    #[arg(long = "repo", value_name = "OWNER/NAME")]
    pub repos: Vec<String>,

    /// Signal source to enable (repeatable)
    #[arg(long = "tool", value_name = "TOOL", default_values_t = [ToolKey::Github])]
    pub tools: Vec<ToolKey>,

    /// Model identifier; defaults to the configured model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the plan, collected signals and output as JSON
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate(args) => commands::generate::run(args).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Tools => commands::tools::run().await?,
    }

    Ok(())
}
