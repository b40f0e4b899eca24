//! Marketing Insight Agent CLI
//!
//! Main entry point for the `insight` command-line tool.
//! Answers marketing questions grounded in campaign data and blog insights.

mod commands;
mod server;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IndexBlogsCommand, ServeCommand};
use insight_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;
use tracing::Instrument;

/// Marketing Insight Agent - grounded answers from campaign data and blogs
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(about = "Grounded marketing insights from campaign data and blogs", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "INSIGHT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "INSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Generation provider (ollama, gemini)
    #[arg(short, long, global = true, env = "INSIGHT_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "INSIGHT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question, optionally grounded in a campaign CSV
    Ask(AskCommand),

    /// Index blog posts into the vector store
    IndexBlogs(IndexBlogsCommand),

    /// Run the HTTP server
    Serve(ServeCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Workspace and config file decide which YAML is read, so they apply at load time
    let config = AppConfig::load_from(cli.workspace, cli.config)?;
    let mut config = config.with_overrides(
        None,
        None,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    if cli.log_json {
        config.log_json = true;
    }

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;
    config.validate()?;

    tracing::info!("Marketing Insight Agent starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::IndexBlogs(_) => "index-blogs",
        Commands::Serve(_) => "serve",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Ask(cmd) => cmd.execute(&config).await,
            Commands::IndexBlogs(cmd) => cmd.execute(&config).await,
            Commands::Serve(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
