//! CountBot CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Initialize config & workspace
//! - `tools`   — List the builtin tools
//! - `run`     — Execute one tool directly
//! - `check`   — Test a shell command against the safety guard
//! - `config`  — Show, locate, or validate the configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "countbot",
    about = "CountBot — tool-calling agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and workspace
    Onboard,

    /// List the tools the agent can call
    Tools {
        /// Print the full definitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a single tool call
    Run {
        /// Tool name, e.g. `read_file`
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Check a shell command against the safety guard
    Check {
        /// The command line to check
        command: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
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
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Tools { json } => commands::tools::run(json).await?,
        Commands::Run { tool, args } => commands::run::run(&tool, &args).await?,
        Commands::Check { command } => commands::check::run(&command).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
