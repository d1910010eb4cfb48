//! voxturn CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Talk to the orchestrator from the terminal
//! - `config`  — Show, locate, validate or initialize configuration

use clap::{Parser, Subcommand};

mod commands;
mod demo_tools;

#[derive(Parser)]
#[command(
    name = "voxturn",
    about = "voxturn — streaming conversational turn orchestrator",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the orchestrator using demo capabilities
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Path to a caller profile (JSON)
        #[arg(long)]
        profile: Option<std::path::PathBuf>,

        /// Service number SMS confirmations are sent from
        #[arg(long, env = "VOXTURN_PHONE_TO")]
        to: Option<String>,

        /// The caller's number
        #[arg(long, env = "VOXTURN_PHONE_FROM")]
        from: Option<String>,

        /// Treat every input as keypad (DTMF) input
        #[arg(long)]
        dtmf: bool,
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
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Chat {
            message,
            profile,
            to,
            from,
            dtmf,
        } => {
            commands::chat::run(commands::chat::ChatOptions {
                message,
                profile,
                to,
                from,
                dtmf,
            })
            .await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}
