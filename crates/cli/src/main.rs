#![forbid(unsafe_code)]

mod commands;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use spendwise_infra::{AppConfig, LogFormat};

#[derive(Parser)]
#[command(name = "spendwise")]
#[command(about = "Expense analysis from the command line")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    /// Overrides SPENDWISE_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the asynchronous analysis job and print every state transition
    Analyze(AnalyzeArgs),
    /// Summarize expenses immediately, without a backend job
    Summarize {
        #[arg(long)]
        file: PathBuf,
    },
    /// List an owner's expenses from the remote store
    List {
        #[arg(long)]
        owner: String,
    },
}

#[derive(Args, Debug, Clone)]
pub(crate) struct AnalyzeArgs {
    /// JSON array of expense records
    #[arg(long, conflicts_with = "owner", required_unless_present = "owner")]
    pub file: Option<PathBuf>,
    /// Fetch the owner's expenses from the remote store
    #[arg(long)]
    pub owner: Option<String>,
    /// Use the local placeholder backend even when a remote one is configured
    #[arg(long, default_value_t = false)]
    pub local: bool,
    #[arg(long)]
    pub max_attempts: Option<u32>,
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    #[arg(long)]
    pub submission_delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            spendwise_observability::init();
            tracing::error!(error = %err, "invalid configuration");
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    spendwise_observability::init_with(cli.log_format.unwrap_or(config.log_format));

    let result = match cli.command {
        Commands::Analyze(args) => commands::analyze(&config, args, cli.json).await,
        Commands::Summarize { file } => commands::summarize(&file, cli.json),
        Commands::List { owner } => commands::list(&config, &owner, cli.json).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
