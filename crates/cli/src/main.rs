//! flowkit CLI.
//!
//! Registers the sample workflows and runs, streams, suspends and resumes
//! them from the command line.

mod commands;
mod workflows;

use clap::{Parser, Subcommand};
use commands::Output;
use fk_core::config::load_config_with_env;
use fk_core::engine::WorkflowEngine;
use fk_core::state::ExecutionManager;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowkit")]
#[command(about = "Run step-based workflows with streaming, suspension and resume", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Directory containing `.flowkit/config.toml`
    #[arg(long, global = true, default_value = ".")]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered workflows
    List,

    /// Run a workflow to completion
    Run {
        /// Workflow id
        workflow: String,

        /// JSON object passed as input
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Print every event as it happens
        #[arg(long, conflicts_with = "sse")]
        stream: bool,

        /// Print server-sent-events records instead of the result
        #[arg(long)]
        sse: bool,

        /// Cancel the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Run a workflow and resume it once if it suspends
    RunAndResume {
        /// Workflow id
        workflow: String,

        /// JSON object passed as input
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// JSON object merged into the data on resume
        #[arg(short, long, default_value = "{}")]
        resume_input: String,

        /// User id handed to the steps
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "fk_core=warn,fk_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = load_config_with_env(&cli.config_root).await?;
    let engine = WorkflowEngine::new(config.engine);
    let registry = workflows::builtin()?;

    match cli.command {
        Commands::List => {
            commands::list(&registry);
            Ok(())
        }
        Commands::Run {
            workflow,
            input,
            stream,
            sse,
            timeout_ms,
        } => {
            let output = match (stream, sse) {
                (_, true) => Output::Sse,
                (true, false) => Output::Events,
                (false, false) => Output::Result,
            };
            commands::run(&engine, &registry, &workflow, &input, output, timeout_ms).await
        }
        Commands::RunAndResume {
            workflow,
            input,
            resume_input,
            user,
        } => {
            let manager = ExecutionManager::new(engine, registry);
            commands::run_and_resume(&manager, &workflow, &input, &resume_input, user).await
        }
    }
}
