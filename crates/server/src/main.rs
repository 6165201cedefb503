//! Boardroom Server
//!
//! Axum server and command line front end for the Boardroom pipeline.

mod api;
mod cli;
mod config;

use std::sync::Arc;

use boardroom_core::state::io::{prepare_runtime_dir, runtime_file, ENV_FILE};
use boardroom_core::state::BoardroomDb;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::Settings;

#[derive(Parser, Clone)]
#[command(author, version, about = "Boardroom - multi-analyst decision pipeline")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the Boardroom server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Run the pipeline on a problem (CLI mode, no server)
    Run {
        /// The business problem to analyze
        problem: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List past runs or replay one report
    History {
        /// Entry to replay
        #[arg(long)]
        id: Option<String>,
    },
    /// Show or update analyst weights
    Weights {
        /// Weight to store, as id=value (repeatable)
        #[arg(long = "set", value_parser = cli::parse_weight)]
        set: Vec<(String, f64)>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(port: u16) -> anyhow::Result<()> {
    let db = BoardroomDb::open()?;
    let state = Arc::new(AppState::new(Arc::new(db), Settings::default_path()));
    api::run_server(state, port).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Secrets live next to the database; a project-level .env also works
    let _ = dotenvy::from_path(runtime_file(ENV_FILE));
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    prepare_runtime_dir().await?;

    match args.command {
        Some(CliCommand::Run { problem, json }) => cli::run(&problem, json).await,
        Some(CliCommand::History { id }) => cli::history(id).await,
        Some(CliCommand::Weights { set }) => cli::weights(set).await,
        Some(CliCommand::Serve { port }) => serve(port).await,
        None => serve(8080).await,
    }
}
