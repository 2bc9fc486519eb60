//! Nodeflow CLI entry point.
//!
//! Binary name: `nodeflow`
//!
//! Parses CLI arguments, loads configuration, initializes tracing and the
//! database, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use nodeflow_infra::config::{load_engine_config, resolve_data_dir};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(resolve_data_dir);
    let config = load_engine_config(&data_dir).await;

    // Verbosity flags override the configured level; RUST_LOG overrides both.
    let mut logging = config.logging.clone();
    match cli.verbose {
        0 if cli.quiet => logging.level = "error".to_string(),
        0 => {}
        1 => logging.level = "info,nodeflow_core=debug".to_string(),
        _ => logging.level = "trace".to_string(),
    }
    if let Err(e) = nodeflow_observe::tracing_setup::init_tracing(&logging) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    let result = dispatch(cli, data_dir, &config).await;
    nodeflow_observe::tracing_setup::shutdown_tracing();
    result
}

async fn dispatch(
    cli: Cli,
    data_dir: std::path::PathBuf,
    config: &nodeflow_types::config::EngineConfig,
) -> anyhow::Result<()> {
    // Validation reads a file only; no database needed.
    if let Commands::Validate { file } = &cli.command {
        return cli::workflow::handle_validate(file, cli.json).await;
    }

    let state = AppState::init(data_dir, config).await?;

    match cli.command {
        Commands::Import { file, force } => {
            cli::workflow::handle_import(&file, force, &state, cli.json).await
        }
        Commands::Validate { .. } => unreachable!("handled above"),
        Commands::List { institute } => {
            cli::workflow::handle_list(institute.as_deref(), &state, cli.json).await
        }
        Commands::Run {
            workflow_id,
            payload,
            idempotency_key,
        } => {
            cli::run::handle_run(
                &workflow_id,
                payload.as_deref(),
                idempotency_key.as_deref(),
                &state,
                cli.json,
            )
            .await
        }
        Commands::Fire {
            institute,
            event,
            payload,
            idempotency_key,
        } => {
            cli::run::handle_fire(
                &institute,
                &event,
                payload.as_deref(),
                idempotency_key.as_deref(),
                &state,
                cli.json,
            )
            .await
        }
        Commands::Fanout {
            workflow_id,
            targets,
            payload,
        } => {
            cli::run::handle_fanout(&workflow_id, &targets, payload.as_deref(), &state, cli.json)
                .await
        }
        Commands::Runs { workflow_id, limit } => {
            cli::execution::handle_runs(&workflow_id, limit, &state, cli.json).await
        }
        Commands::Logs { execution_id } => {
            cli::execution::handle_logs(&execution_id, &state, cli.json).await
        }
    }
}
