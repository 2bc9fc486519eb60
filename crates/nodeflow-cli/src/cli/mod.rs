//! CLI command definitions for the `nodeflow` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod execution;
pub mod run;
pub mod workflow;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color};
use nodeflow_types::execution::{ExecutionLogStatus, ExecutionStatus};
use serde_json::Value;

/// Run institute workflows: import graphs, execute them, inspect their logs.
#[derive(Parser)]
#[command(name = "nodeflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for engine debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory holding `nodeflow.db`, `config.toml` and `queries.toml`.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a workflow bundle (JSON: workflow, templates, mappings).
    Import {
        /// Path to the bundle file.
        file: PathBuf,

        /// Store the bundle even when validation reports problems.
        #[arg(long)]
        force: bool,
    },

    /// Check a workflow bundle without storing or running it.
    Validate {
        /// Path to the bundle file.
        file: PathBuf,
    },

    /// List stored workflows.
    #[command(alias = "ls")]
    List {
        /// Only workflows of this institute.
        #[arg(long)]
        institute: Option<String>,
    },

    /// Run one workflow by id.
    Run {
        /// Workflow id.
        workflow_id: String,

        /// Initial context as a JSON object.
        #[arg(long)]
        payload: Option<String>,

        /// Recorded on the execution for traceability.
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Fire an event: run every active workflow of an institute bound to it.
    Fire {
        /// Institute id.
        institute: String,

        /// Event key (a workflow's `triggerEvent`).
        event: String,

        /// Event payload as a JSON object.
        #[arg(long)]
        payload: Option<String>,

        /// Suppresses repeat runs with the same key while the process lives.
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Execute an ordered list of nodes without following their routing.
    Fanout {
        /// Workflow id.
        workflow_id: String,

        /// Template ids or node names, executed in order.
        #[arg(required = true, num_args = 1..)]
        targets: Vec<String>,

        /// Initial context as a JSON object.
        #[arg(long)]
        payload: Option<String>,
    },

    /// Show recent executions of a workflow.
    Runs {
        /// Workflow id.
        workflow_id: String,

        /// Maximum number of executions to display.
        #[arg(long, default_value = "10")]
        limit: u32,
    },

    /// Show the per-node log of one execution.
    Logs {
        /// Execution UUID.
        execution_id: String,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Parse a `--payload` argument. Absent means an empty object.
pub fn parse_payload(raw: Option<&str>) -> Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw).with_context(|| "Invalid JSON payload"),
        None => Ok(Value::Object(serde_json::Map::new())),
    }
}

pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

pub fn execution_status_cell(status: ExecutionStatus) -> Cell {
    let color = match status {
        ExecutionStatus::Running => Color::Yellow,
        ExecutionStatus::Completed => Color::Green,
        ExecutionStatus::Failed => Color::Red,
    };
    Cell::new(status.as_str()).fg(color)
}

pub fn log_status_cell(status: ExecutionLogStatus) -> Cell {
    let color = match status {
        ExecutionLogStatus::Running => Color::Yellow,
        ExecutionLogStatus::Success => Color::Green,
        ExecutionLogStatus::PartialSuccess => Color::Magenta,
        ExecutionLogStatus::Failed => Color::Red,
        ExecutionLogStatus::Skipped => Color::DarkGrey,
    };
    Cell::new(status.as_str()).fg(color)
}
