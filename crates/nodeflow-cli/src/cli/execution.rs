//! Execution history commands: runs of a workflow, per-node logs of a run.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use nodeflow_core::repository::execution_log::ExecutionLogRepository;
use nodeflow_core::repository::workflow::WorkflowRepository;

use super::{execution_status_cell, log_status_cell, short_id};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

pub async fn handle_runs(workflow_id: &str, limit: u32, state: &AppState, json: bool) -> Result<()> {
    let runs = state
        .workflows
        .list_executions(workflow_id, limit)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list executions: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!();
        println!("  No executions for workflow '{workflow_id}'.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Execution").fg(Color::Cyan),
            Cell::new("Status"),
            Cell::new("Steps"),
            Cell::new("Started"),
            Cell::new("Completed"),
            Cell::new("Error"),
        ]);

    for r in &runs {
        let completed = r
            .completed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(r.id),
            execution_status_cell(r.status),
            Cell::new(r.steps_executed),
            Cell::new(r.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(completed),
            Cell::new(r.error_message.as_deref().unwrap_or("")),
        ]);
    }

    println!();
    println!("  Executions of '{}'", style(workflow_id).cyan());
    println!();
    println!("{table}");
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

pub async fn handle_logs(execution_id: &str, state: &AppState, json: bool) -> Result<()> {
    let execution_id: uuid::Uuid = execution_id
        .parse()
        .with_context(|| format!("Invalid execution ID: '{execution_id}'"))?;

    let logs = state
        .logs
        .list_logs(&execution_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list execution logs: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
        return Ok(());
    }

    if logs.is_empty() {
        println!();
        println!("  No node logs for execution {}.", short_id(&execution_id));
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("Node"),
            Cell::new("Type"),
            Cell::new("Status"),
            Cell::new("Time (ms)"),
            Cell::new("Error"),
        ]);

    for (i, log) in logs.iter().enumerate() {
        let error = match (&log.error_type, &log.error_message) {
            (Some(kind), Some(message)) => format!("{kind}: {message}"),
            (None, Some(message)) => message.clone(),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&log.node_template_id),
            Cell::new(&log.node_type),
            log_status_cell(log.status),
            Cell::new(
                log.execution_time_ms
                    .map(|ms| ms.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(error),
        ]);
    }

    println!();
    println!("  Node log of execution {}", style(execution_id).cyan());
    println!();
    println!("{table}");
    println!();

    Ok(())
}
