//! Execution commands: run a workflow, fire an event, fan out over nodes.

use anyhow::Result;
use chrono::Utc;
use console::style;
use uuid::Uuid;

use nodeflow_core::engine::{RunSummary, TriggeredRun};
use nodeflow_core::repository::workflow::WorkflowRepository;
use nodeflow_core::workflow::ExecutionContext;
use nodeflow_types::execution::{ExecutionStatus, WorkflowExecution};

use super::parse_payload;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub async fn handle_run(
    workflow_id: &str,
    payload: Option<&str>,
    idempotency_key: Option<&str>,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let payload = parse_payload(payload)?;
    let summary = state
        .engine
        .run(workflow_id, payload, idempotency_key)
        .await
        .map_err(|e| anyhow::anyhow!("Workflow '{workflow_id}' failed: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn summary_json(summary: &RunSummary) -> serde_json::Value {
    serde_json::json!({
        "execution_id": summary.execution_id.to_string(),
        "workflow_id": summary.workflow_id,
        "status": summary.status.as_str(),
        "steps": summary.steps,
        "visited": summary.visited,
        "termination": format!("{:?}", summary.termination),
        "context": summary.context.as_map(),
    })
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "  {} Workflow '{}' {}",
        style("*").green().bold(),
        style(&summary.workflow_id).cyan(),
        summary.status.as_str()
    );
    println!("  Execution: {}", summary.execution_id);
    println!("  Steps: {}", summary.steps);
    println!("  Path: {}", summary.visited.join(" -> "));
    println!("  Stopped: {:?}", summary.termination);
    println!();
    println!("  {}", style("Final context:").bold());
    match serde_json::to_string_pretty(summary.context.as_map()) {
        Ok(text) => {
            for line in text.lines() {
                println!("    {line}");
            }
        }
        Err(e) => println!("    <unprintable: {e}>"),
    }
    println!();
}

// ---------------------------------------------------------------------------
// Fire
// ---------------------------------------------------------------------------

pub async fn handle_fire(
    institute: &str,
    event: &str,
    payload: Option<&str>,
    idempotency_key: Option<&str>,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let payload = parse_payload(payload)?;
    let runs = state
        .trigger
        .fire(institute, event, payload, idempotency_key)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to fire '{event}': {e}"))?;

    if json {
        let out: Vec<_> = runs
            .iter()
            .map(|run| match run {
                TriggeredRun::Completed(summary) => summary_json(summary),
                TriggeredRun::Duplicate {
                    workflow_id,
                    idempotency_key,
                } => serde_json::json!({
                    "workflow_id": workflow_id,
                    "status": "DUPLICATE",
                    "idempotency_key": idempotency_key,
                }),
                TriggeredRun::Failed { workflow_id, error } => serde_json::json!({
                    "workflow_id": workflow_id,
                    "status": "FAILED",
                    "error": error,
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    if runs.is_empty() {
        println!(
            "  No active workflow of '{}' listens for '{}'.",
            style(institute).cyan(),
            style(event).cyan()
        );
        println!();
        return Ok(());
    }

    for run in &runs {
        match run {
            TriggeredRun::Completed(summary) => println!(
                "  {} {} {} in {} step(s), execution {}",
                style("*").green().bold(),
                style(run.workflow_id()).cyan(),
                summary.status.as_str(),
                summary.steps,
                summary.execution_id
            ),
            TriggeredRun::Duplicate { idempotency_key, .. } => println!(
                "  {} {} skipped, key '{}' already seen",
                style("-").dim(),
                style(run.workflow_id()).cyan(),
                idempotency_key
            ),
            TriggeredRun::Failed { error, .. } => println!(
                "  {} {} failed: {}",
                style("!").red().bold(),
                style(run.workflow_id()).cyan(),
                style(error).red()
            ),
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Fanout
// ---------------------------------------------------------------------------

pub async fn handle_fanout(
    workflow_id: &str,
    targets: &[String],
    payload: Option<&str>,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let payload = parse_payload(payload)?;
    let bundle = state
        .workflows
        .load_bundle(workflow_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load workflow: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("Workflow '{workflow_id}' not found"))?;

    let execution_id = Uuid::now_v7();
    state
        .workflows
        .create_execution(&WorkflowExecution {
            id: execution_id,
            workflow_id: bundle.workflow.id.clone(),
            institute_id: bundle.workflow.institute_id.clone(),
            status: ExecutionStatus::Running,
            idempotency_key: None,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            steps_executed: 0,
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to record execution: {e}"))?;

    let mut context = ExecutionContext::for_run(
        execution_id,
        &bundle.workflow.id,
        &bundle.workflow.institute_id,
        payload,
    );
    let mut steps = 0u32;
    let result = state
        .router
        .process_routing(&bundle, execution_id, targets, &mut context, &mut steps)
        .await;

    let (status, error) = match &result {
        Ok(()) => (ExecutionStatus::Completed, None),
        Err(e) => (ExecutionStatus::Failed, Some(e.to_string())),
    };
    state
        .workflows
        .finish_execution(&execution_id, status, Utc::now(), steps, error.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to finalize execution: {e}"))?;
    result.map_err(|e| anyhow::anyhow!("Fan-out over '{workflow_id}' failed: {e}"))?;

    if json {
        let out = serde_json::json!({
            "execution_id": execution_id.to_string(),
            "workflow_id": workflow_id,
            "steps": steps,
            "context": context.as_map(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Ran {} node(s) of '{}'",
            style("*").green().bold(),
            steps,
            style(workflow_id).cyan()
        );
        println!("  Execution: {execution_id}");
        println!(
            "  Inspect: {}",
            style(format!("nodeflow logs {execution_id}")).dim()
        );
        println!();
    }
    Ok(())
}
