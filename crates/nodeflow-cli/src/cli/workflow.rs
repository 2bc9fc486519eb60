//! Workflow graph commands: import, validate, list.

use std::path::Path;

use anyhow::{bail, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use nodeflow_core::repository::workflow::WorkflowRepository;
use nodeflow_core::workflow::validate::validate_graph;
use nodeflow_infra::config::read_bundle;
use nodeflow_types::workflow::WorkflowBundle;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

/// Print the validation report for a bundle file. Fails when problems exist.
pub async fn handle_validate(file: &Path, json: bool) -> Result<()> {
    let bundle = read_bundle(file).await?;
    let problems = validate_graph(&bundle);

    if json {
        let out = serde_json::json!({
            "workflow_id": bundle.workflow.id,
            "valid": problems.is_empty(),
            "problems": problems,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&bundle, &problems);
    }

    if !problems.is_empty() {
        bail!("{} problem(s) found in '{}'", problems.len(), file.display());
    }
    Ok(())
}

fn print_report(bundle: &WorkflowBundle, problems: &[String]) {
    println!();
    if problems.is_empty() {
        println!(
            "  {} Workflow '{}' is valid ({} nodes)",
            style("*").green().bold(),
            style(&bundle.workflow.id).cyan(),
            bundle.mappings.len()
        );
    } else {
        println!(
            "  {} Workflow '{}' has {} problem(s):",
            style("!").red().bold(),
            style(&bundle.workflow.id).cyan(),
            problems.len()
        );
        for problem in problems {
            println!("    - {problem}");
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

pub async fn handle_import(file: &Path, force: bool, state: &AppState, json: bool) -> Result<()> {
    let bundle = read_bundle(file).await?;
    let problems = validate_graph(&bundle);
    if !problems.is_empty() && !force {
        if !json {
            print_report(&bundle, &problems);
        }
        bail!(
            "Refusing to import '{}' with {} problem(s); pass --force to store it anyway",
            bundle.workflow.id,
            problems.len()
        );
    }

    state
        .workflows
        .save_bundle(&bundle)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to save workflow: {e}"))?;

    if json {
        let out = serde_json::json!({
            "workflow_id": bundle.workflow.id,
            "institute_id": bundle.workflow.institute_id,
            "templates": bundle.templates.len(),
            "mappings": bundle.mappings.len(),
            "problems": problems,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Imported workflow '{}'",
            style("*").green().bold(),
            style(&bundle.workflow.name).cyan()
        );
        println!("  ID: {}", bundle.workflow.id);
        println!("  Institute: {}", bundle.workflow.institute_id);
        println!("  Nodes: {}", bundle.mappings.len());
        if let Some(event) = &bundle.workflow.trigger_event {
            println!("  Trigger event: {event}");
        }
        if !problems.is_empty() {
            println!("  {} stored with {} problem(s)", style("!").yellow(), problems.len());
        }
        println!("  Database: {}", style(state.data_dir.join("nodeflow.db").display()).dim());
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

pub async fn handle_list(institute: Option<&str>, state: &AppState, json: bool) -> Result<()> {
    let workflows = state
        .workflows
        .list_workflows(institute)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list workflows: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows stored.");
        println!(
            "  Import one with: {}",
            style("nodeflow import <bundle.json>").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Institute"),
            Cell::new("Trigger event"),
            Cell::new("Status"),
        ]);

    for w in &workflows {
        table.add_row(vec![
            Cell::new(&w.id),
            Cell::new(&w.name),
            Cell::new(&w.institute_id),
            Cell::new(w.trigger_event.as_deref().unwrap_or("-")),
            Cell::new(w.status.as_str()),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}
