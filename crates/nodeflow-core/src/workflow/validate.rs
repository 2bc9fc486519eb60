//! Static checks over a workflow bundle, run without executing anything.

use std::collections::{HashMap, HashSet};

use nodeflow_types::workflow::WorkflowBundle;
use serde_json::Value;

use super::merge::merge_config_json;
use super::routing::RoutingDirective;

/// Report structural problems in a bundle. An empty result means the graph is
/// well formed; it says nothing about termination.
pub fn validate_graph(bundle: &WorkflowBundle) -> Vec<String> {
    let mut problems = Vec::new();
    let templates = bundle.templates_by_id();

    if bundle.mappings.is_empty() {
        problems.push("workflow has no node mappings".to_string());
    }

    let starts = bundle.mappings.iter().filter(|m| m.is_start_node).count();
    match starts {
        0 if !bundle.mappings.is_empty() => problems.push(
            "no mapping is flagged as start node; the lowest nodeOrder will be used".to_string(),
        ),
        0 | 1 => {}
        n => problems.push(format!("{n} mappings are flagged as start node")),
    }

    let mut names: HashMap<&str, usize> = HashMap::new();
    for mapping in &bundle.mappings {
        if let Some(template) = templates.get(&mapping.node_template_id) {
            *names.entry(template.node_name.as_str()).or_default() += 1;
        }
    }
    let mut duplicates: Vec<&str> = names
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(name, _)| *name)
        .collect();
    duplicates.sort_unstable();
    for name in duplicates {
        problems.push(format!("node name '{name}' is used by more than one mapping"));
    }
    let known_names: HashSet<&str> = names.keys().copied().collect();

    for mapping in bundle.ordered_mappings() {
        let Some(template) = templates.get(&mapping.node_template_id) else {
            problems.push(format!(
                "mapping references unknown template '{}'",
                mapping.node_template_id
            ));
            continue;
        };
        let label = &template.node_name;

        if template.parsed_type().is_none() {
            problems.push(format!(
                "node '{label}' has unknown node type '{}'",
                template.node_type
            ));
        }

        if serde_json::from_str::<Value>(&template.config_json).is_err() {
            problems.push(format!("node '{label}' has unparseable config JSON"));
            continue;
        }
        if let Some(override_config) = mapping.override_config.as_deref() {
            if !override_config.trim().is_empty()
                && serde_json::from_str::<Value>(override_config).is_err()
            {
                problems.push(format!(
                    "node '{label}' has unparseable override config (it will be ignored)"
                ));
            }
        }

        let merged = merge_config_json(&template.config_json, mapping.override_config.as_deref());
        let Ok(config) = serde_json::from_str::<Value>(&merged) else {
            continue;
        };
        match RoutingDirective::from_config(&config) {
            Ok(Some(directive)) => {
                for target in directive.targets() {
                    if !known_names.contains(target) {
                        problems.push(format!(
                            "node '{label}' routes to '{target}', which names no node"
                        ));
                    }
                }
            }
            Ok(None) => {}
            Err(e) => problems.push(format!("node '{label}' has an invalid routing block: {e}")),
        }
    }

    problems
}
