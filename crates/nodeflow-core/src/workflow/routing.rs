//! Routing directives embedded in node configs.
//!
//! After a node runs, the `routing` block of its merged config names the next
//! node by `nodeName`:
//!
//! ```json
//! {"type": "end"}
//! {"type": "goto", "target_node": "notify"}
//! {"type": "conditional", "condition": "amount > 0", "true_node": "a", "false_node": "b"}
//! {"type": "switch", "expression": "status",
//!  "cases": [{"value": "PAID", "target_node": "thanks"}], "default_node": "remind"}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::expression::{to_display_string, truthy, WorkflowEvaluator};

pub const ROUTING_KEY: &str = "routing";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RoutingDirective {
    End,
    Goto {
        target_node: String,
    },
    Conditional {
        condition: String,
        #[serde(default)]
        true_node: Option<String>,
        #[serde(default)]
        false_node: Option<String>,
    },
    Switch {
        expression: String,
        #[serde(default)]
        cases: Vec<SwitchCase>,
        #[serde(default)]
        default_node: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SwitchCase {
    pub value: Value,
    pub target_node: String,
}

/// Why a walk stopped instead of moving to another node.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// Explicit `end` directive.
    End,
    /// The config has no `routing` block.
    NoRouting,
    /// Unknown directive type or malformed fields.
    InvalidDirective(String),
    /// The condition or switch expression failed to evaluate.
    EvaluationFailed(String),
    /// The chosen branch names no node (missing branch, no matching case).
    NoTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Next(String),
    Stop(Termination),
}

impl RoutingDirective {
    /// Read the directive from a merged node config.
    ///
    /// `Ok(None)` means there is no routing block. The `type` tag is matched
    /// case-insensitively.
    pub fn from_config(config: &Value) -> Result<Option<Self>, String> {
        let Some(block) = config.get(ROUTING_KEY).filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let mut block = block.clone();
        if let Some(Value::String(kind)) = block.get_mut("type") {
            *kind = kind.trim().to_lowercase();
        }
        serde_json::from_value(block)
            .map(Some)
            .map_err(|e| e.to_string())
    }

    /// Every node name this directive may route to.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            RoutingDirective::End => Vec::new(),
            RoutingDirective::Goto { target_node } => vec![target_node.as_str()],
            RoutingDirective::Conditional {
                true_node,
                false_node,
                ..
            } => true_node
                .iter()
                .chain(false_node.iter())
                .map(String::as_str)
                .collect(),
            RoutingDirective::Switch {
                cases,
                default_node,
                ..
            } => cases
                .iter()
                .map(|c| c.target_node.as_str())
                .chain(default_node.as_deref())
                .collect(),
        }
    }

    /// Evaluate the directive against the context.
    pub fn decide(&self, evaluator: &WorkflowEvaluator, context: &Map<String, Value>) -> Route {
        let target = match self {
            RoutingDirective::End => return Route::Stop(Termination::End),
            RoutingDirective::Goto { target_node } => Some(target_node.clone()),
            RoutingDirective::Conditional {
                condition,
                true_node,
                false_node,
            } => match evaluator.evaluate_value(condition, context) {
                Ok(v) if truthy(&v) => true_node.clone(),
                Ok(_) => false_node.clone(),
                Err(e) => return Route::Stop(Termination::EvaluationFailed(e.to_string())),
            },
            RoutingDirective::Switch {
                expression,
                cases,
                default_node,
            } => match evaluator.evaluate_value(expression, context) {
                Ok(v) => {
                    let key = to_display_string(&v);
                    cases
                        .iter()
                        .find(|c| to_display_string(&c.value) == key)
                        .map(|c| c.target_node.clone())
                        .or_else(|| default_node.clone())
                }
                Err(e) => return Route::Stop(Termination::EvaluationFailed(e.to_string())),
            },
        };

        match target.filter(|t| !t.trim().is_empty()) {
            Some(name) => Route::Next(name),
            None => Route::Stop(Termination::NoTarget),
        }
    }
}

/// Parse and evaluate the routing block of `config` in one step.
pub fn next_route(config: &Value, evaluator: &WorkflowEvaluator, context: &Map<String, Value>) -> Route {
    match RoutingDirective::from_config(config) {
        Ok(Some(directive)) => directive.decide(evaluator, context),
        Ok(None) => Route::Stop(Termination::NoRouting),
        Err(e) => Route::Stop(Termination::InvalidDirective(e)),
    }
}
