//! Transform node: compute fields and emit only what changed.
//!
//! Data points are applied to a local copy of the context, so each one sees
//! the results of the previous ones. The outcome holds the keys whose final
//! value is new or differs from the input context; re-running a transform on
//! its own output yields no changes.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use nodeflow_types::workflow::{NodeTemplate, NodeType};
use serde_json::{Map, Value};

use super::trigger::{apply_data_points, DataPointError, DataPointsConfig};
use super::{error_type, parse_config, NodeError, NodeHandler, NodeOutcome};
use crate::expression::WorkflowEvaluator;
use crate::workflow::ExecutionContext;

pub struct TransformHandler {
    evaluator: Arc<WorkflowEvaluator>,
}

impl TransformHandler {
    pub fn new(evaluator: Arc<WorkflowEvaluator>) -> Self {
        Self { evaluator }
    }

    fn run(&self, context: &ExecutionContext, config_json: &str) -> NodeOutcome {
        let config: DataPointsConfig = match parse_config(config_json) {
            Ok(c) => c,
            Err(message) => return NodeOutcome::failed(message, error_type::INVALID_CONFIG),
        };

        let mut local = context.clone();
        if let Err(e) = apply_data_points(&self.evaluator, &mut local, &config.output_data_points) {
            let kind = match e {
                DataPointError::Empty(_) => error_type::INVALID_CONFIG,
                DataPointError::Expression { .. } => error_type::EXPRESSION_ERROR,
            };
            return NodeOutcome::failed(e.to_string(), kind);
        }

        NodeOutcome::success(diff(context.as_map(), local.into_map()))
    }
}

/// Keys of `after` that are new or different relative to `before`.
fn diff(before: &Map<String, Value>, after: Map<String, Value>) -> Map<String, Value> {
    after
        .into_iter()
        .filter(|(key, value)| before.get(key) != Some(value))
        .collect()
}

impl NodeHandler for TransformHandler {
    fn node_type(&self) -> NodeType {
        NodeType::Transform
    }

    fn handle<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config_json: &'a str,
        _templates: &'a HashMap<String, NodeTemplate>,
        _step: u32,
    ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>> {
        Box::pin(async move { Ok(self.run(context, config_json)) })
    }
}
