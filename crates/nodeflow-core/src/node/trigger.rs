//! Trigger node: seed the context from declared output data points.
//!
//! ```json
//! {"outputDataPoints": [
//!     {"fieldName": "amount", "value": 100},
//!     {"fieldName": "amountLabel", "compute": "'INR ' + (amount|str)"}
//! ]}
//! ```
//!
//! Unlike every other handler, a trigger failure aborts the run.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use nodeflow_types::workflow::{NodeTemplate, NodeType};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::{parse_config, NodeError, NodeHandler, NodeOutcome};
use crate::expression::{ExpressionError, WorkflowEvaluator};
use crate::workflow::ExecutionContext;

/// One field assignment: `compute` (an expression) wins over `value`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDataPoint {
    pub field_name: String,
    #[serde(default)]
    pub compute: Option<String>,
    /// Present-but-null is a literal null, distinct from absent.
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPointsConfig {
    #[serde(default, alias = "transformations")]
    pub output_data_points: Vec<OutputDataPoint>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum DataPointError {
    #[error("data point '{0}' has neither 'compute' nor 'value'")]
    Empty(String),

    #[error("data point '{field}' failed: {source}")]
    Expression {
        field: String,
        source: ExpressionError,
    },
}

/// Apply `points` in order to `local`, each seeing earlier results.
pub(crate) fn apply_data_points(
    evaluator: &WorkflowEvaluator,
    local: &mut ExecutionContext,
    points: &[OutputDataPoint],
) -> Result<(), DataPointError> {
    for point in points {
        let value = match (&point.compute, &point.value) {
            (Some(expr), _) => evaluator
                .evaluate_value(expr, local.as_map())
                .map_err(|source| DataPointError::Expression {
                    field: point.field_name.clone(),
                    source,
                })?,
            (None, Some(v)) => v.clone(),
            (None, None) => return Err(DataPointError::Empty(point.field_name.clone())),
        };
        local.insert(point.field_name.clone(), value);
    }
    Ok(())
}

pub struct TriggerHandler {
    evaluator: Arc<WorkflowEvaluator>,
}

impl TriggerHandler {
    pub fn new(evaluator: Arc<WorkflowEvaluator>) -> Self {
        Self { evaluator }
    }

    fn run(&self, context: &ExecutionContext, config_json: &str) -> Result<NodeOutcome, NodeError> {
        let config: DataPointsConfig = parse_config(config_json).map_err(NodeError::Trigger)?;

        let mut local = context.clone();
        apply_data_points(&self.evaluator, &mut local, &config.output_data_points)
            .map_err(|e| NodeError::Trigger(e.to_string()))?;

        let changes: Map<String, Value> = config
            .output_data_points
            .iter()
            .filter_map(|p| {
                local
                    .get(&p.field_name)
                    .map(|v| (p.field_name.clone(), v.clone()))
            })
            .collect();
        Ok(NodeOutcome::success(changes))
    }
}

impl NodeHandler for TriggerHandler {
    fn node_type(&self) -> NodeType {
        NodeType::Trigger
    }

    fn handle<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config_json: &'a str,
        _templates: &'a HashMap<String, NodeTemplate>,
        _step: u32,
    ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>> {
        Box::pin(async move { self.run(context, config_json) })
    }
}
