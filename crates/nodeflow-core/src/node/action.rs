//! Action node: hand the config to a named data-processor strategy.
//!
//! ```json
//! {"dataProcessor": "ITERATOR", "config": {...}}
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use nodeflow_types::workflow::{NodeTemplate, NodeType};

use super::{error_type, parse_config, NodeError, NodeHandler, NodeOutcome};
use crate::strategy::action::{ActionSpec, ActionStrategyRegistry};
use crate::workflow::ExecutionContext;

pub struct ActionHandler {
    strategies: Arc<ActionStrategyRegistry>,
}

impl ActionHandler {
    pub fn new(strategies: Arc<ActionStrategyRegistry>) -> Self {
        Self { strategies }
    }
}

impl NodeHandler for ActionHandler {
    fn node_type(&self) -> NodeType {
        NodeType::Action
    }

    fn handle<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config_json: &'a str,
        _templates: &'a HashMap<String, NodeTemplate>,
        step: u32,
    ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>> {
        Box::pin(async move {
            let spec: ActionSpec = match parse_config(config_json) {
                Ok(s) => s,
                Err(message) => return Ok(NodeOutcome::failed(message, error_type::INVALID_CONFIG)),
            };
            tracing::debug!(step, data_processor = %spec.data_processor, "dispatching action");
            Ok(self.strategies.dispatch(&spec, context).await)
        })
    }
}
