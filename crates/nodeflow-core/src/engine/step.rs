//! One node visit: merge config, dispatch, audit, apply changes.
//!
//! Shared by the state-machine walk and the ordered router so both execute a
//! node the same way.

use std::collections::HashMap;
use std::sync::Arc;

use nodeflow_types::execution::ExecutionLogStatus;
use nodeflow_types::workflow::{NodeTemplate, WorkflowNodeMapping};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::logger::NodeCompletion;
use crate::audit::ExecutionLogger;
use crate::node::{error_type, NodeError, NodeOutcome, NodeHandlerRegistry};
use crate::repository::execution_log::ExecutionLogRepository;
use crate::workflow::merge::merge_config_json;
use crate::workflow::ExecutionContext;

pub struct NodeRunner<L: ExecutionLogRepository> {
    registry: Arc<NodeHandlerRegistry>,
    logger: Arc<ExecutionLogger<L>>,
}

impl<L: ExecutionLogRepository> Clone for NodeRunner<L> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            logger: Arc::clone(&self.logger),
        }
    }
}

impl<L: ExecutionLogRepository> NodeRunner<L> {
    pub fn new(registry: Arc<NodeHandlerRegistry>, logger: Arc<ExecutionLogger<L>>) -> Self {
        Self { registry, logger }
    }

    pub fn logger(&self) -> &Arc<ExecutionLogger<L>> {
        &self.logger
    }

    /// Run one node and merge its changes into `context`.
    ///
    /// Returns the merged config (`Value::Null` when it is not valid JSON) so
    /// the caller can read its routing block. Only a trigger failure is
    /// returned as an error; the log row is completed FAILED first.
    pub async fn run_step(
        &self,
        execution_id: Uuid,
        mapping: &WorkflowNodeMapping,
        template: &NodeTemplate,
        templates: &HashMap<String, NodeTemplate>,
        context: &mut ExecutionContext,
        step: u32,
    ) -> Result<Value, NodeError> {
        let merged = merge_config_json(&template.config_json, mapping.override_config.as_deref());
        let config = serde_json::from_str::<Value>(&merged).unwrap_or(Value::Null);

        context.set_current_node(&template.id);
        let handle = self
            .logger
            .start(execution_id, &template.id, &template.node_type, context)
            .await;

        if !template.is_active() {
            tracing::debug!(node = %template.node_name, step, "template inactive, skipping handler");
            let outcome = NodeOutcome::skipped("template is inactive");
            self.logger.complete(handle, completion(&outcome)).await;
            return Ok(config);
        }

        let outcome = match self.registry.get_handler(&template.node_type) {
            Some(handler) => {
                match handler.handle(context, &merged, templates, step).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let message = e.to_string();
                        let empty = serde_json::Map::new();
                        self.logger
                            .complete(
                                handle,
                                NodeCompletion {
                                    status: ExecutionLogStatus::Failed,
                                    changes: &empty,
                                    details: None,
                                    error_message: Some(&message),
                                    error_type: Some(error_type::TRIGGER_ERROR),
                                },
                            )
                            .await;
                        return Err(e);
                    }
                }
            }
            None => NodeOutcome::failed(
                format!("no handler for node type '{}'", template.node_type),
                error_type::UNSUPPORTED_NODE_TYPE,
            )
            .with_details(json!({"nodeType": template.node_type})),
        };

        tracing::debug!(
            execution_id = %execution_id,
            node = %template.node_name,
            node_type = %template.node_type,
            step,
            status = %outcome.status,
            changed_keys = outcome.changes.len(),
            "node finished"
        );

        self.logger.complete(handle, completion(&outcome)).await;
        context.merge(outcome.changes);
        Ok(config)
    }
}

fn completion(outcome: &NodeOutcome) -> NodeCompletion<'_> {
    NodeCompletion {
        status: outcome.status,
        changes: &outcome.changes,
        details: outcome.details.as_ref(),
        error_message: outcome.error.as_ref().map(|f| f.message.as_str()),
        error_type: outcome.error.as_ref().map(|f| f.error_type.as_str()),
    }
}
