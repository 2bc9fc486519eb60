//! Combot node: same message shape and batching as SendWhatsApp, routed to
//! the Combot channel.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use nodeflow_types::workflow::{NodeTemplate, NodeType};

use super::messaging::{Channel, Messenger};
use super::{NodeError, NodeHandler, NodeOutcome};
use crate::expression::WorkflowEvaluator;
use crate::repository::notification::NotificationDispatcher;
use crate::service::DedupeService;
use crate::workflow::ExecutionContext;

pub struct CombotHandler {
    messenger: Messenger,
}

impl CombotHandler {
    pub fn new(
        dispatcher: Arc<dyn NotificationDispatcher>,
        evaluator: Arc<WorkflowEvaluator>,
        dedupe: Option<DedupeService>,
    ) -> Self {
        Self {
            messenger: Messenger {
                evaluator,
                dispatcher,
                dedupe,
            },
        }
    }
}

impl NodeHandler for CombotHandler {
    fn node_type(&self) -> NodeType {
        NodeType::Combot
    }

    fn handle<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config_json: &'a str,
        _templates: &'a HashMap<String, NodeTemplate>,
        _step: u32,
    ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>> {
        Box::pin(async move { Ok(self.messenger.run(Channel::Combot, context, config_json).await) })
    }
}
