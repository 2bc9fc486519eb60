//! SendEmail node: one email request per recipient.
//!
//! Each evaluated message looks like
//! `{"to": "a@x.test" | ["a@x.test", ...], "subject": ..., "body": ..., "template": ..., "params": {...}}`.
//! See [`super::messaging`] for the iteration config.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use nodeflow_types::notification::EmailRequest;
use nodeflow_types::workflow::{NodeTemplate, NodeType};
use serde_json::{Map, Value};

use super::messaging::{Channel, Messenger};
use super::{NodeError, NodeHandler, NodeOutcome};
use crate::expression::{to_display_string, WorkflowEvaluator};
use crate::repository::notification::NotificationDispatcher;
use crate::service::DedupeService;
use crate::workflow::ExecutionContext;

pub struct SendEmailHandler {
    messenger: Messenger,
}

impl SendEmailHandler {
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

impl NodeHandler for SendEmailHandler {
    fn node_type(&self) -> NodeType {
        NodeType::SendEmail
    }

    fn handle<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config_json: &'a str,
        _templates: &'a HashMap<String, NodeTemplate>,
        _step: u32,
    ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>> {
        Box::pin(async move { Ok(self.messenger.run(Channel::Email, context, config_json).await) })
    }
}

/// Split one message into per-recipient requests.
pub(crate) fn to_email_requests(message: &Map<String, Value>) -> Result<Vec<EmailRequest>, String> {
    let recipients: Vec<String> = match message.get("to") {
        Some(Value::Array(list)) => list
            .iter()
            .map(to_display_string)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![to_display_string(other)],
    };
    if recipients.iter().all(|r| r.trim().is_empty()) {
        return Err("email message has no recipient".to_string());
    }

    let text = |key: &str| {
        message
            .get(key)
            .filter(|v| !v.is_null())
            .map(to_display_string)
    };
    let params = match message.get("params") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    if text("body").is_none() && text("template").is_none() {
        return Err("email message needs a body or a template".to_string());
    }

    Ok(recipients
        .into_iter()
        .filter(|r| !r.trim().is_empty())
        .map(|to| EmailRequest {
            to,
            subject: text("subject"),
            body: text("body"),
            template: text("template"),
            params: params.clone(),
        })
        .collect())
}
