//! SendWhatsApp node: templated messages, batched per template.
//!
//! Each evaluated message looks like
//! `{"to": "+91...", "template": "fee_due", "language": "en", "params": {...}}`.
//! Messages sharing a template and language go out in one [`TemplateBatch`].

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use nodeflow_types::notification::{TemplateBatch, TemplateRecipient};
use nodeflow_types::workflow::{NodeTemplate, NodeType};
use serde_json::{Map, Value};

use super::messaging::{Channel, Messenger, OutgoingMessage};
use super::{NodeError, NodeHandler, NodeOutcome};
use crate::expression::{to_display_string, WorkflowEvaluator};
use crate::repository::notification::NotificationDispatcher;
use crate::service::DedupeService;
use crate::workflow::ExecutionContext;

pub struct SendWhatsAppHandler {
    messenger: Messenger,
}

impl SendWhatsAppHandler {
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

impl NodeHandler for SendWhatsAppHandler {
    fn node_type(&self) -> NodeType {
        NodeType::SendWhatsApp
    }

    fn handle<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config_json: &'a str,
        _templates: &'a HashMap<String, NodeTemplate>,
        _step: u32,
    ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>> {
        Box::pin(async move {
            Ok(self
                .messenger
                .run(Channel::WhatsApp, context, config_json)
                .await)
        })
    }
}

/// A batch plus the dedupe keys of the messages in it.
pub(crate) type KeyedBatch = (TemplateBatch, Vec<String>);

/// Group messages into per-template batches, in first-seen order.
///
/// Messages missing `to` or `template` are returned separately with the
/// reason they were rejected.
pub(crate) fn group_by_template(
    messages: Vec<OutgoingMessage>,
) -> (Vec<KeyedBatch>, Vec<(OutgoingMessage, String)>) {
    let mut batches: Vec<KeyedBatch> = Vec::new();
    let mut index: HashMap<(String, Option<String>), usize> = HashMap::new();
    let mut rejected = Vec::new();

    for message in messages {
        let field = |key: &str| {
            message
                .payload
                .get(key)
                .filter(|v| !v.is_null())
                .map(to_display_string)
                .filter(|s| !s.trim().is_empty())
        };
        let (Some(to), Some(template)) = (field("to"), field("template")) else {
            rejected.push((message, "message needs 'to' and 'template'".to_string()));
            continue;
        };
        let language = field("language");
        let params = match message.payload.get("params") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        let slot = *index
            .entry((template.clone(), language.clone()))
            .or_insert_with(|| {
                batches.push((
                    TemplateBatch {
                        template,
                        language,
                        recipients: Vec::new(),
                    },
                    Vec::new(),
                ));
                batches.len() - 1
            });
        let (batch, keys) = &mut batches[slot];
        batch.recipients.push(TemplateRecipient { to, params });
        if let Some(key) = message.dedupe_key {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    (batches, rejected)
}
