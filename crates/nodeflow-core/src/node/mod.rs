//! Node handlers: one per [`NodeType`].
//!
//! A handler reads the execution context and its (already merged) JSON config
//! and returns a [`NodeOutcome`] holding only the keys it wants to change.
//! Handlers never mutate the context; the engine applies the changes.
//!
//! Config parsing and evaluation failures are reported through the outcome
//! (`{"error": ...}` plus FAILED status) so the run continues. The trigger
//! handler is the one exception: it returns [`NodeError`] and aborts the run.

pub mod action;
pub mod combot;
pub mod http_request;
mod messaging;
pub mod query;
pub mod registry;
pub mod send_email;
pub mod send_whatsapp;
pub mod transform;
pub mod trigger;

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use nodeflow_types::execution::ExecutionLogStatus;
use nodeflow_types::workflow::{NodeTemplate, NodeType};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::workflow::context::{error_changes, ExecutionContext};

pub use registry::NodeHandlerRegistry;

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Errors a handler may raise instead of reporting through its outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NodeError {
    #[error("trigger failed: {0}")]
    Trigger(String),
}

/// Classified failure recorded on the node's log row.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    pub message: String,
    pub error_type: String,
}

/// Result of one handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    /// Incremental changes to merge into the context.
    pub changes: Map<String, Value>,
    /// Terminal log status to record.
    pub status: ExecutionLogStatus,
    /// Extra audit information (counts, skip reasons).
    pub details: Option<Value>,
    pub error: Option<NodeFailure>,
}

impl NodeOutcome {
    pub fn success(changes: Map<String, Value>) -> Self {
        Self {
            changes,
            status: ExecutionLogStatus::Success,
            details: None,
            error: None,
        }
    }

    /// A failure surfaced downstream as `{"error": message}`.
    pub fn failed(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            changes: error_changes(message.clone()),
            status: ExecutionLogStatus::Failed,
            details: None,
            error: Some(NodeFailure {
                message,
                error_type: error_type.into(),
            }),
        }
    }

    /// Nothing ran; `reason` ends up in the log details.
    pub fn skipped(reason: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert("reason".to_string(), Value::String(reason.into()));
        Self {
            changes: Map::new(),
            status: ExecutionLogStatus::Skipped,
            details: Some(Value::Object(details)),
            error: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status == ExecutionLogStatus::Failed
    }
}

/// Error types recorded on FAILED log rows.
pub mod error_type {
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
    pub const EXPRESSION_ERROR: &str = "EXPRESSION_ERROR";
    pub const QUERY_ERROR: &str = "QUERY_ERROR";
    pub const ACTION_ERROR: &str = "ACTION_ERROR";
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    pub const NOTIFICATION_ERROR: &str = "NOTIFICATION_ERROR";
    pub const TRIGGER_ERROR: &str = "TRIGGER_ERROR";
    pub const UNSUPPORTED_NODE_TYPE: &str = "UNSUPPORTED_NODE_TYPE";
}

// ---------------------------------------------------------------------------
// NodeHandler trait
// ---------------------------------------------------------------------------

/// Executes one kind of node.
///
/// Object-safe so the registry can hold `Arc<dyn NodeHandler>`.
pub trait NodeHandler: Send + Sync {
    /// The kind this handler is registered under.
    fn node_type(&self) -> NodeType;

    /// Whether this handler can run nodes of `node_type`.
    fn supports(&self, node_type: NodeType) -> bool {
        node_type == self.node_type()
    }

    /// Run the node. `templates` holds every template of the workflow by id;
    /// `step` is the 1-based visit number within the run.
    fn handle<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config_json: &'a str,
        templates: &'a HashMap<String, NodeTemplate>,
        step: u32,
    ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>>;
}

/// Parse a node config, describing the failure as a message.
pub(crate) fn parse_config<T: DeserializeOwned>(config_json: &str) -> Result<T, String> {
    serde_json::from_str(config_json).map_err(|e| format!("invalid node config: {e}"))
}

/// Treat a value as a list: null is empty, a scalar or object is one item.
pub(crate) fn as_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
