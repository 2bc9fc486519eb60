//! The execution context threaded through a workflow run.
//!
//! `ExecutionContext` is a schema-less key/value document owned by the run.
//! Handlers only read it and return a diff; the engine is the single writer
//! and applies diffs with [`ExecutionContext::merge`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Reserved keys
// ---------------------------------------------------------------------------

pub const EXECUTION_ID: &str = "executionId";
pub const CURRENT_NODE_ID: &str = "currentNodeId";
pub const INSTITUTE_ID: &str = "instituteId";
pub const WORKFLOW_ID: &str = "workflowId";
/// Loop variable bound during per-item iteration.
pub const ITEM: &str = "item";

/// Key a non-trigger handler uses to surface its failure downstream.
pub const ERROR: &str = "error";

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    values: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a run context from a trigger payload plus the reserved run keys.
    ///
    /// A non-object payload is kept under `payload`.
    pub fn for_run(
        execution_id: Uuid,
        workflow_id: &str,
        institute_id: &str,
        payload: Value,
    ) -> Self {
        let mut values = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other);
                map
            }
        };
        values.insert(EXECUTION_ID.to_string(), Value::String(execution_id.to_string()));
        values.insert(WORKFLOW_ID.to_string(), Value::String(workflow_id.to_string()));
        values.insert(INSTITUTE_ID.to_string(), Value::String(institute_id.to_string()));
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Apply a handler's changes. Keys in `changes` overwrite existing keys.
    pub fn merge(&mut self, changes: Map<String, Value>) {
        for (key, value) in changes {
            self.values.insert(key, value);
        }
    }

    /// A copy of this context with `item` bound to `item`.
    pub fn with_item(&self, item: Value) -> Self {
        let mut scoped = self.clone();
        scoped.insert(ITEM, item);
        scoped
    }

    pub fn set_current_node(&mut self, node_template_id: &str) {
        self.insert(CURRENT_NODE_ID, Value::String(node_template_id.to_string()));
    }

    /// The document the expression evaluator reads.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for ExecutionContext {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// Build a `{"error": message}` changes map.
pub fn error_changes(message: impl Into<String>) -> Map<String, Value> {
    let mut changes = Map::new();
    changes.insert(ERROR.to_string(), Value::String(message.into()));
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn for_run_seeds_reserved_keys() {
        let id = Uuid::now_v7();
        let ctx = ExecutionContext::for_run(id, "wf-1", "inst-9", json!({"amount": 10}));
        assert_eq!(ctx.get("amount"), Some(&json!(10)));
        assert_eq!(ctx.get(EXECUTION_ID), Some(&json!(id.to_string())));
        assert_eq!(ctx.get(WORKFLOW_ID), Some(&json!("wf-1")));
        assert_eq!(ctx.get(INSTITUTE_ID), Some(&json!("inst-9")));
    }

    #[test]
    fn non_object_payload_is_wrapped() {
        let ctx = ExecutionContext::for_run(Uuid::now_v7(), "wf", "inst", json!([1, 2]));
        assert_eq!(ctx.get("payload"), Some(&json!([1, 2])));
    }

    #[test]
    fn merge_overwrites_and_adds() {
        let mut ctx = ExecutionContext::from(
            json!({"a": 1, "b": 2}).as_object().cloned().unwrap(),
        );
        ctx.merge(json!({"b": 3, "c": 4}).as_object().cloned().unwrap());
        assert_eq!(ctx.as_map(), json!({"a": 1, "b": 3, "c": 4}).as_object().unwrap());
    }

    #[test]
    fn with_item_does_not_touch_original() {
        let ctx = ExecutionContext::new();
        let scoped = ctx.with_item(json!({"phone": "1"}));
        assert!(ctx.get(ITEM).is_none());
        assert_eq!(scoped.get(ITEM), Some(&json!({"phone": "1"})));
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("x", json!(1));
        assert_eq!(serde_json::to_string(&ctx).unwrap(), r#"{"x":1}"#);
    }
}
