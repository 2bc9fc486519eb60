//! Action strategies ("data processors").
//!
//! An Action node names a strategy and hands it a config:
//!
//! ```json
//! {"dataProcessor": "ITERATOR",
//!  "config": {"on": "students",
//!             "forEach": {"dataProcessor": "QUERY",
//!                         "config": {"prebuiltKey": "fee_status", "params": {"id": "item.id"}}},
//!             "resultKey": "feeStatuses"}}
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use nodeflow_types::execution::ExecutionLogStatus;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::registry_key;
use crate::expression::WorkflowEvaluator;
use crate::node::query::{run_prebuilt, QueryConfig};
use crate::node::{as_items, error_type, NodeOutcome};
use crate::repository::query::PrebuiltQueryService;
use crate::workflow::context::ERROR;
use crate::workflow::ExecutionContext;

pub const ITERATOR: &str = "ITERATOR";
pub const QUERY: &str = "QUERY";

/// A strategy reference: which processor, with which config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    pub data_processor: String,
    #[serde(default)]
    pub config: Value,
}

pub trait ActionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Run against `context`. `registry` resolves nested strategies.
    fn execute<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config: &'a Value,
        registry: &'a ActionStrategyRegistry,
    ) -> BoxFuture<'a, NodeOutcome>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default, Clone)]
pub struct ActionStrategyRegistry {
    strategies: HashMap<String, Arc<dyn ActionStrategy>>,
}

impl ActionStrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `ITERATOR`, plus `QUERY` when a query service is given.
    pub fn with_builtins(
        evaluator: Arc<WorkflowEvaluator>,
        queries: Option<Arc<dyn PrebuiltQueryService>>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(IteratorStrategy::new(Arc::clone(&evaluator))));
        if let Some(queries) = queries {
            registry.register(Arc::new(QueryStrategy::new(queries, evaluator)));
        }
        registry
    }

    /// Register under `name()`. A duplicate name is rejected.
    pub fn register(&mut self, strategy: Arc<dyn ActionStrategy>) -> bool {
        let key = registry_key(strategy.name());
        if self.strategies.contains_key(&key) {
            tracing::warn!(strategy = %key, "duplicate action strategy registration ignored");
            return false;
        }
        self.strategies.insert(key, strategy);
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionStrategy>> {
        self.strategies.get(&registry_key(name)).cloned()
    }

    /// Resolve `spec` and run it, failing the outcome for an unknown name.
    pub async fn dispatch(&self, spec: &ActionSpec, context: &ExecutionContext) -> NodeOutcome {
        match self.get(&spec.data_processor) {
            Some(strategy) => strategy.execute(context, &spec.config, self).await,
            None => NodeOutcome::failed(
                format!("unknown data processor '{}'", spec.data_processor),
                error_type::ACTION_ERROR,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// ITERATOR
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IteratorConfig {
    on: String,
    for_each: ActionSpec,
    #[serde(default)]
    result_key: Option<String>,
}

/// Runs a nested strategy once per list item, stopping at the first failure.
pub struct IteratorStrategy {
    evaluator: Arc<WorkflowEvaluator>,
}

impl IteratorStrategy {
    pub fn new(evaluator: Arc<WorkflowEvaluator>) -> Self {
        Self { evaluator }
    }

    async fn run(
        &self,
        context: &ExecutionContext,
        config: &Value,
        registry: &ActionStrategyRegistry,
    ) -> NodeOutcome {
        let config: IteratorConfig = match serde_json::from_value(config.clone()) {
            Ok(c) => c,
            Err(e) => {
                return NodeOutcome::failed(
                    format!("invalid ITERATOR config: {e}"),
                    error_type::INVALID_CONFIG,
                )
            }
        };
        let items = match self.evaluator.evaluate_value(&config.on, context.as_map()) {
            Ok(v) => as_items(v),
            Err(e) => {
                return NodeOutcome::failed(
                    format!("ITERATOR 'on' failed: {e}"),
                    error_type::EXPRESSION_ERROR,
                )
            }
        };
        let Some(nested) = registry.get(&config.for_each.data_processor) else {
            return NodeOutcome::failed(
                format!("unknown data processor '{}'", config.for_each.data_processor),
                error_type::ACTION_ERROR,
            );
        };

        let total = items.len();
        let mut local = context.clone();
        let mut merged = Map::new();
        let mut results = Vec::with_capacity(total);
        let mut succeeded = 0usize;
        let mut failure: Option<String> = None;

        for item in items {
            let scoped = local.with_item(item);
            let outcome = nested.execute(&scoped, &config.for_each.config, registry).await;
            if outcome.is_failure() {
                let message = outcome
                    .error
                    .map(|f| f.message)
                    .unwrap_or_else(|| "nested action failed".to_string());
                failure = Some(message);
                break;
            }
            succeeded += 1;
            results.push(Value::Object(outcome.changes.clone()));
            local.merge(outcome.changes.clone());
            merged.extend(outcome.changes);
        }

        let failed = usize::from(failure.is_some());
        let processed = succeeded + failed;
        let details = json!({
            "total": total,
            "processed": processed,
            "succeeded": succeeded,
            "failed": failed,
            "aborted": failure.is_some() && processed < total,
        });

        let mut changes = match &config.result_key {
            Some(key) => {
                let mut m = Map::new();
                m.insert(key.clone(), Value::Array(results));
                m
            }
            None => merged,
        };

        let Some(message) = failure else {
            return NodeOutcome::success(changes).with_details(details);
        };

        tracing::debug!(total, succeeded, error = %message, "ITERATOR aborted on item failure");
        changes.insert(ERROR.to_string(), Value::String(message.clone()));
        let status = if succeeded > 0 {
            ExecutionLogStatus::PartialSuccess
        } else {
            ExecutionLogStatus::Failed
        };
        NodeOutcome {
            changes,
            status,
            details: Some(details),
            error: Some(crate::node::NodeFailure {
                message,
                error_type: error_type::ACTION_ERROR.to_string(),
            }),
        }
    }
}

impl ActionStrategy for IteratorStrategy {
    fn name(&self) -> &str {
        ITERATOR
    }

    fn execute<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config: &'a Value,
        registry: &'a ActionStrategyRegistry,
    ) -> BoxFuture<'a, NodeOutcome> {
        Box::pin(self.run(context, config, registry))
    }
}

// ---------------------------------------------------------------------------
// QUERY
// ---------------------------------------------------------------------------

/// Runs a prebuilt query, exactly like the Query node.
pub struct QueryStrategy {
    queries: Arc<dyn PrebuiltQueryService>,
    evaluator: Arc<WorkflowEvaluator>,
}

impl QueryStrategy {
    pub fn new(queries: Arc<dyn PrebuiltQueryService>, evaluator: Arc<WorkflowEvaluator>) -> Self {
        Self { queries, evaluator }
    }
}

impl ActionStrategy for QueryStrategy {
    fn name(&self) -> &str {
        QUERY
    }

    fn execute<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config: &'a Value,
        _registry: &'a ActionStrategyRegistry,
    ) -> BoxFuture<'a, NodeOutcome> {
        Box::pin(async move {
            match serde_json::from_value::<QueryConfig>(config.clone()) {
                Ok(query) => {
                    run_prebuilt(self.queries.as_ref(), &self.evaluator, context, &query).await
                }
                Err(e) => NodeOutcome::failed(
                    format!("invalid QUERY config: {e}"),
                    error_type::INVALID_CONFIG,
                ),
            }
        })
    }
}
