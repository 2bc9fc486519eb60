//! Query node: run a prebuilt query and merge its row into the context.
//!
//! ```json
//! {"prebuiltKey": "student_by_id", "params": {"id": "studentId"}, "resultKey": "student"}
//! ```
//!
//! String params are expressions; other JSON values are passed through as
//! literals.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use nodeflow_types::workflow::{NodeTemplate, NodeType};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{error_type, parse_config, NodeError, NodeHandler, NodeOutcome};
use crate::expression::WorkflowEvaluator;
use crate::repository::query::PrebuiltQueryService;
use crate::workflow::ExecutionContext;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    pub prebuilt_key: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub result_key: Option<String>,
}

/// Shared by the Query node and the `QUERY` action strategy.
pub(crate) async fn run_prebuilt(
    queries: &dyn PrebuiltQueryService,
    evaluator: &WorkflowEvaluator,
    context: &ExecutionContext,
    config: &QueryConfig,
) -> NodeOutcome {
    if !queries.has_query(&config.prebuilt_key) {
        return NodeOutcome::failed(
            format!("unknown prebuilt query '{}'", config.prebuilt_key),
            error_type::QUERY_ERROR,
        );
    }

    let mut params = Map::new();
    for (name, raw) in &config.params {
        let value = match raw {
            Value::String(expr) => match evaluator.evaluate_value(expr, context.as_map()) {
                Ok(v) => v,
                Err(e) => {
                    return NodeOutcome::failed(
                        format!("param '{name}' failed: {e}"),
                        error_type::EXPRESSION_ERROR,
                    )
                }
            },
            literal => literal.clone(),
        };
        params.insert(name.clone(), value);
    }

    match queries.execute(&config.prebuilt_key, params).await {
        Ok(row) => {
            let changes = match &config.result_key {
                Some(key) => {
                    let mut nested = Map::new();
                    nested.insert(key.clone(), Value::Object(row));
                    nested
                }
                None => row,
            };
            NodeOutcome::success(changes)
        }
        Err(e) => NodeOutcome::failed(e.to_string(), error_type::QUERY_ERROR),
    }
}

pub struct QueryHandler {
    queries: Arc<dyn PrebuiltQueryService>,
    evaluator: Arc<WorkflowEvaluator>,
}

impl QueryHandler {
    pub fn new(queries: Arc<dyn PrebuiltQueryService>, evaluator: Arc<WorkflowEvaluator>) -> Self {
        Self { queries, evaluator }
    }
}

impl NodeHandler for QueryHandler {
    fn node_type(&self) -> NodeType {
        NodeType::Query
    }

    fn handle<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config_json: &'a str,
        _templates: &'a HashMap<String, NodeTemplate>,
        _step: u32,
    ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>> {
        Box::pin(async move {
            let config: QueryConfig = match parse_config(config_json) {
                Ok(c) => c,
                Err(message) => return Ok(NodeOutcome::failed(message, error_type::INVALID_CONFIG)),
            };
            Ok(run_prebuilt(self.queries.as_ref(), &self.evaluator, context, &config).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticQueryService;
    use nodeflow_types::execution::ExecutionLogStatus;
    use serde_json::json;

    fn handler(queries: Arc<StaticQueryService>) -> QueryHandler {
        QueryHandler::new(queries, Arc::new(WorkflowEvaluator::new()))
    }

    fn context() -> ExecutionContext {
        ExecutionContext::from(json!({"studentId": 7}).as_object().cloned().unwrap())
    }

    async fn run(handler: &QueryHandler, config: Value) -> NodeOutcome {
        handler
            .handle(&context(), &config.to_string(), &HashMap::new(), 1)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn evaluates_params_and_merges_row() {
        let queries = Arc::new(StaticQueryService::with(
            "student_by_id",
            json!({"name": "Asha", "grade": 5}),
        ));
        let h = handler(queries.clone());
        let outcome = run(
            &h,
            json!({"prebuiltKey": "student_by_id", "params": {"id": "studentId", "limit": 1}}),
        )
        .await;

        assert_eq!(outcome.status, ExecutionLogStatus::Success);
        assert_eq!(outcome.changes["name"], json!("Asha"));
        let calls = queries.calls();
        assert_eq!(calls[0].1, *json!({"id": 7, "limit": 1}).as_object().unwrap());
    }

    #[tokio::test]
    async fn nests_row_under_result_key() {
        let queries = Arc::new(StaticQueryService::with("q", json!({"n": 1})));
        let outcome = run(&handler(queries), json!({"prebuiltKey": "q", "resultKey": "stats"})).await;
        assert_eq!(outcome.changes, *json!({"stats": {"n": 1}}).as_object().unwrap());
    }

    #[tokio::test]
    async fn unknown_key_and_bad_config_fail_softly() {
        let queries = Arc::new(StaticQueryService::default());
        let h = handler(queries);
        let outcome = run(&h, json!({"prebuiltKey": "nope"})).await;
        assert!(outcome.is_failure());
        assert!(outcome.changes["error"].as_str().unwrap().contains("nope"));

        let outcome = h
            .handle(&context(), "{broken", &HashMap::new(), 1)
            .await
            .unwrap();
        assert_eq!(outcome.error.unwrap().error_type, error_type::INVALID_CONFIG);
    }

    #[tokio::test]
    async fn query_failure_is_reported() {
        let queries = Arc::new(StaticQueryService::failing("q"));
        let outcome = run(&handler(queries), json!({"prebuiltKey": "q"})).await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.error.unwrap().error_type, error_type::QUERY_ERROR);
    }
}
