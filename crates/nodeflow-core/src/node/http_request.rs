//! HttpRequest node: call out through a request-type strategy.
//!
//! ```json
//! {"resultKey": "payment",
//!  "config": {"url": "https://pay.test/status/{{ paymentId }}", "method": "GET",
//!             "requestType": "REST", "condition": "paymentId != null",
//!             "headers": {"X-Institute": "{{ instituteId }}"}}}
//! ```
//!
//! A false `condition` skips the node without touching the network.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use nodeflow_types::workflow::{NodeTemplate, NodeType};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{error_type, parse_config, NodeError, NodeFailure, NodeHandler, NodeOutcome};
use crate::expression::{to_display_string, WorkflowEvaluator};
use crate::strategy::http::{DEFAULT_REQUEST_TYPE, HttpRequest, HttpStrategyRegistry};
use crate::workflow::context::ERROR;
use crate::workflow::ExecutionContext;

pub const DEFAULT_RESULT_KEY: &str = "httpResponse";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpNodeConfig {
    #[serde(default)]
    result_key: Option<String>,
    config: RequestConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestConfig {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    request_type: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
}

pub struct HttpRequestHandler {
    strategies: Arc<HttpStrategyRegistry>,
    evaluator: Arc<WorkflowEvaluator>,
}

impl HttpRequestHandler {
    pub fn new(strategies: Arc<HttpStrategyRegistry>, evaluator: Arc<WorkflowEvaluator>) -> Self {
        Self {
            strategies,
            evaluator,
        }
    }

    async fn run(&self, context: &ExecutionContext, config_json: &str) -> NodeOutcome {
        let config: HttpNodeConfig = match parse_config(config_json) {
            Ok(c) => c,
            Err(message) => return NodeOutcome::failed(message, error_type::INVALID_CONFIG),
        };
        let request_config = config.config;
        let vars = context.as_map();

        if let Some(condition) = request_config.condition.as_deref().filter(|c| !c.trim().is_empty()) {
            match self.evaluator.evaluate_bool(condition, vars) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(condition, "HTTP condition false, skipping request");
                    return NodeOutcome::skipped("condition evaluated to false");
                }
                Err(e) => {
                    return NodeOutcome::failed(
                        format!("HTTP condition failed: {e}"),
                        error_type::EXPRESSION_ERROR,
                    )
                }
            }
        }

        let request_type = request_config
            .request_type
            .clone()
            .unwrap_or_else(|| DEFAULT_REQUEST_TYPE.to_string());
        let Some(strategy) = self.strategies.get(&request_type) else {
            return NodeOutcome::failed(
                format!("unsupported request type '{request_type}'"),
                error_type::HTTP_ERROR,
            );
        };

        let request = match self.render(request_config, vars) {
            Ok(r) => r,
            Err(message) => return NodeOutcome::failed(message, error_type::EXPRESSION_ERROR),
        };
        let details = json!({
            "method": request.method,
            "requestType": request_type.to_uppercase(),
        });

        let result = strategy.execute(request).await;
        let result_key = config
            .result_key
            .unwrap_or_else(|| DEFAULT_RESULT_KEY.to_string());

        let failure = result.get(ERROR).map(to_display_string);
        let mut changes = Map::new();
        changes.insert(result_key, Value::Object(result));

        match failure {
            None => NodeOutcome::success(changes).with_details(details),
            Some(message) => {
                changes.insert(ERROR.to_string(), Value::String(message.clone()));
                NodeOutcome {
                    changes,
                    status: nodeflow_types::execution::ExecutionLogStatus::Failed,
                    details: Some(details),
                    error: Some(NodeFailure {
                        message,
                        error_type: error_type::HTTP_ERROR.to_string(),
                    }),
                }
            }
        }
    }

    /// Interpolate `{{ }}` in url, header values and a string body.
    fn render(&self, config: RequestConfig, vars: &Map<String, Value>) -> Result<HttpRequest, String> {
        let render = |s: &str| {
            self.evaluator
                .render(s, vars)
                .map_err(|e| format!("template '{s}' failed: {e}"))
        };

        let url = render(config.url.as_str())?;
        let mut headers = BTreeMap::new();
        for (name, value) in &config.headers {
            headers.insert(name.clone(), render(value.as_str())?);
        }
        let body = match config.body {
            Some(Value::String(s)) => Some(Value::String(render(s.as_str())?)),
            other => other,
        };

        Ok(HttpRequest {
            method: config
                .method
                .map(|m| m.trim().to_uppercase())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "GET".to_string()),
            url,
            headers,
            body,
        })
    }
}

impl NodeHandler for HttpRequestHandler {
    fn node_type(&self) -> NodeType {
        NodeType::HttpRequest
    }

    fn handle<'a>(
        &'a self,
        context: &'a ExecutionContext,
        config_json: &'a str,
        _templates: &'a HashMap<String, NodeTemplate>,
        _step: u32,
    ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>> {
        Box::pin(async move { Ok(self.run(context, config_json).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingHttpStrategy;
    use nodeflow_types::execution::ExecutionLogStatus;

    fn setup(response: Value) -> (HttpRequestHandler, Arc<RecordingHttpStrategy>) {
        let strategy = Arc::new(RecordingHttpStrategy::new("REST", response));
        let mut registry = HttpStrategyRegistry::new();
        registry.register(strategy.clone());
        (
            HttpRequestHandler::new(Arc::new(registry), Arc::new(WorkflowEvaluator::new())),
            strategy,
        )
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::from(
            json!({"paymentId": "p-9", "instituteId": "inst-1", "paid": false})
                .as_object()
                .cloned()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn false_condition_skips_without_calling_strategy() {
        let (handler, strategy) = setup(json!({"status": 200}));
        let config = json!({"config": {"url": "https://x.test", "condition": "paid"}});
        let outcome = handler.run(&ctx(), &config.to_string()).await;
        assert_eq!(outcome.status, ExecutionLogStatus::Skipped);
        assert!(outcome.changes.is_empty());
        assert!(strategy.requests().is_empty());
    }

    #[tokio::test]
    async fn renders_request_and_stores_result() {
        let (handler, strategy) = setup(json!({"status": 200, "body": {"state": "SETTLED"}}));
        let config = json!({
            "resultKey": "payment",
            "config": {
                "url": "https://pay.test/status/{{ paymentId }}",
                "method": "post",
                "condition": "paymentId != null",
                "headers": {"X-Institute": "{{instituteId}}"},
                "body": "{\"id\": \"{{ paymentId }}\"}"
            }
        });
        let outcome = handler.run(&ctx(), &config.to_string()).await;
        assert_eq!(outcome.status, ExecutionLogStatus::Success);
        assert_eq!(outcome.changes["payment"]["body"]["state"], json!("SETTLED"));

        let sent = strategy.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, "POST");
        assert_eq!(sent[0].url, "https://pay.test/status/p-9");
        assert_eq!(sent[0].headers["X-Institute"], "inst-1");
        assert_eq!(sent[0].body, Some(json!(r#"{"id": "p-9"}"#)));
    }

    #[tokio::test]
    async fn default_result_key_and_error_classification() {
        let (handler, _) = setup(json!({"error": "connection refused"}));
        let config = json!({"config": {"url": "https://down.test"}});
        let outcome = handler.run(&ctx(), &config.to_string()).await;
        assert_eq!(outcome.status, ExecutionLogStatus::Failed);
        assert_eq!(outcome.changes["httpResponse"]["error"], json!("connection refused"));
        assert_eq!(outcome.changes["error"], json!("connection refused"));
        assert_eq!(outcome.error.unwrap().error_type, error_type::HTTP_ERROR);
    }

    #[tokio::test]
    async fn unknown_request_type_fails() {
        let (handler, _) = setup(json!({}));
        let config = json!({"config": {"url": "https://x.test", "requestType": "SOAP"}});
        let outcome = handler.run(&ctx(), &config.to_string()).await;
        assert!(outcome.is_failure());
        assert!(outcome.changes["error"].as_str().unwrap().contains("SOAP"));
    }
}
