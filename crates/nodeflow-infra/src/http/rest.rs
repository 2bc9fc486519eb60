//! `REST` request strategy backed by `reqwest`.
//!
//! The result map always carries `status` and `body` when a response came
//! back. JSON bodies are decoded; anything else is kept as text. Transport
//! failures and non-2xx statuses add an `error` entry.

use std::time::Duration;

use futures_util::future::BoxFuture;
use nodeflow_core::strategy::http::{HttpRequest, HttpRequestStrategy, DEFAULT_REQUEST_TYPE};
use nodeflow_types::config::HttpConfig;
use serde_json::{Map, Value};

pub struct RestHttpStrategy {
    client: reqwest::Client,
}

impl RestHttpStrategy {
    pub fn new(config: &HttpConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }

    async fn send(&self, request: HttpRequest) -> Map<String, Value> {
        let mut result = Map::new();

        let method: reqwest::Method = match request.method.parse() {
            Ok(m) => m,
            Err(_) => {
                result.insert(
                    "error".to_string(),
                    Value::String(format!("invalid HTTP method: {}", request.method)),
                );
                return result;
            }
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(Value::String(text)) => builder.body(text),
            Some(Value::Null) | None => builder,
            Some(json) => builder.json(&json),
        };

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "HTTP request failed");
                result.insert(
                    "error".to_string(),
                    Value::String(format!("HTTP request to '{}' failed: {e}", request.url)),
                );
                return result;
            }
        };

        let status = response.status();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    Value::String(v.to_str().unwrap_or("<binary>").to_string()),
                )
            })
            .collect();

        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                result.insert("status".to_string(), Value::from(status.as_u16()));
                result.insert(
                    "error".to_string(),
                    Value::String(format!("failed to read HTTP response body: {e}")),
                );
                return result;
            }
        };
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        tracing::debug!(url = %request.url, status = status.as_u16(), "HTTP request completed");

        result.insert("status".to_string(), Value::from(status.as_u16()));
        result.insert("headers".to_string(), Value::Object(headers));
        result.insert("body".to_string(), body);
        if !status.is_success() {
            result.insert(
                "error".to_string(),
                Value::String(format!("HTTP {} from {}", status.as_u16(), request.url)),
            );
        }
        result
    }
}

impl HttpRequestStrategy for RestHttpStrategy {
    fn request_type(&self) -> &str {
        DEFAULT_REQUEST_TYPE
    }

    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Map<String, Value>> {
        Box::pin(self.send(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy() -> RestHttpStrategy {
        RestHttpStrategy::new(&HttpConfig::default())
    }

    fn request(method: &str, url: String) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            url,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn get_decodes_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/p-9"))
            .and(header("X-Institute", "inst-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "SETTLED"})))
            .mount(&server)
            .await;

        let mut req = request("GET", format!("{}/status/p-9", server.uri()));
        req.headers.insert("X-Institute".to_string(), "inst-1".to_string());
        let result = strategy().execute(req).await;

        assert_eq!(result["status"], json!(200));
        assert_eq!(result["body"]["state"], json!("SETTLED"));
        assert!(result.get("error").is_none());
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(body_json(json!({"amount": 118})))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;

        let mut req = request("POST", format!("{}/submit", server.uri()));
        req.body = Some(json!({"amount": 118}));
        let result = strategy().execute(req).await;

        assert_eq!(result["status"], json!(201));
        assert_eq!(result["body"], json!("created"));
    }

    #[tokio::test]
    async fn error_status_is_flagged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fail"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = strategy()
            .execute(request("GET", format!("{}/fail", server.uri())))
            .await;
        assert_eq!(result["status"], json!(503));
        assert!(result["error"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn transport_failure_and_bad_method_become_error_entries() {
        let unreachable = strategy()
            .execute(request("GET", "http://127.0.0.1:1/nowhere".to_string()))
            .await;
        assert!(unreachable.get("status").is_none());
        assert!(unreachable["error"].as_str().unwrap().contains("failed"));

        let bad = strategy()
            .execute(request("NOT A METHOD", "http://127.0.0.1:1".to_string()))
            .await;
        assert!(bad["error"].as_str().unwrap().contains("invalid HTTP method"));
    }

    #[test]
    fn registers_as_rest() {
        assert_eq!(strategy().request_type(), "REST");
    }
}
