//! HTTP request-type strategies.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::registry_key;

pub const DEFAULT_REQUEST_TYPE: &str = "REST";

/// A fully rendered outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

/// Executes a rendered request.
///
/// The result map is stored in the context as-is. An `"error"` key marks the
/// call as failed; implementations report transport problems that way
/// instead of returning an error.
pub trait HttpRequestStrategy: Send + Sync {
    fn request_type(&self) -> &str;

    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Map<String, Value>>;
}

#[derive(Default, Clone)]
pub struct HttpStrategyRegistry {
    strategies: HashMap<String, Arc<dyn HttpRequestStrategy>>,
}

impl HttpStrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under `request_type()`. A duplicate name is rejected.
    pub fn register(&mut self, strategy: Arc<dyn HttpRequestStrategy>) -> bool {
        let key = registry_key(strategy.request_type());
        if self.strategies.contains_key(&key) {
            tracing::warn!(request_type = %key, "duplicate HTTP strategy registration ignored");
            return false;
        }
        self.strategies.insert(key, strategy);
        true
    }

    pub fn get(&self, request_type: &str) -> Option<Arc<dyn HttpRequestStrategy>> {
        self.strategies.get(&registry_key(request_type)).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(|s| s.as_str()).collect()
    }
}
