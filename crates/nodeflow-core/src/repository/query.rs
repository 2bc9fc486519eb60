//! Named ("prebuilt") query collaborator.
//!
//! SQL construction lives outside the engine. A Query node only knows a query
//! by key and hands over evaluated parameters.

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("unknown prebuilt query '{0}'")]
    UnknownQuery(String),

    #[error("query '{key}' failed: {message}")]
    Failed { key: String, message: String },
}

pub trait PrebuiltQueryService: Send + Sync {
    fn has_query(&self, key: &str) -> bool;

    /// Run the query and return its row/projection as a map.
    fn execute<'a>(
        &'a self,
        key: &'a str,
        params: Map<String, Value>,
    ) -> BoxFuture<'a, Result<Map<String, Value>, QueryError>>;
}
