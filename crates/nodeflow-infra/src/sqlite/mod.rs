//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools. Timestamps are stored as RFC 3339 text and
//! UUIDs as their hyphenated string form.

pub mod dedupe;
pub mod execution_log;
pub mod pool;
pub mod query;
pub mod workflow;

use chrono::{DateTime, Utc};
use nodeflow_types::error::RepositoryError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

fn query_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid uuid: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Decode a SCREAMING_SNAKE_CASE enum column through its serde form.
fn parse_enum<T: DeserializeOwned>(s: &str, what: &str) -> Result<T, RepositoryError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| RepositoryError::Query(format!("invalid {what}: {s}")))
}

fn enum_to_str<T: Serialize>(value: &T) -> Result<String, RepositoryError> {
    match serde_json::to_value(value).map_err(query_err)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(RepositoryError::Query(format!("expected string enum, got {other}"))),
    }
}

#[cfg(test)]
pub(crate) async fn test_pool() -> (tempfile::TempDir, pool::DatabasePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool::DatabasePool::new(&pool::database_url(dir.path()))
        .await
        .unwrap();
    (dir, pool)
}
