//! Prebuilt queries executed against the SQLite database.
//!
//! The catalog maps a query key to a SELECT statement and the ordered
//! parameter names bound to its `?` placeholders:
//!
//! ```toml
//! [queries.student_by_id]
//! sql = "SELECT name, grade FROM students WHERE id = ?"
//! params = ["id"]
//! ```
//!
//! Queries run on the read-only pool and return the first row as a map;
//! no row yields an empty map.

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use nodeflow_core::repository::query::{PrebuiltQueryService, QueryError};
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::pool::DatabasePool;

#[derive(Debug, Clone, Deserialize)]
pub struct PrebuiltQuery {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryCatalog {
    #[serde(default)]
    pub queries: HashMap<String, PrebuiltQuery>,
}

pub struct SqlitePrebuiltQueryService {
    pool: DatabasePool,
    catalog: QueryCatalog,
}

impl SqlitePrebuiltQueryService {
    pub fn new(pool: DatabasePool, catalog: QueryCatalog) -> Self {
        Self { pool, catalog }
    }

    async fn run(&self, key: &str, params: Map<String, Value>) -> Result<Map<String, Value>, QueryError> {
        let query = self
            .catalog
            .queries
            .get(key)
            .ok_or_else(|| QueryError::UnknownQuery(key.to_string()))?;

        let mut statement = sqlx::query(&query.sql);
        for name in &query.params {
            statement = bind_value(statement, params.get(name).unwrap_or(&Value::Null));
        }

        let row = statement
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| QueryError::Failed {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(query = key, found = row.is_some(), "prebuilt query executed");
        match row {
            Some(row) => row_to_map(&row).map_err(|e| QueryError::Failed {
                key: key.to_string(),
                message: e.to_string(),
            }),
            None => Ok(Map::new()),
        }
    }
}

impl PrebuiltQueryService for SqlitePrebuiltQueryService {
    fn has_query(&self, key: &str) -> bool {
        self.catalog.queries.contains_key(key)
    }

    fn execute<'a>(
        &'a self,
        key: &'a str,
        params: Map<String, Value>,
    ) -> BoxFuture<'a, Result<Map<String, Value>, QueryError>> {
        Box::pin(self.run(key, params))
    }
}

type Statement<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_value<'q>(statement: Statement<'q>, value: &Value) -> Statement<'q> {
    match value {
        Value::Null => statement.bind(None::<String>),
        Value::Bool(b) => statement.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => statement.bind(i),
            None => statement.bind(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => statement.bind(s.clone()),
        other => statement.bind(other.to_string()),
    }
}

fn row_to_map(row: &SqliteRow) -> Result<Map<String, Value>, sqlx::Error> {
    let mut map = Map::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
                "REAL" => Value::from(row.try_get::<f64, _>(index)?),
                "BLOB" => Value::Null,
                _ => Value::String(row.try_get::<String, _>(index)?),
            }
        };
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_pool;
    use serde_json::json;

    async fn service() -> (tempfile::TempDir, SqlitePrebuiltQueryService) {
        let (dir, pool) = test_pool().await;
        sqlx::query("CREATE TABLE students (id INTEGER PRIMARY KEY, name TEXT, fee REAL, guardian TEXT)")
            .execute(&pool.writer)
            .await
            .unwrap();
        sqlx::query("INSERT INTO students (id, name, fee, guardian) VALUES (7, 'Asha', 1200.5, NULL)")
            .execute(&pool.writer)
            .await
            .unwrap();

        let catalog: QueryCatalog = toml::from_str(
            r#"
[queries.student_by_id]
sql = "SELECT name, fee, guardian FROM students WHERE id = ?"
params = ["id"]
"#,
        )
        .unwrap();
        (dir, SqlitePrebuiltQueryService::new(pool, catalog))
    }

    #[tokio::test]
    async fn returns_first_row_as_map() {
        let (_dir, queries) = service().await;
        assert!(queries.has_query("student_by_id"));

        let mut params = Map::new();
        params.insert("id".to_string(), json!(7));
        let row = queries.execute("student_by_id", params).await.unwrap();
        assert_eq!(row["name"], json!("Asha"));
        assert_eq!(row["fee"], json!(1200.5));
        assert_eq!(row["guardian"], Value::Null);
    }

    #[tokio::test]
    async fn no_row_and_unknown_key() {
        let (_dir, queries) = service().await;
        let mut params = Map::new();
        params.insert("id".to_string(), json!(99));
        assert!(queries.execute("student_by_id", params).await.unwrap().is_empty());

        let unknown = queries.execute("nope", Map::new()).await;
        assert!(matches!(unknown, Err(QueryError::UnknownQuery(k)) if k == "nope"));
    }

    #[tokio::test]
    async fn queries_cannot_write() {
        let (_dir, pool) = test_pool().await;
        let catalog: QueryCatalog = toml::from_str(
            r#"
[queries.wipe]
sql = "DELETE FROM dedupe_records"
"#,
        )
        .unwrap();
        let queries = SqlitePrebuiltQueryService::new(pool, catalog);
        let result = queries.execute("wipe", Map::new()).await;
        assert!(matches!(result, Err(QueryError::Failed { .. })));
    }
}
