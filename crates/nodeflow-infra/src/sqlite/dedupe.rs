//! SQLite dedupe record store.

use futures_util::future::BoxFuture;
use nodeflow_core::repository::dedupe::DedupeRepository;
use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::DedupeRecord;

use super::pool::DatabasePool;
use super::{format_datetime, query_err};

pub struct SqliteDedupeRepository {
    pool: DatabasePool,
}

impl SqliteDedupeRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl DedupeRepository for SqliteDedupeRepository {
    fn exists<'a>(&'a self, operation_key: &'a str) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(async move {
            let row: Option<(i64,)> =
                sqlx::query_as("SELECT 1 FROM dedupe_records WHERE operation_key = ?")
                    .bind(operation_key)
                    .fetch_optional(&self.pool.reader)
                    .await
                    .map_err(query_err)?;
            Ok(row.is_some())
        })
    }

    fn insert<'a>(&'a self, record: &'a DedupeRecord) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(async move {
            let result = sqlx::query(
                r#"INSERT INTO dedupe_records (operation_key, workflow_execution_id, created_at)
                   VALUES (?, ?, ?)
                   ON CONFLICT(operation_key) DO NOTHING"#,
            )
            .bind(&record.operation_key)
            .bind(record.workflow_execution_id.map(|id| id.to_string()))
            .bind(format_datetime(&record.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
            Ok(result.rows_affected() > 0)
        })
    }
}
