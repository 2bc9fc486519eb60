//! SQLite execution log repository.
//!
//! One row per node visit. Completion is a guarded UPDATE on
//! `status = 'RUNNING'`, so a row can reach a terminal state only once.

use nodeflow_core::repository::execution_log::ExecutionLogRepository;
use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::{ExecutionLogStatus, LogCompletion, WorkflowExecutionLog};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid, query_err};

pub struct SqliteExecutionLogRepository {
    pool: DatabasePool,
}

impl SqliteExecutionLogRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct LogRow {
    id: String,
    workflow_execution_id: String,
    node_template_id: String,
    node_type: String,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    input_context_json: Option<String>,
    details_json: Option<String>,
    error_message: Option<String>,
    error_type: Option<String>,
    execution_time_ms: Option<i64>,
}

impl LogRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_execution_id: row.try_get("workflow_execution_id")?,
            node_template_id: row.try_get("node_template_id")?,
            node_type: row.try_get("node_type")?,
            status: row.try_get("status")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            input_context_json: row.try_get("input_context_json")?,
            details_json: row.try_get("details_json")?,
            error_message: row.try_get("error_message")?,
            error_type: row.try_get("error_type")?,
            execution_time_ms: row.try_get("execution_time_ms")?,
        })
    }

    fn into_log(self) -> Result<WorkflowExecutionLog, RepositoryError> {
        let status = ExecutionLogStatus::parse(&self.status)
            .ok_or_else(|| RepositoryError::Query(format!("invalid log status: {}", self.status)))?;
        Ok(WorkflowExecutionLog {
            id: parse_uuid(&self.id)?,
            workflow_execution_id: parse_uuid(&self.workflow_execution_id)?,
            node_template_id: self.node_template_id,
            node_type: self.node_type,
            status,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
            input_context_json: self.input_context_json,
            details_json: self.details_json,
            error_message: self.error_message,
            error_type: self.error_type,
            execution_time_ms: self.execution_time_ms.and_then(|ms| u64::try_from(ms).ok()),
        })
    }
}

impl ExecutionLogRepository for SqliteExecutionLogRepository {
    async fn create_log(&self, log: &WorkflowExecutionLog) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflow_execution_logs
               (id, workflow_execution_id, node_template_id, node_type, status, started_at,
                completed_at, input_context_json, details_json, error_message, error_type, execution_time_ms)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(log.id.to_string())
        .bind(log.workflow_execution_id.to_string())
        .bind(&log.node_template_id)
        .bind(&log.node_type)
        .bind(log.status.as_str())
        .bind(format_datetime(&log.started_at))
        .bind(log.completed_at.as_ref().map(format_datetime))
        .bind(&log.input_context_json)
        .bind(&log.details_json)
        .bind(&log.error_message)
        .bind(&log.error_type)
        .bind(log.execution_time_ms.and_then(|ms| i64::try_from(ms).ok()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn complete_log(&self, log_id: &Uuid, completion: &LogCompletion) -> Result<(), RepositoryError> {
        if !completion.status.is_terminal() {
            return Err(RepositoryError::Conflict(format!(
                "log {log_id} cannot be completed as {}",
                completion.status
            )));
        }

        let result = sqlx::query(
            r#"UPDATE workflow_execution_logs
               SET status = ?, completed_at = ?, execution_time_ms = ?, details_json = ?,
                   error_message = ?, error_type = ?
               WHERE id = ? AND status = 'RUNNING'"#,
        )
        .bind(completion.status.as_str())
        .bind(format_datetime(&completion.completed_at))
        .bind(i64::try_from(completion.execution_time_ms).unwrap_or(i64::MAX))
        .bind(&completion.details_json)
        .bind(&completion.error_message)
        .bind(&completion.error_type)
        .bind(log_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing updated: either the row is missing or already terminal.
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT status FROM workflow_execution_logs WHERE id = ?")
                .bind(log_id.to_string())
                .fetch_optional(&self.pool.writer)
                .await
                .map_err(query_err)?;

        match existing {
            None => Err(RepositoryError::NotFound),
            Some((status,)) => Err(RepositoryError::Conflict(format!(
                "log {log_id} already completed as {status}"
            ))),
        }
    }

    async fn list_logs(&self, execution_id: &Uuid) -> Result<Vec<WorkflowExecutionLog>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_execution_logs WHERE workflow_execution_id = ? ORDER BY started_at ASC, id ASC",
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| LogRow::from_row(row).map_err(query_err)?.into_log())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_pool;
    use chrono::Utc;

    fn running(execution_id: Uuid, template: &str) -> WorkflowExecutionLog {
        WorkflowExecutionLog {
            id: Uuid::now_v7(),
            workflow_execution_id: execution_id,
            node_template_id: template.to_string(),
            node_type: "TRANSFORM".to_string(),
            status: ExecutionLogStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            input_context_json: Some(r#"{"amount":100}"#.to_string()),
            details_json: None,
            error_message: None,
            error_type: None,
            execution_time_ms: None,
        }
    }

    fn completion(status: ExecutionLogStatus) -> LogCompletion {
        LogCompletion {
            status,
            completed_at: Utc::now(),
            execution_time_ms: 12,
            details_json: Some(r#"{"output":{"total":118}}"#.to_string()),
            error_message: None,
            error_type: None,
        }
    }

    #[tokio::test]
    async fn create_complete_and_list() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteExecutionLogRepository::new(pool);
        let execution_id = Uuid::now_v7();
        let first = running(execution_id, "t-start");
        let second = running(execution_id, "t-calc");

        repo.create_log(&first).await.unwrap();
        repo.create_log(&second).await.unwrap();
        repo.complete_log(&first.id, &completion(ExecutionLogStatus::Success))
            .await
            .unwrap();

        let logs = repo.list_logs(&execution_id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].node_template_id, "t-start");
        assert_eq!(logs[0].status, ExecutionLogStatus::Success);
        assert_eq!(logs[0].execution_time_ms, Some(12));
        assert!(logs[0].details_json.as_deref().unwrap().contains("118"));
        assert_eq!(logs[1].status, ExecutionLogStatus::Running);
        assert!(logs[1].completed_at.is_none());
    }

    #[tokio::test]
    async fn second_completion_conflicts() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteExecutionLogRepository::new(pool);
        let log = running(Uuid::now_v7(), "t1");
        repo.create_log(&log).await.unwrap();

        repo.complete_log(&log.id, &completion(ExecutionLogStatus::Failed))
            .await
            .unwrap();
        let again = repo
            .complete_log(&log.id, &completion(ExecutionLogStatus::Success))
            .await;
        assert!(matches!(again, Err(RepositoryError::Conflict(m)) if m.contains("FAILED")));

        let stored = repo.list_logs(&log.workflow_execution_id).await.unwrap();
        assert_eq!(stored[0].status, ExecutionLogStatus::Failed);
    }

    #[tokio::test]
    async fn unknown_log_and_running_target_are_rejected() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteExecutionLogRepository::new(pool);

        let missing = repo
            .complete_log(&Uuid::now_v7(), &completion(ExecutionLogStatus::Success))
            .await;
        assert!(matches!(missing, Err(RepositoryError::NotFound)));

        let log = running(Uuid::now_v7(), "t1");
        repo.create_log(&log).await.unwrap();
        let reopen = repo
            .complete_log(&log.id, &completion(ExecutionLogStatus::Running))
            .await;
        assert!(matches!(reopen, Err(RepositoryError::Conflict(_))));
    }
}
