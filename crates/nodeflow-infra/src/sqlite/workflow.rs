//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `nodeflow-core`. A workflow bundle is
//! spread over `workflows`, `node_templates` and `workflow_node_mappings`;
//! run records live in `workflow_executions`.

use chrono::{DateTime, Utc};
use nodeflow_core::repository::workflow::WorkflowRepository;
use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::{ExecutionStatus, WorkflowExecution};
use nodeflow_types::workflow::{
    NodeTemplate, TemplateStatus, Workflow, WorkflowBundle, WorkflowNodeMapping, WorkflowStatus,
};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{enum_to_str, format_datetime, parse_datetime, parse_enum, parse_uuid, query_err};

/// SQLite-backed implementation of `WorkflowRepository`.
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct WorkflowRow {
    id: String,
    institute_id: String,
    status: String,
    name: String,
    description: Option<String>,
    trigger_event: Option<String>,
}

impl WorkflowRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            institute_id: row.try_get("institute_id")?,
            status: row.try_get("status")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            trigger_event: row.try_get("trigger_event")?,
        })
    }

    fn into_workflow(self) -> Result<Workflow, RepositoryError> {
        Ok(Workflow {
            status: parse_enum::<WorkflowStatus>(&self.status, "workflow status")?,
            id: self.id,
            institute_id: self.institute_id,
            name: self.name,
            description: self.description,
            trigger_event: self.trigger_event,
        })
    }
}

fn template_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<NodeTemplate, RepositoryError> {
    let status: String = row.try_get("status").map_err(query_err)?;
    Ok(NodeTemplate {
        id: row.try_get("id").map_err(query_err)?,
        node_type: row.try_get("node_type").map_err(query_err)?,
        node_name: row.try_get("node_name").map_err(query_err)?,
        config_json: row.try_get("config_json").map_err(query_err)?,
        institute_id: row.try_get("institute_id").map_err(query_err)?,
        status: parse_enum::<TemplateStatus>(&status, "template status")?,
    })
}

fn mapping_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowNodeMapping, RepositoryError> {
    Ok(WorkflowNodeMapping {
        workflow_id: row.try_get("workflow_id").map_err(query_err)?,
        node_template_id: row.try_get("node_template_id").map_err(query_err)?,
        node_order: row.try_get("node_order").map_err(query_err)?,
        is_start_node: row.try_get::<bool, _>("is_start_node").map_err(query_err)?,
        override_config: row.try_get("override_config").map_err(query_err)?,
    })
}

struct ExecutionRow {
    id: String,
    workflow_id: String,
    institute_id: String,
    status: String,
    idempotency_key: Option<String>,
    started_at: String,
    completed_at: Option<String>,
    error_message: Option<String>,
    steps_executed: i64,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            institute_id: row.try_get("institute_id")?,
            status: row.try_get("status")?,
            idempotency_key: row.try_get("idempotency_key")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            error_message: row.try_get("error_message")?,
            steps_executed: row.try_get("steps_executed")?,
        })
    }

    fn into_execution(self) -> Result<WorkflowExecution, RepositoryError> {
        let status = ExecutionStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::Query(format!("invalid execution status: {}", self.status))
        })?;
        Ok(WorkflowExecution {
            id: parse_uuid(&self.id)?,
            workflow_id: self.workflow_id,
            institute_id: self.institute_id,
            status,
            idempotency_key: self.idempotency_key,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
            error_message: self.error_message,
            steps_executed: u32::try_from(self.steps_executed).unwrap_or(u32::MAX),
        })
    }
}

// ---------------------------------------------------------------------------
// WorkflowRepository impl
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn save_bundle(&self, bundle: &WorkflowBundle) -> Result<(), RepositoryError> {
        let workflow = &bundle.workflow;
        let now = format_datetime(&Utc::now());
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query(
            r#"INSERT INTO workflows (id, institute_id, status, name, description, trigger_event, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 institute_id = excluded.institute_id,
                 status = excluded.status,
                 name = excluded.name,
                 description = excluded.description,
                 trigger_event = excluded.trigger_event,
                 updated_at = excluded.updated_at"#,
        )
        .bind(&workflow.id)
        .bind(&workflow.institute_id)
        .bind(workflow.status.as_str())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(&workflow.trigger_event)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        for template in &bundle.templates {
            sqlx::query(
                r#"INSERT INTO node_templates (id, node_type, node_name, config_json, institute_id, status)
                   VALUES (?, ?, ?, ?, ?, ?)
                   ON CONFLICT(id) DO UPDATE SET
                     node_type = excluded.node_type,
                     node_name = excluded.node_name,
                     config_json = excluded.config_json,
                     institute_id = excluded.institute_id,
                     status = excluded.status"#,
            )
            .bind(&template.id)
            .bind(&template.node_type)
            .bind(&template.node_name)
            .bind(&template.config_json)
            .bind(&template.institute_id)
            .bind(enum_to_str(&template.status)?)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        sqlx::query("DELETE FROM workflow_node_mappings WHERE workflow_id = ?")
            .bind(&workflow.id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        for mapping in &bundle.mappings {
            sqlx::query(
                r#"INSERT INTO workflow_node_mappings
                   (workflow_id, node_template_id, node_order, is_start_node, override_config)
                   VALUES (?, ?, ?, ?, ?)"#,
            )
            .bind(&workflow.id)
            .bind(&mapping.node_template_id)
            .bind(mapping.node_order)
            .bind(mapping.is_start_node)
            .bind(&mapping.override_config)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        tx.commit().await.map_err(query_err)?;
        tracing::debug!(
            workflow_id = %workflow.id,
            templates = bundle.templates.len(),
            mappings = bundle.mappings.len(),
            "workflow bundle saved"
        );
        Ok(())
    }

    async fn load_bundle(&self, workflow_id: &str) -> Result<Option<WorkflowBundle>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(workflow_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let workflow = WorkflowRow::from_row(&row).map_err(query_err)?.into_workflow()?;

        let template_rows = sqlx::query(
            r#"SELECT t.* FROM node_templates t
               JOIN workflow_node_mappings m ON m.node_template_id = t.id
               WHERE m.workflow_id = ?
               ORDER BY m.node_order ASC"#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        let templates = template_rows
            .iter()
            .map(template_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let mapping_rows = sqlx::query(
            "SELECT * FROM workflow_node_mappings WHERE workflow_id = ? ORDER BY node_order ASC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        let mappings = mapping_rows
            .iter()
            .map(mapping_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(WorkflowBundle {
            workflow,
            templates,
            mappings,
        }))
    }

    async fn list_workflows(&self, institute_id: Option<&str>) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = match institute_id {
            Some(institute_id) => {
                sqlx::query("SELECT * FROM workflows WHERE institute_id = ? ORDER BY id ASC")
                    .bind(institute_id)
                    .fetch_all(&self.pool.reader)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM workflows ORDER BY id ASC")
                    .fetch_all(&self.pool.reader)
                    .await
            }
        }
        .map_err(query_err)?;

        rows.iter()
            .map(|row| WorkflowRow::from_row(row).map_err(query_err)?.into_workflow())
            .collect()
    }

    async fn find_active_by_event(
        &self,
        institute_id: &str,
        event_key: &str,
    ) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflows WHERE institute_id = ? AND trigger_event = ? AND status = 'ACTIVE' ORDER BY id ASC",
        )
        .bind(institute_id)
        .bind(event_key)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| WorkflowRow::from_row(row).map_err(query_err)?.into_workflow())
            .collect()
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflow_executions
               (id, workflow_id, institute_id, status, idempotency_key, started_at, completed_at, error_message, steps_executed)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(&execution.workflow_id)
        .bind(&execution.institute_id)
        .bind(execution.status.as_str())
        .bind(&execution.idempotency_key)
        .bind(format_datetime(&execution.started_at))
        .bind(execution.completed_at.as_ref().map(format_datetime))
        .bind(&execution.error_message)
        .bind(i64::from(execution.steps_executed))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn finish_execution(
        &self,
        execution_id: &Uuid,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
        steps_executed: u32,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE workflow_executions SET status = ?, completed_at = ?, steps_executed = ?, error_message = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(format_datetime(&completed_at))
        .bind(i64::from(steps_executed))
        .bind(error)
        .bind(execution_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_execution(&self, execution_id: &Uuid) -> Result<Option<WorkflowExecution>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflow_executions WHERE id = ?")
            .bind(execution_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.map(|row| ExecutionRow::from_row(&row).map_err(query_err)?.into_execution())
            .transpose()
    }

    async fn list_executions(
        &self,
        workflow_id: &str,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_executions WHERE workflow_id = ? ORDER BY started_at DESC LIMIT ?",
        )
        .bind(workflow_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| ExecutionRow::from_row(row).map_err(query_err)?.into_execution())
            .collect()
    }
}
