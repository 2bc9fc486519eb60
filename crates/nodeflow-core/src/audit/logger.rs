//! Execution logger: one audit row per node visit.
//!
//! Every row is created RUNNING when the node is entered and completed once
//! with a terminal status when it exits. Store or serialization failures are
//! handed to the [`ErrorReporter`] and swallowed, so auditing can never abort
//! a workflow.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use nodeflow_types::execution::{ExecutionLogStatus, LogCompletion, WorkflowExecutionLog};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{AuditError, ContextSanitizer};
use crate::repository::error_reporter::ErrorReporter;
use crate::repository::execution_log::ExecutionLogRepository;
use crate::workflow::ExecutionContext;

/// Returned by [`ExecutionLogger::start`] and consumed by `complete`.
#[derive(Debug)]
pub struct NodeLogHandle {
    pub log_id: Uuid,
    started: Instant,
    persisted: bool,
}

impl NodeLogHandle {
    /// Whether the RUNNING row made it to the store.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }
}

/// Terminal state of one node visit.
#[derive(Debug, Clone)]
pub struct NodeCompletion<'a> {
    pub status: ExecutionLogStatus,
    pub changes: &'a Map<String, Value>,
    pub details: Option<&'a Value>,
    pub error_message: Option<&'a str>,
    pub error_type: Option<&'a str>,
}

pub struct ExecutionLogger<L: ExecutionLogRepository> {
    repo: Arc<L>,
    sanitizer: ContextSanitizer,
    reporter: Arc<dyn ErrorReporter>,
}

impl<L: ExecutionLogRepository> ExecutionLogger<L> {
    pub fn new(repo: Arc<L>, sanitizer: ContextSanitizer, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            repo,
            sanitizer,
            reporter,
        }
    }

    pub fn repository(&self) -> &Arc<L> {
        &self.repo
    }

    /// Persist a RUNNING row with a sanitized snapshot of the input context.
    pub async fn start(
        &self,
        execution_id: Uuid,
        node_template_id: &str,
        node_type: &str,
        context: &ExecutionContext,
    ) -> NodeLogHandle {
        let log_id = Uuid::now_v7();
        let started = Instant::now();

        let input = match self.serialize(&self.sanitizer.sanitize_map(context.as_map())) {
            Ok(json) => Some(json),
            Err(e) => {
                self.reporter.report("serialize node input", &e);
                None
            }
        };

        let row = WorkflowExecutionLog {
            id: log_id,
            workflow_execution_id: execution_id,
            node_template_id: node_template_id.to_string(),
            node_type: node_type.to_string(),
            status: ExecutionLogStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            input_context_json: input,
            details_json: None,
            error_message: None,
            error_type: None,
            execution_time_ms: None,
        };

        let persisted = match self.repo.create_log(&row).await {
            Ok(()) => true,
            Err(e) => {
                self.reporter.report("create execution log", &AuditError::from(e));
                false
            }
        };

        tracing::debug!(
            execution_id = %execution_id,
            log_id = %log_id,
            node_template_id,
            node_type,
            "node log started"
        );

        NodeLogHandle {
            log_id,
            started,
            persisted,
        }
    }

    /// Move the row to its terminal status. A row whose creation failed is
    /// not completed.
    pub async fn complete(&self, handle: NodeLogHandle, completion: NodeCompletion<'_>) {
        if !handle.persisted {
            return;
        }

        let mut payload = Map::new();
        if !completion.changes.is_empty() {
            payload.insert("output".to_string(), Value::Object(completion.changes.clone()));
        }
        if let Some(details) = completion.details {
            payload.insert("details".to_string(), details.clone());
        }
        let details_json = if payload.is_empty() {
            None
        } else {
            match self.serialize(&self.sanitizer.sanitize_map(&payload)) {
                Ok(json) => Some(json),
                Err(e) => {
                    self.reporter.report("serialize node output", &e);
                    None
                }
            }
        };

        let elapsed_ms = u64::try_from(handle.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let record = LogCompletion {
            status: completion.status,
            completed_at: Utc::now(),
            execution_time_ms: elapsed_ms,
            details_json,
            error_message: completion.error_message.map(str::to_string),
            error_type: completion.error_type.map(str::to_string),
        };

        if let Err(e) = self.repo.complete_log(&handle.log_id, &record).await {
            self.reporter.report("complete execution log", &AuditError::from(e));
            return;
        }

        tracing::debug!(
            log_id = %handle.log_id,
            status = %completion.status.as_str(),
            elapsed_ms,
            "node log completed"
        );
    }

    fn serialize(&self, value: &Value) -> Result<String, AuditError> {
        Ok(serde_json::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingLogRepository, InMemoryLogRepository, RecordingReporter};
    use serde_json::json;

    fn context() -> ExecutionContext {
        ExecutionContext::from(
            json!({"studentName": "Asha", "authToken": "abc"})
                .as_object()
                .cloned()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn start_then_complete_records_terminal_row() {
        let repo = Arc::new(InMemoryLogRepository::default());
        let reporter = Arc::new(RecordingReporter::default());
        let logger = ExecutionLogger::new(repo.clone(), ContextSanitizer::default(), reporter.clone());
        let execution_id = Uuid::now_v7();

        let handle = logger.start(execution_id, "t1", "TRANSFORM", &context()).await;
        assert!(handle.is_persisted());
        let changes = json!({"total": 5}).as_object().cloned().unwrap();
        logger
            .complete(
                handle,
                NodeCompletion {
                    status: ExecutionLogStatus::Success,
                    changes: &changes,
                    details: None,
                    error_message: None,
                    error_type: None,
                },
            )
            .await;

        let logs = repo.rows();
        assert_eq!(logs.len(), 1);
        let row = &logs[0];
        assert_eq!(row.status, ExecutionLogStatus::Success);
        assert!(row.completed_at.is_some());
        assert!(row.execution_time_ms.is_some());
        let input = row.input_context_json.as_deref().unwrap();
        assert!(input.contains("Asha"));
        assert!(!input.contains("abc"));
        assert!(row.details_json.as_deref().unwrap().contains("\"total\":5"));
        assert!(reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn store_failures_are_reported_not_raised() {
        let reporter = Arc::new(RecordingReporter::default());
        let logger = ExecutionLogger::new(
            Arc::new(FailingLogRepository),
            ContextSanitizer::default(),
            reporter.clone(),
        );

        let handle = logger.start(Uuid::now_v7(), "t1", "QUERY", &context()).await;
        assert!(!handle.is_persisted());
        logger
            .complete(
                handle,
                NodeCompletion {
                    status: ExecutionLogStatus::Failed,
                    changes: &Map::new(),
                    details: None,
                    error_message: Some("boom"),
                    error_type: Some("QUERY_ERROR"),
                },
            )
            .await;

        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "create execution log");
    }
}
