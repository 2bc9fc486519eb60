//! Execution tracking types: run records, per-node audit logs, dedupe records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Node log status
// ---------------------------------------------------------------------------

/// Status of a single node visit.
///
/// `Running` is the only non-terminal state. A log row moves from `Running`
/// to exactly one terminal state and is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionLogStatus {
    Running,
    Success,
    Failed,
    PartialSuccess,
    Skipped,
}

impl ExecutionLogStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionLogStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionLogStatus::Running => "RUNNING",
            ExecutionLogStatus::Success => "SUCCESS",
            ExecutionLogStatus::Failed => "FAILED",
            ExecutionLogStatus::PartialSuccess => "PARTIAL_SUCCESS",
            ExecutionLogStatus::Skipped => "SKIPPED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(ExecutionLogStatus::Running),
            "SUCCESS" => Some(ExecutionLogStatus::Success),
            "FAILED" => Some(ExecutionLogStatus::Failed),
            "PARTIAL_SUCCESS" => Some(ExecutionLogStatus::PartialSuccess),
            "SKIPPED" => Some(ExecutionLogStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record for one node visit within a workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionLog {
    pub id: Uuid,
    pub workflow_execution_id: Uuid,
    pub node_template_id: String,
    pub node_type: String,
    pub status: ExecutionLogStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Sanitized snapshot of the context the node received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_context_json: Option<String>,
    /// Sanitized output/details written at completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

/// Fields written when a node visit finishes.
#[derive(Debug, Clone)]
pub struct LogCompletion {
    pub status: ExecutionLogStatus,
    pub completed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
    pub details_json: Option<String>,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Workflow execution (run record)
// ---------------------------------------------------------------------------

/// Overall status of a workflow execution.
///
/// Maps to the CHECK constraint on `workflow_executions.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(ExecutionStatus::Running),
            "COMPLETED" => Some(ExecutionStatus::Completed),
            "FAILED" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }
}

/// One run of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: String,
    pub institute_id: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub steps_executed: u32,
}

// ---------------------------------------------------------------------------
// Dedupe
// ---------------------------------------------------------------------------

/// Marks a side-effectful operation as done.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupeRecord {
    pub operation_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_execution_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
