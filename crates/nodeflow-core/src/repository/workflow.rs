//! Workflow repository trait definition.
//!
//! Defines the storage interface for workflow graphs (workflow, node
//! templates, mappings) and for run records. The infrastructure layer
//! (nodeflow-infra) implements this trait with SQLite persistence.

use chrono::{DateTime, Utc};
use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::{ExecutionStatus, WorkflowExecution};
use nodeflow_types::workflow::{Workflow, WorkflowBundle};
use uuid::Uuid;

/// Repository trait for workflow persistence.
///
/// Covers two entity families:
/// - **Graphs:** a workflow with its templates and mappings, saved and
///   loaded as a [`WorkflowBundle`].
/// - **Executions:** one [`WorkflowExecution`] record per run.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Graphs
    // -----------------------------------------------------------------------

    /// Upsert a workflow together with its templates, replacing its mappings.
    fn save_bundle(
        &self,
        bundle: &WorkflowBundle,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Load a workflow with every template its mappings reference.
    fn load_bundle(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowBundle>, RepositoryError>> + Send;

    /// List workflows, optionally filtered by institute.
    fn list_workflows(
        &self,
        institute_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// ACTIVE workflows of an institute that listen for `event_key`.
    fn find_active_by_event(
        &self,
        institute_id: &str,
        event_key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// Create a new execution record (normally RUNNING).
    fn create_execution(
        &self,
        execution: &WorkflowExecution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Record the final status of an execution.
    fn finish_execution(
        &self,
        execution_id: &Uuid,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
        steps_executed: u32,
        error: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an execution record by its UUID.
    fn get_execution(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowExecution>, RepositoryError>> + Send;

    /// List executions of a workflow, newest first.
    fn list_executions(
        &self,
        workflow_id: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowExecution>, RepositoryError>> + Send;
}
