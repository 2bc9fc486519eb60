//! Execution log repository trait definition.

use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::{LogCompletion, WorkflowExecutionLog};
use uuid::Uuid;

/// Storage for per-node audit rows.
///
/// A row is created RUNNING and completed exactly once. Implementations must
/// reject a second terminal transition with [`RepositoryError::Conflict`]
/// and an unknown id with [`RepositoryError::NotFound`].
pub trait ExecutionLogRepository: Send + Sync {
    fn create_log(
        &self,
        log: &WorkflowExecutionLog,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn complete_log(
        &self,
        log_id: &Uuid,
        completion: &LogCompletion,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All rows of one execution, oldest first.
    fn list_logs(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowExecutionLog>, RepositoryError>> + Send;
}
