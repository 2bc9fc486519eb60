use nodeflow_types::error::RepositoryError;

use crate::node::NodeError;

/// Errors that abort a workflow run.
///
/// Node-level failures do not appear here: handlers report them through their
/// outcome and the run continues. Only trigger failures, the step guard and
/// store errors around the run record are fatal.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),

    #[error("workflow '{0}' has no node mappings")]
    EmptyWorkflow(String),

    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: u32 },

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors from ordered fan-out routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("router step {count} exceeds the limit of {limit}")]
    StepLimitExceeded { count: u32, limit: u32 },

    #[error(transparent)]
    Node(#[from] NodeError),
}
