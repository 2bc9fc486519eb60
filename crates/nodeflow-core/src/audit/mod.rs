//! Per-node audit trail.
//!
//! - `sanitizer` -- redaction and size capping of logged contexts
//! - `logger` -- RUNNING -> terminal lifecycle of execution log rows

pub mod logger;
pub mod sanitizer;

use nodeflow_types::error::RepositoryError;

pub use logger::{ExecutionLogger, NodeLogHandle};
pub use sanitizer::ContextSanitizer;

/// Failures inside the audit path. These are reported, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to serialize audit payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("execution log store failed: {0}")]
    Store(#[from] RepositoryError),
}
