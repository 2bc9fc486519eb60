//! Repository and collaborator trait definitions (ports).
//!
//! These traits define the storage and side-effect interfaces that the
//! infrastructure layer (nodeflow-infra) implements. The core crate never
//! depends on any specific storage technology or transport.
//!
//! `WorkflowRepository` and `ExecutionLogRepository` use native async fns and
//! are consumed generically. The collaborators that handlers hold as
//! `Arc<dyn ..>` return boxed futures so they stay object-safe.

pub mod dedupe;
pub mod error_reporter;
pub mod execution_log;
pub mod notification;
pub mod query;
pub mod workflow;
