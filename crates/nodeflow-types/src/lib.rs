//! Shared domain types for Nodeflow.
//!
//! This crate contains the data model of the workflow engine: node templates,
//! workflow mappings, execution records and audit logs, notification payloads,
//! configuration, and the repository error type.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod execution;
pub mod notification;
pub mod workflow;
