//! Infrastructure layer for Nodeflow.
//!
//! Implements the ports defined in `nodeflow-core`: SQLite repositories for
//! workflows, execution logs and dedupe records, the `REST` HTTP strategy,
//! a logging notification dispatcher, and the TOML config loader.

pub mod config;
pub mod http;
pub mod notification;
pub mod sqlite;
