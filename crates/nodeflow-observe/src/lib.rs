//! Observability setup for Nodeflow binaries.

pub mod tracing_setup;
