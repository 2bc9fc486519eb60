//! Pluggable strategy registries keyed by upper-case name.
//!
//! - `action` -- data processors used by the Action node (`ITERATOR`, `QUERY`)
//! - `http` -- request types used by the HttpRequest node (`REST`, ...)
//!
//! Unlike node kinds, these sets are open: deployments register their own.

pub mod action;
pub mod http;

pub use action::{ActionStrategy, ActionStrategyRegistry};
pub use http::{HttpRequest, HttpRequestStrategy, HttpStrategyRegistry};

/// Registry keys are compared upper-case and trimmed.
pub(crate) fn registry_key(name: &str) -> String {
    name.trim().to_uppercase()
}
