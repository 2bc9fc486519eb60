//! Workflow graph plumbing shared by the handlers and the engine.
//!
//! - `context` -- the per-run execution context and its reserved keys
//! - `merge` -- deep merge of override configs onto template configs
//! - `routing` -- `end` / `goto` / `conditional` / `switch` directives
//! - `validate` -- static checks over a workflow bundle

pub mod context;
pub mod merge;
pub mod routing;
pub mod validate;

pub use context::ExecutionContext;
