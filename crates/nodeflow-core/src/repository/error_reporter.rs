//! Error-tracking collaborator for failures that must not abort a run.

use std::error::Error;

pub trait ErrorReporter: Send + Sync {
    /// Report a swallowed error. `operation` names what was being attempted.
    fn report(&self, operation: &str, error: &(dyn Error + 'static));
}

/// Default reporter: one `tracing::error!` event per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, operation: &str, error: &(dyn Error + 'static)) {
        tracing::error!(operation, error = %error, "swallowed failure in audit path");
    }
}
