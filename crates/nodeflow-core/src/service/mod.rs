//! Duplicate-suppression services.
//!
//! - `idempotency` -- whole-run suppression, in memory with TTL
//! - `dedupe` -- per-operation suppression, persisted

pub mod dedupe;
pub mod idempotency;

pub use dedupe::DedupeService;
pub use idempotency::{IdempotencyService, IdempotencyStatus};
