//! Dedupe record storage (object-safe, shared by the notification handlers).

use futures_util::future::BoxFuture;
use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::DedupeRecord;

pub trait DedupeRepository: Send + Sync {
    /// Point lookup by operation key.
    fn exists<'a>(&'a self, operation_key: &'a str) -> BoxFuture<'a, Result<bool, RepositoryError>>;

    /// Insert a record. Returns `false` when the key was already present.
    fn insert<'a>(&'a self, record: &'a DedupeRecord) -> BoxFuture<'a, Result<bool, RepositoryError>>;
}
