//! Persistent duplicate suppression for side-effectful operations.

use std::sync::Arc;

use chrono::Utc;
use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::DedupeRecord;
use uuid::Uuid;

use crate::repository::dedupe::DedupeRepository;

/// Answers "was this operation already done?" by operation key.
#[derive(Clone)]
pub struct DedupeService {
    repo: Arc<dyn DedupeRepository>,
}

impl DedupeService {
    pub fn new(repo: Arc<dyn DedupeRepository>) -> Self {
        Self { repo }
    }

    pub async fn seen(&self, operation_key: &str) -> Result<bool, RepositoryError> {
        self.repo.exists(operation_key).await
    }

    /// Record a completed operation. Returns `false` if it was already known.
    pub async fn record(
        &self,
        operation_key: &str,
        execution_id: Option<Uuid>,
    ) -> Result<bool, RepositoryError> {
        let record = DedupeRecord {
            operation_key: operation_key.to_string(),
            workflow_execution_id: execution_id,
            created_at: Utc::now(),
        };
        self.repo.insert(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryDedupeRepository;

    #[tokio::test]
    async fn seen_after_record() {
        let service = DedupeService::new(Arc::new(InMemoryDedupeRepository::default()));
        assert!(!service.seen("fee-reminder:stu-1:2026-10").await.unwrap());
        assert!(service.record("fee-reminder:stu-1:2026-10", None).await.unwrap());
        assert!(service.seen("fee-reminder:stu-1:2026-10").await.unwrap());
        assert!(!service.record("fee-reminder:stu-1:2026-10", None).await.unwrap());
    }
}
