//! Event-driven entry point: fire every active workflow bound to an event.

use std::sync::Arc;

use serde_json::Value;

use super::error::EngineError;
use super::walk::{RunSummary, WorkflowEngineService};
use crate::repository::execution_log::ExecutionLogRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::service::IdempotencyService;

/// Outcome of one workflow started by [`WorkflowTriggerService::fire`].
#[derive(Debug, Clone)]
pub enum TriggeredRun {
    Completed(RunSummary),
    /// A run with the same idempotency key is in flight or already done.
    Duplicate {
        workflow_id: String,
        idempotency_key: String,
    },
    Failed {
        workflow_id: String,
        error: String,
    },
}

impl TriggeredRun {
    pub fn workflow_id(&self) -> &str {
        match self {
            TriggeredRun::Completed(summary) => &summary.workflow_id,
            TriggeredRun::Duplicate { workflow_id, .. } | TriggeredRun::Failed { workflow_id, .. } => {
                workflow_id
            }
        }
    }
}

pub struct WorkflowTriggerService<W: WorkflowRepository, L: ExecutionLogRepository> {
    engine: Arc<WorkflowEngineService<W, L>>,
    idempotency: Arc<IdempotencyService>,
}

impl<W: WorkflowRepository, L: ExecutionLogRepository> WorkflowTriggerService<W, L> {
    pub fn new(engine: Arc<WorkflowEngineService<W, L>>, idempotency: Arc<IdempotencyService>) -> Self {
        Self {
            engine,
            idempotency,
        }
    }

    /// Run every ACTIVE workflow of `institute_id` bound to `event_key`.
    ///
    /// With an idempotency key, each workflow is guarded by
    /// `"{workflowId}:{key}"`. A failing workflow is reported in its
    /// [`TriggeredRun`] and does not stop the others.
    pub async fn fire(
        &self,
        institute_id: &str,
        event_key: &str,
        payload: Value,
        idempotency_key: Option<&str>,
    ) -> Result<Vec<TriggeredRun>, EngineError> {
        let workflows = self
            .engine
            .workflows()
            .find_active_by_event(institute_id, event_key)
            .await?;
        if workflows.is_empty() {
            tracing::info!(institute_id, event_key, "no active workflow bound to event");
        }

        let mut runs = Vec::with_capacity(workflows.len());
        for workflow in workflows {
            let key = idempotency_key.map(|k| format!("{}:{k}", workflow.id));
            if let Some(key) = &key {
                if !self.idempotency.try_begin(key) {
                    tracing::info!(workflow_id = %workflow.id, idempotency_key = %key, "duplicate trigger suppressed");
                    runs.push(TriggeredRun::Duplicate {
                        workflow_id: workflow.id.clone(),
                        idempotency_key: key.clone(),
                    });
                    continue;
                }
            }

            match self.engine.run(&workflow.id, payload.clone(), key.as_deref()).await {
                Ok(summary) => {
                    if let Some(key) = &key {
                        self.idempotency.mark_completed(key);
                    }
                    runs.push(TriggeredRun::Completed(summary));
                }
                Err(e) => {
                    if let Some(key) = &key {
                        self.idempotency.mark_failed(key);
                    }
                    tracing::warn!(workflow_id = %workflow.id, error = %e, "triggered workflow failed");
                    runs.push(TriggeredRun::Failed {
                        workflow_id: workflow.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(runs)
    }
}
