//! Single-path state-machine walk over a workflow graph.

use std::sync::Arc;

use chrono::Utc;
use nodeflow_types::config::TraversalConfig;
use nodeflow_types::execution::{ExecutionStatus, WorkflowExecution};
use nodeflow_types::workflow::WorkflowBundle;
use serde_json::Value;
use uuid::Uuid;

use super::error::EngineError;
use super::step::NodeRunner;
use crate::expression::WorkflowEvaluator;
use crate::repository::execution_log::ExecutionLogRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::workflow::routing::{next_route, Route, Termination};
use crate::workflow::ExecutionContext;

/// What a finished run looks like.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub execution_id: Uuid,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub steps: u32,
    /// Node names in visit order.
    pub visited: Vec<String>,
    pub termination: Termination,
    pub context: ExecutionContext,
}

pub struct WorkflowEngineService<W: WorkflowRepository, L: ExecutionLogRepository> {
    workflows: Arc<W>,
    runner: NodeRunner<L>,
    evaluator: Arc<WorkflowEvaluator>,
    max_steps: u32,
}

impl<W: WorkflowRepository, L: ExecutionLogRepository> WorkflowEngineService<W, L> {
    pub fn new(
        workflows: Arc<W>,
        runner: NodeRunner<L>,
        evaluator: Arc<WorkflowEvaluator>,
        config: &TraversalConfig,
    ) -> Self {
        Self {
            workflows,
            runner,
            evaluator,
            max_steps: config.max_steps,
        }
    }

    pub fn workflows(&self) -> &Arc<W> {
        &self.workflows
    }

    /// Load a workflow by id and run it with `payload` as the initial context.
    pub async fn run(
        &self,
        workflow_id: &str,
        payload: Value,
        idempotency_key: Option<&str>,
    ) -> Result<RunSummary, EngineError> {
        let bundle = self
            .workflows
            .load_bundle(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;
        self.run_bundle(&bundle, payload, idempotency_key).await
    }

    /// Run an already loaded bundle.
    ///
    /// The execution record is created RUNNING before the first node and
    /// finalized COMPLETED or FAILED afterwards.
    pub async fn run_bundle(
        &self,
        bundle: &WorkflowBundle,
        payload: Value,
        idempotency_key: Option<&str>,
    ) -> Result<RunSummary, EngineError> {
        let workflow = &bundle.workflow;
        let execution_id = Uuid::now_v7();
        let record = WorkflowExecution {
            id: execution_id,
            workflow_id: workflow.id.clone(),
            institute_id: workflow.institute_id.clone(),
            status: ExecutionStatus::Running,
            idempotency_key: idempotency_key.map(str::to_string),
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            steps_executed: 0,
        };
        self.workflows.create_execution(&record).await?;

        tracing::info!(
            execution_id = %execution_id,
            workflow_id = %workflow.id,
            institute_id = %workflow.institute_id,
            "workflow run started"
        );

        let mut context =
            ExecutionContext::for_run(execution_id, &workflow.id, &workflow.institute_id, payload);
        let mut steps = 0u32;
        let mut visited = Vec::new();
        let result = self
            .walk(bundle, execution_id, &mut context, &mut steps, &mut visited)
            .await;

        let (status, error) = match &result {
            Ok(_) => (ExecutionStatus::Completed, None),
            Err(e) => (ExecutionStatus::Failed, Some(e.to_string())),
        };
        if let Err(e) = self
            .workflows
            .finish_execution(&execution_id, status, Utc::now(), steps, error.as_deref())
            .await
        {
            tracing::error!(execution_id = %execution_id, error = %e, "failed to finalize execution record");
        }

        match result {
            Ok(termination) => {
                tracing::info!(
                    execution_id = %execution_id,
                    steps,
                    termination = ?termination,
                    "workflow run completed"
                );
                Ok(RunSummary {
                    execution_id,
                    workflow_id: workflow.id.clone(),
                    status,
                    steps,
                    visited,
                    termination,
                    context,
                })
            }
            Err(e) => {
                tracing::warn!(execution_id = %execution_id, steps, error = %e, "workflow run failed");
                Err(e)
            }
        }
    }

    async fn walk(
        &self,
        bundle: &WorkflowBundle,
        execution_id: Uuid,
        context: &mut ExecutionContext,
        steps: &mut u32,
        visited: &mut Vec<String>,
    ) -> Result<Termination, EngineError> {
        let templates = bundle.templates_by_id();

        let mut current = match bundle.flagged_start() {
            Some(mapping) => mapping,
            None => {
                let Some(first) = bundle.ordered_mappings().into_iter().next() else {
                    return Err(EngineError::EmptyWorkflow(bundle.workflow.id.clone()));
                };
                tracing::warn!(
                    workflow_id = %bundle.workflow.id,
                    node_template_id = %first.node_template_id,
                    "no start node flagged, using lowest nodeOrder"
                );
                first
            }
        };

        loop {
            if *steps >= self.max_steps {
                return Err(EngineError::StepLimitExceeded {
                    limit: self.max_steps,
                });
            }
            *steps += 1;

            let Some(template) = templates.get(&current.node_template_id) else {
                tracing::warn!(
                    node_template_id = %current.node_template_id,
                    "mapping references an unknown template, stopping"
                );
                return Ok(Termination::NoTarget);
            };
            visited.push(template.node_name.clone());

            let config = self
                .runner
                .run_step(execution_id, current, template, &templates, context, *steps)
                .await?;

            match next_route(&config, &self.evaluator, context.as_map()) {
                Route::Next(name) => match bundle.mapping_by_node_name(&name) {
                    Some(next) => {
                        tracing::debug!(from = %template.node_name, to = %name, "routing");
                        current = next;
                    }
                    None => {
                        tracing::info!(from = %template.node_name, target = %name, "routing target names no node, stopping");
                        return Ok(Termination::NoTarget);
                    }
                },
                Route::Stop(termination) => {
                    match &termination {
                        Termination::End => {}
                        Termination::InvalidDirective(reason) | Termination::EvaluationFailed(reason) => {
                            tracing::info!(node = %template.node_name, reason = %reason, "routing could not be resolved, stopping")
                        }
                        other => {
                            tracing::debug!(node = %template.node_name, termination = ?other, "walk stopped")
                        }
                    }
                    return Ok(termination);
                }
            }
        }
    }
}
