//! Ordered fan-out over a fixed list of target nodes.
//!
//! Targets run one after another exactly like engine steps. Their routing
//! blocks are not followed. The caller owns the step counter so nested
//! fan-outs share one budget.

use nodeflow_types::config::RouterConfig;
use nodeflow_types::workflow::WorkflowBundle;
use uuid::Uuid;

use super::error::RouterError;
use super::step::NodeRunner;
use crate::repository::execution_log::ExecutionLogRepository;
use crate::workflow::ExecutionContext;

pub struct RouterService<L: ExecutionLogRepository> {
    runner: NodeRunner<L>,
    max_steps: u32,
}

impl<L: ExecutionLogRepository> RouterService<L> {
    pub fn new(runner: NodeRunner<L>, config: &RouterConfig) -> Self {
        Self {
            runner,
            max_steps: config.max_steps,
        }
    }

    /// Execute `targets` (template ids, or node names) in order.
    ///
    /// Each target increments `step_counter`; once it exceeds the limit the
    /// call fails before running that target. Unknown targets are skipped.
    pub async fn process_routing(
        &self,
        bundle: &WorkflowBundle,
        execution_id: Uuid,
        targets: &[String],
        context: &mut ExecutionContext,
        step_counter: &mut u32,
    ) -> Result<(), RouterError> {
        let templates = bundle.templates_by_id();

        for target in targets {
            *step_counter += 1;
            if *step_counter > self.max_steps {
                return Err(RouterError::StepLimitExceeded {
                    count: *step_counter,
                    limit: self.max_steps,
                });
            }

            let Some(mapping) = bundle
                .mapping_by_template_id(target)
                .or_else(|| bundle.mapping_by_node_name(target))
            else {
                tracing::warn!(target = %target, "router target not in workflow, skipping");
                continue;
            };
            let Some(template) = templates.get(&mapping.node_template_id) else {
                tracing::warn!(target = %target, "router target has no template, skipping");
                continue;
            };

            tracing::debug!(target = %template.node_name, step = *step_counter, "router step");
            self.runner
                .run_step(execution_id, mapping, template, &templates, context, *step_counter)
                .await?;
        }
        Ok(())
    }
}
