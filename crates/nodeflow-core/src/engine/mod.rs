//! Graph traversal.
//!
//! - `walk` -- [`WorkflowEngineService`], the single-path state machine
//! - `router` -- [`RouterService`], ordered fan-out over fixed targets
//! - `trigger` -- [`WorkflowTriggerService`], event-to-workflow dispatch
//! - `step` -- [`NodeRunner`], the node visit both walkers share

pub mod error;
pub mod router;
pub mod step;
pub mod trigger;
pub mod walk;

pub use error::{EngineError, RouterError};
pub use router::RouterService;
pub use step::NodeRunner;
pub use trigger::{TriggeredRun, WorkflowTriggerService};
pub use walk::{RunSummary, WorkflowEngineService};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nodeflow_types::config::TraversalConfig;
    use nodeflow_types::execution::{ExecutionLogStatus, ExecutionStatus};
    use nodeflow_types::workflow::{NodeTemplate, TemplateStatus, WorkflowBundle};
    use serde_json::{json, Value};

    use super::*;
    use crate::expression::WorkflowEvaluator;
    use crate::node::error_type;
    use crate::repository::execution_log::ExecutionLogRepository;
    use crate::test_support::{
        basic_registry, linear_bundle, runner, template, FailingLogRepository,
        InMemoryLogRepository, InMemoryWorkflowRepository, RecordingHttpStrategy,
    };
    use crate::workflow::routing::Termination;

    struct Harness<L: ExecutionLogRepository> {
        engine: WorkflowEngineService<InMemoryWorkflowRepository, L>,
        workflows: Arc<InMemoryWorkflowRepository>,
        logs: Arc<L>,
        http: Arc<RecordingHttpStrategy>,
    }

    fn harness_with<L: ExecutionLogRepository>(bundle: WorkflowBundle, logs: Arc<L>, max_steps: u32) -> Harness<L> {
        let workflows = Arc::new(InMemoryWorkflowRepository::with_bundle(bundle));
        let http = Arc::new(RecordingHttpStrategy::new("REST", json!({"status": 200})));
        let engine = WorkflowEngineService::new(
            Arc::clone(&workflows),
            runner(basic_registry(Arc::clone(&http)), Arc::clone(&logs)),
            Arc::new(WorkflowEvaluator::new()),
            &TraversalConfig { max_steps },
        );
        Harness {
            engine,
            workflows,
            logs,
            http,
        }
    }

    fn harness(bundle: WorkflowBundle) -> Harness<InMemoryLogRepository> {
        harness_with(bundle, Arc::new(InMemoryLogRepository::default()), 500)
    }

    fn seed_amount(routing: Value) -> NodeTemplate {
        template(
            "t-trigger",
            "start",
            "TRIGGER",
            json!({"outputDataPoints": [{"fieldName": "amount", "value": 100}], "routing": routing}),
        )
    }

    #[tokio::test]
    async fn trigger_then_transform_then_end() {
        let bundle = linear_bundle(
            "wf-tax",
            vec![
                seed_amount(json!({"type": "goto", "target_node": "tax"})),
                template(
                    "t-tax",
                    "tax",
                    "TRANSFORM",
                    json!({
                        "outputDataPoints": [{"fieldName": "amountWithTax", "compute": "amount * 1.18"}],
                        "routing": {"type": "end"}
                    }),
                ),
            ],
        );
        let h = harness(bundle);

        let summary = h.engine.run("wf-tax", json!({}), None).await.unwrap();

        assert_eq!(summary.context.get("amount"), Some(&json!(100)));
        assert_eq!(summary.context.get("amountWithTax"), Some(&json!(118.0)));
        assert_eq!(summary.termination, Termination::End);
        assert_eq!(summary.visited, vec!["start", "tax"]);

        let rows = h.logs.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.status == ExecutionLogStatus::Success));
        assert!(rows.iter().all(|r| r.workflow_execution_id == summary.execution_id));

        let execution = h.workflows.executions().pop().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.steps_executed, 2);
    }

    #[tokio::test]
    async fn false_http_condition_skips_the_request() {
        let bundle = linear_bundle(
            "wf-http",
            vec![
                seed_amount(json!({"type": "goto", "target_node": "call"})),
                template(
                    "t-http",
                    "call",
                    "HTTP_REQUEST",
                    json!({
                        "config": {"url": "https://pay.test", "condition": "amount > 1000"},
                        "routing": {"type": "end"}
                    }),
                ),
            ],
        );
        let h = harness(bundle);

        let summary = h.engine.run("wf-http", json!({}), None).await.unwrap();

        assert!(h.http.requests().is_empty());
        assert!(summary.context.get("httpResponse").is_none());
        let rows = h.logs.rows();
        assert_eq!(rows[1].status, ExecutionLogStatus::Skipped);
    }

    #[tokio::test]
    async fn switch_routes_by_value_and_stops_when_unmatched() {
        let switch = |status: &str| {
            linear_bundle(
                "wf-switch",
                vec![
                    template(
                        "t-start",
                        "start",
                        "TRIGGER",
                        json!({
                            "outputDataPoints": [{"fieldName": "status", "value": status}],
                            "routing": {"type": "switch", "expression": "status",
                                        "cases": [{"value": "A", "target_node": "X"}]}
                        }),
                    ),
                    template(
                        "t-x",
                        "X",
                        "TRANSFORM",
                        json!({"outputDataPoints": [{"fieldName": "reachedX", "value": true}]}),
                    ),
                ],
            )
        };

        let matched = harness(switch("A"));
        let summary = matched.engine.run("wf-switch", json!({}), None).await.unwrap();
        assert_eq!(summary.visited, vec!["start", "X"]);
        assert_eq!(summary.context.get("reachedX"), Some(&json!(true)));
        assert_eq!(summary.termination, Termination::NoRouting);

        let unmatched = harness(switch("B"));
        let summary = unmatched.engine.run("wf-switch", json!({}), None).await.unwrap();
        assert_eq!(summary.visited, vec!["start"]);
        assert_eq!(summary.termination, Termination::NoTarget);
        assert_eq!(summary.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn cyclic_graph_hits_the_step_guard() {
        let bundle = linear_bundle(
            "wf-loop",
            vec![
                template("t-a", "a", "TRANSFORM", json!({"routing": {"type": "goto", "target_node": "b"}})),
                template("t-b", "b", "TRANSFORM", json!({"routing": {"type": "goto", "target_node": "a"}})),
            ],
        );
        let h = harness(bundle);

        let err = h.engine.run("wf-loop", json!({}), None).await.unwrap_err();

        assert!(matches!(err, EngineError::StepLimitExceeded { limit: 500 }));
        assert_eq!(h.logs.rows().len(), 500);
        let execution = h.workflows.executions().pop().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.steps_executed, 500);
        assert!(execution.error_message.unwrap().contains("step limit"));
    }

    #[tokio::test]
    async fn step_guard_is_configurable() {
        let bundle = linear_bundle(
            "wf-self",
            vec![template("t-a", "a", "TRANSFORM", json!({"routing": {"type": "goto", "target_node": "a"}}))],
        );
        let h = harness_with(bundle, Arc::new(InMemoryLogRepository::default()), 3);
        let err = h.engine.run("wf-self", json!({}), None).await.unwrap_err();
        assert!(matches!(err, EngineError::StepLimitExceeded { limit: 3 }));
        assert_eq!(h.logs.rows().len(), 3);
    }

    #[tokio::test]
    async fn trigger_failure_aborts_and_marks_everything_failed() {
        let bundle = linear_bundle(
            "wf-bad",
            vec![
                template(
                    "t-start",
                    "start",
                    "TRIGGER",
                    json!({"outputDataPoints": [{"fieldName": "amount"}],
                           "routing": {"type": "goto", "target_node": "next"}}),
                ),
                template("t-next", "next", "TRANSFORM", json!({})),
            ],
        );
        let h = harness(bundle);

        let err = h.engine.run("wf-bad", json!({}), None).await.unwrap_err();

        assert!(matches!(err, EngineError::Node(_)));
        let rows = h.logs.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ExecutionLogStatus::Failed);
        assert_eq!(rows[0].error_type.as_deref(), Some(error_type::TRIGGER_ERROR));
        assert_eq!(h.workflows.executions()[0].status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn unsupported_node_type_is_logged_and_routing_continues() {
        let bundle = linear_bundle(
            "wf-unknown",
            vec![
                template("t-odd", "odd", "TELEPORT", json!({"routing": {"type": "goto", "target_node": "after"}})),
                template(
                    "t-after",
                    "after",
                    "TRANSFORM",
                    json!({"outputDataPoints": [{"fieldName": "sawError", "compute": "error != null"}]}),
                ),
            ],
        );
        let h = harness(bundle);

        let summary = h.engine.run("wf-unknown", json!({}), None).await.unwrap();

        let rows = h.logs.rows();
        assert_eq!(rows[0].status, ExecutionLogStatus::Failed);
        assert_eq!(rows[0].error_type.as_deref(), Some(error_type::UNSUPPORTED_NODE_TYPE));
        assert_eq!(summary.context.get("sawError"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn inactive_template_is_skipped_but_routed_past() {
        let mut inactive = template(
            "t-off",
            "off",
            "TRANSFORM",
            json!({"outputDataPoints": [{"fieldName": "ran", "value": true}],
                   "routing": {"type": "goto", "target_node": "last"}}),
        );
        inactive.status = TemplateStatus::Inactive;
        let bundle = linear_bundle(
            "wf-inactive",
            vec![
                inactive,
                template("t-last", "last", "TRANSFORM", json!({"outputDataPoints": [{"fieldName": "done", "value": 1}]})),
            ],
        );
        let h = harness(bundle);

        let summary = h.engine.run("wf-inactive", json!({}), None).await.unwrap();

        assert!(summary.context.get("ran").is_none());
        assert_eq!(summary.context.get("done"), Some(&json!(1)));
        assert_eq!(h.logs.rows()[0].status, ExecutionLogStatus::Skipped);
    }

    #[tokio::test]
    async fn missing_start_flag_falls_back_to_lowest_order() {
        let mut bundle = linear_bundle(
            "wf-order",
            vec![
                template("t-1", "first", "TRANSFORM", json!({"outputDataPoints": [{"fieldName": "x", "value": 1}]})),
                template("t-2", "second", "TRANSFORM", json!({})),
            ],
        );
        for mapping in &mut bundle.mappings {
            mapping.is_start_node = false;
        }
        bundle.mappings.reverse();
        let h = harness(bundle);

        let summary = h.engine.run("wf-order", json!({}), None).await.unwrap();
        assert_eq!(summary.visited, vec!["first"]);
    }

    #[tokio::test]
    async fn override_config_is_merged_before_dispatch() {
        let mut bundle = linear_bundle(
            "wf-override",
            vec![template(
                "t-1",
                "calc",
                "TRANSFORM",
                json!({"outputDataPoints": [{"fieldName": "rate", "value": 1}]}),
            )],
        );
        bundle.mappings[0].override_config =
            Some(json!({"outputDataPoints": [{"fieldName": "rate", "value": 2}]}).to_string());
        let h = harness(bundle);

        let summary = h.engine.run("wf-override", json!({}), None).await.unwrap();
        assert_eq!(summary.context.get("rate"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn audit_store_failure_does_not_abort_the_run() {
        let bundle = linear_bundle(
            "wf-audit",
            vec![seed_amount(json!({"type": "end"}))],
        );
        let h = harness_with(bundle, Arc::new(FailingLogRepository), 500);

        let summary = h.engine.run("wf-audit", json!({}), None).await.unwrap();
        assert_eq!(summary.status, ExecutionStatus::Completed);
        assert_eq!(summary.context.get("amount"), Some(&json!(100)));
    }

    #[tokio::test]
    async fn unknown_workflow_is_an_error() {
        let h = harness(linear_bundle("wf", vec![]));
        assert!(matches!(
            h.engine.run("nope", json!({}), None).await,
            Err(EngineError::WorkflowNotFound(_))
        ));
        assert!(matches!(
            h.engine.run("wf", json!({}), None).await,
            Err(EngineError::EmptyWorkflow(_))
        ));
    }
}
