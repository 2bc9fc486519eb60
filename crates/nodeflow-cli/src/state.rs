//! Application state wiring all services together.
//!
//! The engine services are generic over their repositories; AppState pins
//! them to the SQLite implementations and registers every node handler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nodeflow_core::audit::{ContextSanitizer, ExecutionLogger};
use nodeflow_core::engine::{NodeRunner, RouterService, WorkflowEngineService, WorkflowTriggerService};
use nodeflow_core::expression::WorkflowEvaluator;
use nodeflow_core::node::action::ActionHandler;
use nodeflow_core::node::combot::CombotHandler;
use nodeflow_core::node::http_request::HttpRequestHandler;
use nodeflow_core::node::query::QueryHandler;
use nodeflow_core::node::send_email::SendEmailHandler;
use nodeflow_core::node::send_whatsapp::SendWhatsAppHandler;
use nodeflow_core::node::transform::TransformHandler;
use nodeflow_core::node::trigger::TriggerHandler;
use nodeflow_core::node::{NodeHandler, NodeHandlerRegistry};
use nodeflow_core::repository::error_reporter::TracingErrorReporter;
use nodeflow_core::repository::notification::NotificationDispatcher;
use nodeflow_core::repository::query::PrebuiltQueryService;
use nodeflow_core::service::{DedupeService, IdempotencyService};
use nodeflow_core::strategy::{ActionStrategyRegistry, HttpStrategyRegistry};
use nodeflow_infra::config::load_query_catalog;
use nodeflow_infra::http::rest::RestHttpStrategy;
use nodeflow_infra::notification::LoggingNotificationDispatcher;
use nodeflow_infra::sqlite::dedupe::SqliteDedupeRepository;
use nodeflow_infra::sqlite::execution_log::SqliteExecutionLogRepository;
use nodeflow_infra::sqlite::pool::{database_url, DatabasePool};
use nodeflow_infra::sqlite::query::SqlitePrebuiltQueryService;
use nodeflow_infra::sqlite::workflow::SqliteWorkflowRepository;
use nodeflow_types::config::EngineConfig;

pub type ConcreteEngine = WorkflowEngineService<SqliteWorkflowRepository, SqliteExecutionLogRepository>;
pub type ConcreteRouter = RouterService<SqliteExecutionLogRepository>;
pub type ConcreteTrigger = WorkflowTriggerService<SqliteWorkflowRepository, SqliteExecutionLogRepository>;

pub struct AppState {
    pub workflows: Arc<SqliteWorkflowRepository>,
    pub logs: Arc<SqliteExecutionLogRepository>,
    pub engine: Arc<ConcreteEngine>,
    pub router: ConcreteRouter,
    pub trigger: ConcreteTrigger,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Open the database under `data_dir` and wire the engine.
    pub async fn init(data_dir: PathBuf, config: &EngineConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let workflows = Arc::new(SqliteWorkflowRepository::new(db_pool.clone()));
        let logs = Arc::new(SqliteExecutionLogRepository::new(db_pool.clone()));
        let catalog = load_query_catalog(&data_dir).await;
        let queries: Arc<dyn PrebuiltQueryService> =
            Arc::new(SqlitePrebuiltQueryService::new(db_pool.clone(), catalog));
        let dedupe = DedupeService::new(Arc::new(SqliteDedupeRepository::new(db_pool)));

        let evaluator = Arc::new(WorkflowEvaluator::new());
        let registry = build_registry(config, &evaluator, queries, dedupe);

        let logger = ExecutionLogger::new(
            Arc::clone(&logs),
            ContextSanitizer::new(&config.audit),
            Arc::new(TracingErrorReporter),
        );
        let runner = NodeRunner::new(Arc::new(registry), Arc::new(logger));

        let engine = Arc::new(WorkflowEngineService::new(
            Arc::clone(&workflows),
            runner.clone(),
            evaluator,
            &config.engine,
        ));
        let router = RouterService::new(runner, &config.router);
        let idempotency = Arc::new(IdempotencyService::new(Duration::from_secs(
            config.idempotency.ttl_secs,
        )));
        let trigger = WorkflowTriggerService::new(Arc::clone(&engine), idempotency);

        Ok(Self {
            workflows,
            logs,
            engine,
            router,
            trigger,
            data_dir,
        })
    }
}

/// One handler per node type, backed by the infra collaborators.
fn build_registry(
    config: &EngineConfig,
    evaluator: &Arc<WorkflowEvaluator>,
    queries: Arc<dyn PrebuiltQueryService>,
    dedupe: DedupeService,
) -> NodeHandlerRegistry {
    let dispatcher: Arc<dyn NotificationDispatcher> = Arc::new(LoggingNotificationDispatcher::new());

    let mut http = HttpStrategyRegistry::new();
    http.register(Arc::new(RestHttpStrategy::new(&config.http)));
    let actions = ActionStrategyRegistry::with_builtins(Arc::clone(evaluator), Some(Arc::clone(&queries)));

    let handlers: Vec<Arc<dyn NodeHandler>> = vec![
        Arc::new(TriggerHandler::new(Arc::clone(evaluator))),
        Arc::new(QueryHandler::new(queries, Arc::clone(evaluator))),
        Arc::new(TransformHandler::new(Arc::clone(evaluator))),
        Arc::new(SendEmailHandler::new(
            Arc::clone(&dispatcher),
            Arc::clone(evaluator),
            Some(dedupe.clone()),
        )),
        Arc::new(SendWhatsAppHandler::new(
            Arc::clone(&dispatcher),
            Arc::clone(evaluator),
            Some(dedupe.clone()),
        )),
        Arc::new(CombotHandler::new(dispatcher, Arc::clone(evaluator), Some(dedupe))),
        Arc::new(HttpRequestHandler::new(Arc::new(http), Arc::clone(evaluator))),
        Arc::new(ActionHandler::new(Arc::new(actions))),
    ];

    let mut registry = NodeHandlerRegistry::new();
    registry.register_all(handlers);
    tracing::debug!(handlers = registry.len(), "node handler registry built");
    registry
}
