//! In-memory fakes for the repository and collaborator traits.

use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use nodeflow_types::error::RepositoryError;
use nodeflow_types::execution::{
    DedupeRecord, ExecutionStatus, LogCompletion, WorkflowExecution, WorkflowExecutionLog,
};
use nodeflow_types::notification::{DispatchReport, EmailRequest, TemplateBatch};
use nodeflow_types::workflow::{
    NodeTemplate, TemplateStatus, Workflow, WorkflowBundle, WorkflowNodeMapping, WorkflowStatus,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::audit::{ContextSanitizer, ExecutionLogger};
use crate::engine::NodeRunner;
use crate::expression::WorkflowEvaluator;
use crate::node::http_request::HttpRequestHandler;
use crate::node::transform::TransformHandler;
use crate::node::trigger::TriggerHandler;
use crate::node::{NodeHandler, NodeHandlerRegistry};
use crate::repository::dedupe::DedupeRepository;
use crate::repository::error_reporter::{ErrorReporter, TracingErrorReporter};
use crate::repository::execution_log::ExecutionLogRepository;
use crate::repository::notification::{DispatchError, NotificationDispatcher};
use crate::repository::query::{PrebuiltQueryService, QueryError};
use crate::repository::workflow::WorkflowRepository;
use crate::strategy::http::{HttpRequest, HttpRequestStrategy, HttpStrategyRegistry};

// ---------------------------------------------------------------------------
// Execution logs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryLogRepository {
    rows: Mutex<Vec<WorkflowExecutionLog>>,
}

impl InMemoryLogRepository {
    pub fn rows(&self) -> Vec<WorkflowExecutionLog> {
        self.rows.lock().unwrap().clone()
    }
}

impl ExecutionLogRepository for InMemoryLogRepository {
    async fn create_log(&self, log: &WorkflowExecutionLog) -> Result<(), RepositoryError> {
        self.rows.lock().unwrap().push(log.clone());
        Ok(())
    }

    async fn complete_log(
        &self,
        log_id: &Uuid,
        completion: &LogCompletion,
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == *log_id)
            .ok_or(RepositoryError::NotFound)?;
        if row.status.is_terminal() {
            return Err(RepositoryError::Conflict(format!(
                "log {log_id} is already {}",
                row.status
            )));
        }
        row.status = completion.status;
        row.completed_at = Some(completion.completed_at);
        row.execution_time_ms = Some(completion.execution_time_ms);
        row.details_json = completion.details_json.clone();
        row.error_message = completion.error_message.clone();
        row.error_type = completion.error_type.clone();
        Ok(())
    }

    async fn list_logs(&self, execution_id: &Uuid) -> Result<Vec<WorkflowExecutionLog>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.workflow_execution_id == *execution_id)
            .cloned()
            .collect())
    }
}

/// Every call fails, as if the audit store were down.
pub struct FailingLogRepository;

impl ExecutionLogRepository for FailingLogRepository {
    async fn create_log(&self, _log: &WorkflowExecutionLog) -> Result<(), RepositoryError> {
        Err(RepositoryError::Query("audit store unavailable".into()))
    }

    async fn complete_log(
        &self,
        _log_id: &Uuid,
        _completion: &LogCompletion,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Query("audit store unavailable".into()))
    }

    async fn list_logs(&self, _execution_id: &Uuid) -> Result<Vec<WorkflowExecutionLog>, RepositoryError> {
        Err(RepositoryError::Query("audit store unavailable".into()))
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(String, String)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, operation: &str, error: &(dyn Error + 'static)) {
        self.reports
            .lock()
            .unwrap()
            .push((operation.to_string(), error.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Workflows and executions
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    bundles: Mutex<HashMap<String, WorkflowBundle>>,
    executions: Mutex<Vec<WorkflowExecution>>,
}

impl InMemoryWorkflowRepository {
    pub fn with_bundle(bundle: WorkflowBundle) -> Self {
        let repo = Self::default();
        repo.bundles
            .lock()
            .unwrap()
            .insert(bundle.workflow.id.clone(), bundle);
        repo
    }

    pub fn executions(&self) -> Vec<WorkflowExecution> {
        self.executions.lock().unwrap().clone()
    }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save_bundle(&self, bundle: &WorkflowBundle) -> Result<(), RepositoryError> {
        self.bundles
            .lock()
            .unwrap()
            .insert(bundle.workflow.id.clone(), bundle.clone());
        Ok(())
    }

    async fn load_bundle(&self, workflow_id: &str) -> Result<Option<WorkflowBundle>, RepositoryError> {
        Ok(self.bundles.lock().unwrap().get(workflow_id).cloned())
    }

    async fn list_workflows(&self, institute_id: Option<&str>) -> Result<Vec<Workflow>, RepositoryError> {
        let mut workflows: Vec<Workflow> = self
            .bundles
            .lock()
            .unwrap()
            .values()
            .map(|b| b.workflow.clone())
            .filter(|w| institute_id.is_none_or(|i| w.institute_id == i))
            .collect();
        workflows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(workflows)
    }

    async fn find_active_by_event(
        &self,
        institute_id: &str,
        event_key: &str,
    ) -> Result<Vec<Workflow>, RepositoryError> {
        let workflows = self.list_workflows(Some(institute_id)).await?;
        Ok(workflows
            .into_iter()
            .filter(|w| w.status == WorkflowStatus::Active)
            .filter(|w| w.trigger_event.as_deref() == Some(event_key))
            .collect())
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        self.executions.lock().unwrap().push(execution.clone());
        Ok(())
    }

    async fn finish_execution(
        &self,
        execution_id: &Uuid,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
        steps_executed: u32,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut executions = self.executions.lock().unwrap();
        let execution = executions
            .iter_mut()
            .find(|e| e.id == *execution_id)
            .ok_or(RepositoryError::NotFound)?;
        execution.status = status;
        execution.completed_at = Some(completed_at);
        execution.steps_executed = steps_executed;
        execution.error_message = error.map(str::to_string);
        Ok(())
    }

    async fn get_execution(&self, execution_id: &Uuid) -> Result<Option<WorkflowExecution>, RepositoryError> {
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == *execution_id)
            .cloned())
    }

    async fn list_executions(
        &self,
        workflow_id: &str,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| e.workflow_id == workflow_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Dedupe
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryDedupeRepository {
    records: Mutex<HashMap<String, DedupeRecord>>,
}

impl DedupeRepository for InMemoryDedupeRepository {
    fn exists<'a>(&'a self, operation_key: &'a str) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(async move { Ok(self.records.lock().unwrap().contains_key(operation_key)) })
    }

    fn insert<'a>(&'a self, record: &'a DedupeRecord) -> BoxFuture<'a, Result<bool, RepositoryError>> {
        Box::pin(async move {
            let mut records = self.records.lock().unwrap();
            if records.contains_key(&record.operation_key) {
                return Ok(false);
            }
            records.insert(record.operation_key.clone(), record.clone());
            Ok(true)
        })
    }
}

// ---------------------------------------------------------------------------
// Prebuilt queries
// ---------------------------------------------------------------------------

/// Answers each known key with a fixed row and records every call.
#[derive(Default)]
pub struct StaticQueryService {
    rows: HashMap<String, Map<String, Value>>,
    failing: Vec<String>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl StaticQueryService {
    pub fn with(key: &str, row: Value) -> Self {
        let mut service = Self::default();
        service
            .rows
            .insert(key.to_string(), row.as_object().cloned().unwrap_or_default());
        service
    }

    /// A service whose `key` is known but always fails.
    pub fn failing(key: &str) -> Self {
        Self {
            failing: vec![key.to_string()],
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PrebuiltQueryService for StaticQueryService {
    fn has_query(&self, key: &str) -> bool {
        self.rows.contains_key(key) || self.failing.iter().any(|k| k == key)
    }

    fn execute<'a>(
        &'a self,
        key: &'a str,
        params: Map<String, Value>,
    ) -> BoxFuture<'a, Result<Map<String, Value>, QueryError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push((key.to_string(), params));
            if self.failing.iter().any(|k| k == key) {
                return Err(QueryError::Failed {
                    key: key.to_string(),
                    message: "database timeout".to_string(),
                });
            }
            self.rows
                .get(key)
                .cloned()
                .ok_or_else(|| QueryError::UnknownQuery(key.to_string()))
        })
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Returns a canned response and records every request.
pub struct RecordingHttpStrategy {
    name: String,
    response: Map<String, Value>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingHttpStrategy {
    pub fn new(name: &str, response: Value) -> Self {
        Self {
            name: name.to_string(),
            response: response.as_object().cloned().unwrap_or_default(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpRequestStrategy for RecordingHttpStrategy {
    fn request_type(&self) -> &str {
        &self.name
    }

    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Map<String, Value>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            self.response.clone()
        })
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Records every request; selected recipients or templates fail.
#[derive(Default)]
pub struct RecordingDispatcher {
    failing_recipients: Vec<String>,
    failing_templates: Vec<String>,
    emails: Mutex<Vec<EmailRequest>>,
    whatsapp: Mutex<Vec<TemplateBatch>>,
    combot: Mutex<Vec<TemplateBatch>>,
}

impl RecordingDispatcher {
    pub fn failing_recipient(mut self, to: &str) -> Self {
        self.failing_recipients.push(to.to_string());
        self
    }

    pub fn failing_template(mut self, template: &str) -> Self {
        self.failing_templates.push(template.to_string());
        self
    }

    pub fn emails(&self) -> Vec<EmailRequest> {
        self.emails.lock().unwrap().clone()
    }

    pub fn whatsapp(&self) -> Vec<TemplateBatch> {
        self.whatsapp.lock().unwrap().clone()
    }

    pub fn combot(&self) -> Vec<TemplateBatch> {
        self.combot.lock().unwrap().clone()
    }

    fn batch_report(&self, batch: &TemplateBatch) -> Result<DispatchReport, DispatchError> {
        if self.failing_templates.contains(&batch.template) {
            return Err(DispatchError(format!("template '{}' rejected", batch.template)));
        }
        Ok(DispatchReport::all_sent(batch.recipients.len()))
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn send_email(&self, request: EmailRequest) -> BoxFuture<'_, Result<DispatchReport, DispatchError>> {
        Box::pin(async move {
            let failing = self.failing_recipients.contains(&request.to);
            let to = request.to.clone();
            self.emails.lock().unwrap().push(request);
            if failing {
                return Err(DispatchError(format!("mailbox {to} unavailable")));
            }
            Ok(DispatchReport::all_sent(1))
        })
    }

    fn send_whatsapp(&self, batch: TemplateBatch) -> BoxFuture<'_, Result<DispatchReport, DispatchError>> {
        Box::pin(async move {
            let report = self.batch_report(&batch);
            self.whatsapp.lock().unwrap().push(batch);
            report
        })
    }

    fn send_combot(&self, batch: TemplateBatch) -> BoxFuture<'_, Result<DispatchReport, DispatchError>> {
        Box::pin(async move {
            let report = self.batch_report(&batch);
            self.combot.lock().unwrap().push(batch);
            report
        })
    }
}

// ---------------------------------------------------------------------------
// Workflow fixtures
// ---------------------------------------------------------------------------

pub const INSTITUTE: &str = "inst-1";
pub const FEE_EVENT: &str = "fee.due";

pub fn template(id: &str, name: &str, node_type: &str, config: Value) -> NodeTemplate {
    NodeTemplate {
        id: id.to_string(),
        node_type: node_type.to_string(),
        node_name: name.to_string(),
        config_json: config.to_string(),
        institute_id: INSTITUTE.to_string(),
        status: TemplateStatus::Active,
    }
}

pub fn mapping(workflow_id: &str, template_id: &str, order: i32, start: bool) -> WorkflowNodeMapping {
    WorkflowNodeMapping {
        workflow_id: workflow_id.to_string(),
        node_template_id: template_id.to_string(),
        node_order: order,
        is_start_node: start,
        override_config: None,
    }
}

/// A bundle whose mappings follow template order, the first flagged start.
pub fn linear_bundle(workflow_id: &str, templates: Vec<NodeTemplate>) -> WorkflowBundle {
    let mappings = templates
        .iter()
        .enumerate()
        .map(|(i, t)| mapping(workflow_id, &t.id, i as i32 + 1, i == 0))
        .collect();
    WorkflowBundle {
        workflow: Workflow {
            id: workflow_id.to_string(),
            institute_id: INSTITUTE.to_string(),
            status: WorkflowStatus::Active,
            name: format!("workflow {workflow_id}"),
            description: None,
            trigger_event: Some(FEE_EVENT.to_string()),
        },
        templates,
        mappings,
    }
}

/// Trigger, Transform and HttpRequest handlers over one evaluator.
pub fn basic_registry(http: Arc<RecordingHttpStrategy>) -> Arc<NodeHandlerRegistry> {
    let evaluator = Arc::new(WorkflowEvaluator::new());
    let mut strategies = HttpStrategyRegistry::new();
    strategies.register(http);

    let mut registry = NodeHandlerRegistry::new();
    registry.register_all([
        Arc::new(TriggerHandler::new(Arc::clone(&evaluator))) as Arc<dyn NodeHandler>,
        Arc::new(TransformHandler::new(Arc::clone(&evaluator))),
        Arc::new(HttpRequestHandler::new(Arc::new(strategies), evaluator)),
    ]);
    Arc::new(registry)
}

pub fn runner<L: ExecutionLogRepository>(
    registry: Arc<NodeHandlerRegistry>,
    logs: Arc<L>,
) -> NodeRunner<L> {
    let logger = ExecutionLogger::new(
        logs,
        ContextSanitizer::default(),
        Arc::new(TracingErrorReporter),
    );
    NodeRunner::new(registry, Arc::new(logger))
}
