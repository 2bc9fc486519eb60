//! Iterate-evaluate-dispatch loop shared by the notification handlers.
//!
//! ```json
//! {"on": "students",
//!  "eval": "{to: item.phone, template: 'fee_due', params: {name: item.name}}",
//!  "dedupeKey": "'fee_due:' + (item.id|str) + ':' + month",
//!  "resultKey": "reminders"}
//! ```
//!
//! `on` yields the collection (a scalar is one item, null is none). For each
//! item, bound as `item`, the message expression is chosen and evaluated: an
//! object is one message, a list is several, null skips the item.
//!
//! The message expression is `eval`, or a switch:
//! - `forEach: {operation: "switch", on, cases: {value: expr}, default}`
//!   evaluates `on` per item and picks the case by its string form;
//! - top-level `operation: "switch"` does the same with `eval` as the switch
//!   expression and top-level `cases` / `default`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use nodeflow_types::execution::ExecutionLogStatus;
use nodeflow_types::notification::DispatchReport;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::send_email::to_email_requests;
use super::send_whatsapp::group_by_template;
use super::{as_items, error_type, parse_config, NodeFailure, NodeOutcome};
use crate::expression::{to_display_string, WorkflowEvaluator};
use crate::repository::notification::NotificationDispatcher;
use crate::service::DedupeService;
use crate::workflow::context::{ERROR, EXECUTION_ID};
use crate::workflow::ExecutionContext;

const SWITCH: &str = "switch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    Email,
    WhatsApp,
    Combot,
}

impl Channel {
    fn as_str(self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::WhatsApp => "whatsapp",
            Channel::Combot => "combot",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IterationConfig {
    #[serde(default)]
    operation: Option<String>,
    on: String,
    #[serde(default)]
    eval: Option<String>,
    #[serde(default)]
    for_each: Option<SwitchSpec>,
    #[serde(default)]
    cases: HashMap<String, String>,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    dedupe_key: Option<String>,
    #[serde(default)]
    result_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SwitchSpec {
    #[serde(default)]
    operation: Option<String>,
    on: String,
    #[serde(default)]
    cases: HashMap<String, String>,
    #[serde(default)]
    default: Option<String>,
}

/// One message, plus the dedupe key of the item that produced it.
#[derive(Debug, Clone)]
pub(crate) struct OutgoingMessage {
    pub payload: Map<String, Value>,
    pub dedupe_key: Option<String>,
}

/// Outcome of one dispatcher call.
struct DispatchUnit {
    report: DispatchReport,
    keys: Vec<String>,
}

/// Collaborators of the notification handlers.
#[derive(Clone)]
pub(crate) struct Messenger {
    pub evaluator: Arc<WorkflowEvaluator>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub dedupe: Option<DedupeService>,
}

impl Messenger {
    pub async fn run(&self, channel: Channel, context: &ExecutionContext, config_json: &str) -> NodeOutcome {
        let config: IterationConfig = match parse_config(config_json) {
            Ok(c) => c,
            Err(message) => return NodeOutcome::failed(message, error_type::INVALID_CONFIG),
        };

        let items = match self.evaluator.evaluate_value(&config.on, context.as_map()) {
            Ok(v) => as_items(v),
            Err(e) => {
                return NodeOutcome::failed(
                    format!("'on' failed: {e}"),
                    error_type::EXPRESSION_ERROR,
                )
            }
        };
        let item_count = items.len();

        let mut messages = Vec::new();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut skipped_duplicates = 0usize;
        let mut invalid = 0usize;
        let mut errors = Vec::new();

        for item in items {
            let scoped = context.with_item(item);
            let vars = scoped.as_map();

            let dedupe_key = match &config.dedupe_key {
                Some(expr) => match self.evaluator.evaluate_value(expr, vars) {
                    Ok(Value::Null) => None,
                    Ok(v) => Some(to_display_string(&v)),
                    Err(e) => {
                        return NodeOutcome::failed(
                            format!("'dedupeKey' failed: {e}"),
                            error_type::EXPRESSION_ERROR,
                        )
                    }
                },
                None => None,
            };
            if let Some(key) = &dedupe_key {
                // Keys repeat within one run as well as across runs.
                if claimed.contains(key) || self.already_sent(key).await {
                    skipped_duplicates += 1;
                    continue;
                }
            }

            let produced = match self.evaluate_messages(&config, &scoped) {
                Ok(v) => v,
                Err(message) => return NodeOutcome::failed(message, error_type::EXPRESSION_ERROR),
            };
            for value in produced {
                match value {
                    Value::Object(payload) => {
                        if let Some(key) = &dedupe_key {
                            claimed.insert(key.clone());
                        }
                        messages.push(OutgoingMessage {
                            payload,
                            dedupe_key: dedupe_key.clone(),
                        })
                    }
                    Value::Null => {}
                    other => {
                        invalid += 1;
                        errors.push(format!("message is not an object: {other}"));
                    }
                }
            }
        }

        let message_count = messages.len() + invalid;
        let units = self.dispatch(channel, messages).await;
        let batches = units.len();

        let mut report = DispatchReport {
            sent: 0,
            failed: invalid,
            errors,
        };
        let mut succeeded_keys = HashSet::new();
        let mut failed_keys = HashSet::new();
        for unit in units {
            let clean = unit.report.failed == 0;
            report.absorb(unit.report);
            let target = if clean {
                &mut succeeded_keys
            } else {
                &mut failed_keys
            };
            target.extend(unit.keys);
        }
        self.record_sent(context, succeeded_keys.difference(&failed_keys)).await;

        let details = json!({
            "channel": channel.as_str(),
            "items": item_count,
            "messages": message_count,
            "sent": report.sent,
            "failed": report.failed,
            "skippedDuplicates": skipped_duplicates,
            "batches": batches,
        });

        let mut changes = Map::new();
        if let Some(key) = &config.result_key {
            changes.insert(key.clone(), details.clone());
        }

        let status = if report.failed == 0 {
            ExecutionLogStatus::Success
        } else if report.sent == 0 {
            ExecutionLogStatus::Failed
        } else {
            ExecutionLogStatus::PartialSuccess
        };
        tracing::debug!(
            channel = channel.as_str(),
            items = item_count,
            sent = report.sent,
            failed = report.failed,
            skipped_duplicates,
            "notification node dispatched"
        );

        if report.failed == 0 {
            return NodeOutcome::success(changes).with_details(details);
        }

        let message = if report.errors.is_empty() {
            format!("{} of {} messages failed", report.failed, report.sent + report.failed)
        } else {
            report.errors.join("; ")
        };
        if status == ExecutionLogStatus::Failed {
            changes.insert(ERROR.to_string(), Value::String(message.clone()));
        }
        NodeOutcome {
            changes,
            status,
            details: Some(details),
            error: Some(NodeFailure {
                message,
                error_type: error_type::NOTIFICATION_ERROR.to_string(),
            }),
        }
    }

    /// Choose and evaluate the message expression for one item.
    fn evaluate_messages(
        &self,
        config: &IterationConfig,
        scoped: &ExecutionContext,
    ) -> Result<Vec<Value>, String> {
        let vars = scoped.as_map();
        let is_switch = |op: &Option<String>| {
            op.as_deref()
                .is_some_and(|o| o.trim().eq_ignore_ascii_case(SWITCH))
        };

        let expression = if let Some(spec) = &config.for_each {
            if spec.operation.is_some() && !is_switch(&spec.operation) {
                return Err(format!(
                    "unsupported forEach operation '{}'",
                    spec.operation.as_deref().unwrap_or_default()
                ));
            }
            let selector = self
                .evaluator
                .evaluate_value(&spec.on, vars)
                .map_err(|e| format!("forEach 'on' failed: {e}"))?;
            select_case(&spec.cases, spec.default.as_ref(), &selector)
        } else if is_switch(&config.operation) {
            let Some(selector_expr) = &config.eval else {
                return Err("switch operation needs 'eval'".to_string());
            };
            let selector = self
                .evaluator
                .evaluate_value(selector_expr, vars)
                .map_err(|e| format!("switch 'eval' failed: {e}"))?;
            select_case(&config.cases, config.default.as_ref(), &selector)
        } else {
            config.eval.clone()
        };

        let value = match expression {
            Some(expr) => self
                .evaluator
                .evaluate_value(&expr, vars)
                .map_err(|e| format!("'eval' failed: {e}"))?,
            // No expression: the item itself is the message.
            None if config.for_each.is_none() && !is_switch(&config.operation) => {
                scoped.get(crate::workflow::context::ITEM).cloned().unwrap_or(Value::Null)
            }
            None => Value::Null,
        };
        Ok(as_items(value))
    }

    async fn already_sent(&self, key: &str) -> bool {
        let Some(dedupe) = &self.dedupe else {
            return false;
        };
        match dedupe.seen(key).await {
            Ok(seen) => seen,
            Err(e) => {
                tracing::warn!(operation_key = key, error = %e, "dedupe lookup failed, sending anyway");
                false
            }
        }
    }

    async fn record_sent<'k>(
        &self,
        context: &ExecutionContext,
        keys: impl Iterator<Item = &'k String>,
    ) {
        let Some(dedupe) = &self.dedupe else {
            return;
        };
        let execution_id = context
            .get(EXECUTION_ID)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok());
        for key in keys {
            if let Err(e) = dedupe.record(key, execution_id).await {
                tracing::warn!(operation_key = %key, error = %e, "failed to record dedupe key");
            }
        }
    }

    async fn dispatch(&self, channel: Channel, messages: Vec<OutgoingMessage>) -> Vec<DispatchUnit> {
        let mut units = Vec::new();
        match channel {
            Channel::Email => {
                for message in messages {
                    let keys: Vec<String> = message.dedupe_key.iter().cloned().collect();
                    let requests = match to_email_requests(&message.payload) {
                        Ok(requests) => requests,
                        Err(e) => {
                            units.push(DispatchUnit {
                                report: failed_report(1)(e),
                                keys,
                            });
                            continue;
                        }
                    };
                    for request in requests {
                        let report = self
                            .dispatcher
                            .send_email(request)
                            .await
                            .unwrap_or_else(failed_report(1));
                        units.push(DispatchUnit {
                            report,
                            keys: keys.clone(),
                        });
                    }
                }
            }
            Channel::WhatsApp | Channel::Combot => {
                let (batches, rejected) = group_by_template(messages);
                for (message, error) in rejected {
                    units.push(DispatchUnit {
                        report: failed_report(1)(error),
                        keys: message.dedupe_key.into_iter().collect(),
                    });
                }
                for (batch, keys) in batches {
                    let size = batch.recipients.len();
                    let sent = if channel == Channel::WhatsApp {
                        self.dispatcher.send_whatsapp(batch).await
                    } else {
                        self.dispatcher.send_combot(batch).await
                    };
                    units.push(DispatchUnit {
                        report: sent.unwrap_or_else(failed_report(size)),
                        keys,
                    });
                }
            }
        }
        units
    }
}

/// Pick the case expression whose key equals the selector's string form.
fn select_case(
    cases: &HashMap<String, String>,
    default: Option<&String>,
    selector: &Value,
) -> Option<String> {
    cases
        .get(&to_display_string(selector))
        .or(default)
        .cloned()
}

/// A report marking `count` messages failed with the given error.
fn failed_report<E: std::fmt::Display>(count: usize) -> impl Fn(E) -> DispatchReport {
    move |error| DispatchReport {
        sent: 0,
        failed: count,
        errors: vec![error.to_string()],
    }
}
