//! Notification dispatcher that only records what would be sent.
//!
//! Real transports (SMTP, WhatsApp business API, Combot) are deployment
//! specific. This dispatcher emits one `tracing` event per request and
//! reports every recipient as sent, which is what the CLI wires in.

use futures_util::future::BoxFuture;
use nodeflow_core::repository::notification::{DispatchError, NotificationDispatcher};
use nodeflow_types::notification::{DispatchReport, EmailRequest, TemplateBatch};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotificationDispatcher;

impl LoggingNotificationDispatcher {
    pub fn new() -> Self {
        Self
    }

    fn log_batch(channel: &'static str, batch: &TemplateBatch) -> DispatchReport {
        tracing::info!(
            channel,
            template = %batch.template,
            language = batch.language.as_deref().unwrap_or("default"),
            recipients = batch.recipients.len(),
            "notification batch dispatched"
        );
        DispatchReport::all_sent(batch.recipients.len())
    }
}

impl NotificationDispatcher for LoggingNotificationDispatcher {
    fn send_email(&self, request: EmailRequest) -> BoxFuture<'_, Result<DispatchReport, DispatchError>> {
        Box::pin(async move {
            tracing::info!(
                channel = "EMAIL",
                to = %request.to,
                subject = request.subject.as_deref().unwrap_or(""),
                template = request.template.as_deref().unwrap_or(""),
                "email dispatched"
            );
            Ok(DispatchReport::all_sent(1))
        })
    }

    fn send_whatsapp(&self, batch: TemplateBatch) -> BoxFuture<'_, Result<DispatchReport, DispatchError>> {
        Box::pin(async move { Ok(Self::log_batch("WHATSAPP", &batch)) })
    }

    fn send_combot(&self, batch: TemplateBatch) -> BoxFuture<'_, Result<DispatchReport, DispatchError>> {
        Box::pin(async move { Ok(Self::log_batch("COMBOT", &batch)) })
    }
}
