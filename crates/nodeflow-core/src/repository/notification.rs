//! Notification dispatch collaborator.
//!
//! Transport details (SMTP, WhatsApp business API, Combot) are outside the
//! engine. Handlers only build requests and read back a [`DispatchReport`].

use futures_util::future::BoxFuture;
use nodeflow_types::notification::{DispatchReport, EmailRequest, TemplateBatch};

#[derive(Debug, Clone, thiserror::Error)]
#[error("dispatch failed: {0}")]
pub struct DispatchError(pub String);

pub trait NotificationDispatcher: Send + Sync {
    fn send_email(&self, request: EmailRequest) -> BoxFuture<'_, Result<DispatchReport, DispatchError>>;

    fn send_whatsapp(&self, batch: TemplateBatch) -> BoxFuture<'_, Result<DispatchReport, DispatchError>>;

    fn send_combot(&self, batch: TemplateBatch) -> BoxFuture<'_, Result<DispatchReport, DispatchError>>;
}
