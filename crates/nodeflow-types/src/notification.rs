//! Outgoing notification payloads handed to the dispatch collaborator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single email, addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// One recipient of a templated message batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecipient {
    pub to: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// All recipients of one template, sent in a single request.
///
/// Used for both WhatsApp and Combot channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateBatch {
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub recipients: Vec<TemplateRecipient>,
}

/// What the dispatcher reports back for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl DispatchReport {
    pub fn all_sent(count: usize) -> Self {
        Self {
            sent: count,
            failed: 0,
            errors: Vec::new(),
        }
    }

    pub fn absorb(&mut self, other: DispatchReport) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }
}
