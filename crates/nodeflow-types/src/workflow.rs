//! Workflow graph entities.
//!
//! A workflow is a set of institute-scoped [`NodeTemplate`]s connected by
//! [`WorkflowNodeMapping`]s. Templates carry the node kind and its default JSON
//! configuration; mappings place a template inside a specific workflow, give it
//! an order and optionally override parts of its configuration.
//!
//! All three entities are read-only at run time. The engine loads them as a
//! [`WorkflowBundle`] before walking the graph.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// The closed set of node kinds the engine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Trigger,
    Query,
    Transform,
    Action,
    HttpRequest,
    SendEmail,
    SendWhatsApp,
    Combot,
}

impl NodeType {
    /// Every node kind, in declaration order.
    pub const ALL: [NodeType; 8] = [
        NodeType::Trigger,
        NodeType::Query,
        NodeType::Transform,
        NodeType::Action,
        NodeType::HttpRequest,
        NodeType::SendEmail,
        NodeType::SendWhatsApp,
        NodeType::Combot,
    ];

    /// Canonical upper-case tag, as stored in `NodeTemplate.node_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Trigger => "TRIGGER",
            NodeType::Query => "QUERY",
            NodeType::Transform => "TRANSFORM",
            NodeType::Action => "ACTION",
            NodeType::HttpRequest => "HTTP_REQUEST",
            NodeType::SendEmail => "SEND_EMAIL",
            NodeType::SendWhatsApp => "SEND_WHATSAPP",
            NodeType::Combot => "COMBOT",
        }
    }

    /// Parse a node-type tag leniently.
    ///
    /// Matching ignores case and treats `-`, `_` and spaces as equivalent, so
    /// `HTTP_REQUEST`, `http-request` and `HttpRequest` all resolve to
    /// [`NodeType::HttpRequest`]. A few legacy short names are accepted too.
    pub fn from_tag(tag: &str) -> Option<NodeType> {
        let normalized: String = tag
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "trigger" => Some(NodeType::Trigger),
            "query" => Some(NodeType::Query),
            "transform" => Some(NodeType::Transform),
            "action" => Some(NodeType::Action),
            "httprequest" | "http" => Some(NodeType::HttpRequest),
            "sendemail" | "email" => Some(NodeType::SendEmail),
            "sendwhatsapp" | "whatsapp" => Some(NodeType::SendWhatsApp),
            "combot" => Some(NodeType::Combot),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Node template
// ---------------------------------------------------------------------------

/// Lifecycle status of a node template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateStatus {
    #[default]
    Active,
    Inactive,
}

/// Reusable, institute-scoped definition of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplate {
    pub id: String,
    /// Raw node-type tag. Parsed with [`NodeType::from_tag`] at dispatch time so
    /// that unknown tags survive loading and are reported by the engine.
    pub node_type: String,
    /// Name used by routing directives to address this node.
    pub node_name: String,
    /// Default JSON configuration. May be malformed; handlers parse defensively.
    pub config_json: String,
    pub institute_id: String,
    #[serde(default)]
    pub status: TemplateStatus,
}

impl NodeTemplate {
    /// The parsed node kind, if the tag is recognised.
    pub fn parsed_type(&self) -> Option<NodeType> {
        NodeType::from_tag(&self.node_type)
    }

    pub fn is_active(&self) -> bool {
        self.status == TemplateStatus::Active
    }
}

// ---------------------------------------------------------------------------
// Workflow + mapping
// ---------------------------------------------------------------------------

/// Lifecycle status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    #[default]
    Active,
    Inactive,
    Deleted,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Active => "ACTIVE",
            WorkflowStatus::Inactive => "INACTIVE",
            WorkflowStatus::Deleted => "DELETED",
        }
    }
}

/// A workflow owned by an institute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub institute_id: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Event key that activates this workflow through the trigger service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_event: Option<String>,
}

/// Places a node template inside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNodeMapping {
    #[serde(default)]
    pub workflow_id: String,
    pub node_template_id: String,
    #[serde(default)]
    pub node_order: i32,
    #[serde(default)]
    pub is_start_node: bool,
    /// JSON document deep-merged over the template's `config_json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_config: Option<String>,
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Everything the engine needs to walk one workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowBundle {
    pub workflow: Workflow,
    pub templates: Vec<NodeTemplate>,
    pub mappings: Vec<WorkflowNodeMapping>,
}

impl WorkflowBundle {
    /// Templates indexed by id.
    pub fn templates_by_id(&self) -> HashMap<String, NodeTemplate> {
        self.templates
            .iter()
            .map(|t| (t.id.clone(), t.clone()))
            .collect()
    }

    /// Mappings sorted by `node_order` (stable for equal orders).
    pub fn ordered_mappings(&self) -> Vec<&WorkflowNodeMapping> {
        let mut mappings: Vec<&WorkflowNodeMapping> = self.mappings.iter().collect();
        mappings.sort_by_key(|m| m.node_order);
        mappings
    }

    /// The mapping flagged as start node, if any.
    pub fn flagged_start(&self) -> Option<&WorkflowNodeMapping> {
        self.ordered_mappings().into_iter().find(|m| m.is_start_node)
    }

    /// Find the mapping whose template carries `node_name`.
    pub fn mapping_by_node_name(&self, node_name: &str) -> Option<&WorkflowNodeMapping> {
        let template_id = self
            .templates
            .iter()
            .find(|t| t.node_name == node_name)
            .map(|t| t.id.as_str())?;
        self.ordered_mappings()
            .into_iter()
            .find(|m| m.node_template_id == template_id)
    }

    /// Find the mapping for a template id.
    pub fn mapping_by_template_id(&self, template_id: &str) -> Option<&WorkflowNodeMapping> {
        self.mappings.iter().find(|m| m.node_template_id == template_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
