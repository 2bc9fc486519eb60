//! Node-type to handler resolution.

use std::collections::HashMap;
use std::sync::Arc;

use nodeflow_types::workflow::NodeType;

use super::NodeHandler;

/// Registry of node handlers, indexed by [`NodeType`].
///
/// Lookups never fail loudly: an unknown tag or a type with no handler
/// returns `None` and logs a warning.
#[derive(Default)]
pub struct NodeHandlerRegistry {
    by_type: HashMap<NodeType, Arc<dyn NodeHandler>>,
    /// Registration order, used for `supports` probing.
    handlers: Vec<Arc<dyn NodeHandler>>,
}

impl NodeHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own node type.
    ///
    /// A second handler for the same type is rejected; the first one stays.
    /// Returns whether the handler was accepted.
    pub fn register(&mut self, handler: Arc<dyn NodeHandler>) -> bool {
        let node_type = handler.node_type();
        if self.by_type.contains_key(&node_type) {
            tracing::warn!(
                node_type = %node_type,
                "duplicate node handler registration ignored"
            );
            return false;
        }
        self.by_type.insert(node_type, Arc::clone(&handler));
        self.handlers.push(handler);
        true
    }

    pub fn register_all(&mut self, handlers: impl IntoIterator<Item = Arc<dyn NodeHandler>>) {
        for handler in handlers {
            self.register(handler);
        }
    }

    /// Resolve a stored node-type tag to its handler.
    pub fn get_handler(&self, tag: &str) -> Option<Arc<dyn NodeHandler>> {
        let Some(node_type) = NodeType::from_tag(tag) else {
            tracing::warn!(node_type = tag, "unknown node type tag");
            return None;
        };
        let handler = self.get(node_type);
        if handler.is_none() {
            tracing::warn!(node_type = %node_type, "no handler registered for node type");
        }
        handler
    }

    /// Fast path by exact registration, then probe every handler's `supports`.
    pub fn get(&self, node_type: NodeType) -> Option<Arc<dyn NodeHandler>> {
        if let Some(handler) = self.by_type.get(&node_type) {
            return Some(Arc::clone(handler));
        }
        self.handlers
            .iter()
            .find(|h| h.supports(node_type))
            .cloned()
    }

    /// Node types that resolve to some handler.
    pub fn supported_types(&self) -> Vec<NodeType> {
        NodeType::ALL
            .into_iter()
            .filter(|t| self.get(*t).is_some())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use futures_util::future::BoxFuture;
    use nodeflow_types::workflow::NodeTemplate;
    use serde_json::{Map, Value};

    use crate::node::{NodeError, NodeOutcome};
    use crate::workflow::ExecutionContext;

    /// Handler that stamps its label into the changes.
    struct Labelled {
        node_type: NodeType,
        also: Option<NodeType>,
        label: &'static str,
    }

    impl NodeHandler for Labelled {
        fn node_type(&self) -> NodeType {
            self.node_type
        }

        fn supports(&self, node_type: NodeType) -> bool {
            node_type == self.node_type || Some(node_type) == self.also
        }

        fn handle<'a>(
            &'a self,
            _context: &'a ExecutionContext,
            _config_json: &'a str,
            _templates: &'a HashMap<String, NodeTemplate>,
            _step: u32,
        ) -> BoxFuture<'a, Result<NodeOutcome, NodeError>> {
            Box::pin(async move {
                let mut changes = Map::new();
                changes.insert("handledBy".to_string(), Value::from(self.label));
                Ok(NodeOutcome::success(changes))
            })
        }
    }

    fn labelled(node_type: NodeType, label: &'static str) -> Arc<dyn NodeHandler> {
        Arc::new(Labelled {
            node_type,
            also: None,
            label,
        })
    }

    #[test]
    fn resolves_tags_leniently() {
        let mut registry = NodeHandlerRegistry::new();
        registry.register(labelled(NodeType::HttpRequest, "http"));
        assert!(registry.get_handler("HTTP_REQUEST").is_some());
        assert!(registry.get_handler("http-request").is_some());
        assert!(registry.get_handler("HttpRequest").is_some());
    }

    #[test]
    fn unknown_or_unregistered_types_return_none() {
        let mut registry = NodeHandlerRegistry::new();
        registry.register(labelled(NodeType::Trigger, "t"));
        assert!(registry.get_handler("TELEPORT").is_none());
        assert!(registry.get_handler("").is_none());
        assert!(registry.get_handler("QUERY").is_none());
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let mut registry = NodeHandlerRegistry::new();
        assert!(registry.register(labelled(NodeType::Query, "first")));
        assert!(!registry.register(labelled(NodeType::Query, "second")));
        assert_eq!(registry.len(), 1);

        let handler = registry.get_handler("QUERY").unwrap();
        let outcome = handler
            .handle(&ExecutionContext::new(), "{}", &HashMap::new(), 1)
            .await
            .unwrap();
        assert_eq!(outcome.changes["handledBy"], "first");
    }

    #[test]
    fn probing_finds_multi_type_handlers() {
        let mut registry = NodeHandlerRegistry::new();
        registry.register(Arc::new(Labelled {
            node_type: NodeType::SendWhatsApp,
            also: Some(NodeType::Combot),
            label: "messaging",
        }));
        assert!(registry.get_handler("COMBOT").is_some());
        assert_eq!(
            registry.supported_types(),
            vec![NodeType::SendWhatsApp, NodeType::Combot]
        );
    }
}
