//! Context sanitization for the execution log.
//!
//! Everything written to `input_context_json` / `details_json` passes through
//! [`ContextSanitizer`]:
//! - keys containing a sensitive substring (any case) are redacted
//! - long strings, lists and maps are capped with an explicit marker
//! - ORM proxy / entity objects collapse to a `"[TypeName]"` tag
//! - the serialized document is kept within a character budget

use nodeflow_types::config::AuditConfig;
use serde_json::{Map, Value};

pub const REDACTED: &str = "***REDACTED***";
pub const TRUNCATED_MARKER: &str = "_truncated";
pub const OMITTED_FIELDS_MARKER: &str = "_omittedFields";
pub const MORE_ENTRIES_MARKER: &str = "_more";

/// Keys that carry a runtime type name in serialized objects.
const TYPE_MARKER_KEYS: [&str; 5] = ["@type", "_type", "__class__", "$type", "className"];

/// Type-name fragments of generated proxies and persistence entities.
const PROXY_NAME_PATTERNS: [&str; 8] = [
    "$$",
    "Proxy",
    "HibernateProxy",
    "_$$_",
    "ByteBuddy",
    "Entity",
    "javassist",
    "CGLIB",
];

#[derive(Debug, Clone)]
pub struct ContextSanitizer {
    sensitive_patterns: Vec<String>,
    max_serialized_chars: usize,
    max_collection_entries: usize,
    max_string_chars: usize,
}

impl ContextSanitizer {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            sensitive_patterns: config
                .sensitive_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            max_serialized_chars: config.max_serialized_chars,
            max_collection_entries: config.max_collection_entries,
            max_string_chars: config.max_string_chars,
        }
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_patterns.iter().any(|p| key.contains(p.as_str()))
    }

    /// Sanitize a top-level document, enforcing the size budget.
    ///
    /// Fields are added in key order until the next one would push the
    /// serialized size over budget; the rest are counted in `_omittedFields`.
    pub fn sanitize_map(&self, map: &Map<String, Value>) -> Value {
        let mut out = Map::new();
        // Opening and closing braces.
        let mut used = 2;
        let mut omitted = 0;

        for (index, (key, value)) in map.iter().enumerate() {
            let clean = self.sanitize_entry(key, value);
            let entry_len = json_len(&Value::String(key.clone())) + 1 + json_len(&clean) + 1;
            if used + entry_len > self.max_serialized_chars {
                omitted = map.len() - index;
                break;
            }
            used += entry_len;
            out.insert(key.clone(), clean);
        }

        if omitted > 0 {
            out.insert(TRUNCATED_MARKER.to_string(), Value::Bool(true));
            out.insert(OMITTED_FIELDS_MARKER.to_string(), Value::from(omitted));
        }
        Value::Object(out)
    }

    /// Sanitize any JSON value. Objects get the top-level budget; other values
    /// that still overflow it are replaced by a truncation marker.
    pub fn sanitize(&self, value: &Value) -> Value {
        if let Value::Object(map) = value {
            return self.sanitize_map(map);
        }
        let clean = self.sanitize_value(value);
        if json_len(&clean) > self.max_serialized_chars {
            let mut marker = Map::new();
            marker.insert(TRUNCATED_MARKER.to_string(), Value::Bool(true));
            marker.insert(OMITTED_FIELDS_MARKER.to_string(), Value::from(1));
            return Value::Object(marker);
        }
        clean
    }

    fn sanitize_entry(&self, key: &str, value: &Value) -> Value {
        if self.is_sensitive(key) {
            return Value::String(REDACTED.to_string());
        }
        self.sanitize_value(value)
    }

    fn sanitize_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.truncate_string(s)),
            Value::Array(items) => {
                let mut out: Vec<Value> = items
                    .iter()
                    .take(self.max_collection_entries)
                    .map(|v| self.sanitize_value(v))
                    .collect();
                if items.len() > self.max_collection_entries {
                    let more = items.len() - self.max_collection_entries;
                    out.push(Value::String(format!("... {more} more items")));
                }
                Value::Array(out)
            }
            Value::Object(map) => {
                if let Some(tag) = proxy_tag(map) {
                    return Value::String(tag);
                }
                let mut out = Map::new();
                for (key, v) in map.iter().take(self.max_collection_entries) {
                    out.insert(key.clone(), self.sanitize_entry(key, v));
                }
                if map.len() > self.max_collection_entries {
                    let more = map.len() - self.max_collection_entries;
                    out.insert(
                        MORE_ENTRIES_MARKER.to_string(),
                        Value::String(format!("{more} more entries")),
                    );
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    fn truncate_string(&self, s: &str) -> String {
        let total = s.chars().count();
        if total <= self.max_string_chars {
            return s.to_string();
        }
        let kept: String = s.chars().take(self.max_string_chars).collect();
        format!("{kept}... [truncated {} chars]", total - self.max_string_chars)
    }
}

impl Default for ContextSanitizer {
    fn default() -> Self {
        Self::new(&AuditConfig::default())
    }
}

/// `"[ShortName]"` when the object's type marker names a proxy or entity.
fn proxy_tag(map: &Map<String, Value>) -> Option<String> {
    let type_name = TYPE_MARKER_KEYS
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))?;
    if !PROXY_NAME_PATTERNS.iter().any(|p| type_name.contains(p)) {
        return None;
    }
    let simple = type_name.rsplit('.').next().unwrap_or(type_name);
    let short = simple
        .split('$')
        .find(|part| !part.is_empty())
        .unwrap_or(simple)
        .trim_end_matches('_');
    Some(format!("[{short}]"))
}

fn json_len(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}
