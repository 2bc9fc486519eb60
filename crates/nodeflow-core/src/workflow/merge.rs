//! Deep merge of a mapping's override config onto a template's base config.

use serde_json::Value;

/// Merge `overlay` into `base`.
///
/// Objects merge key by key, recursively. Arrays and scalars in `overlay`
/// replace whatever `base` holds at that path.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Merge the JSON texts of a base config and an optional override.
///
/// Malformed JSON on either side falls back to the base: a broken override
/// is ignored, and a broken base is returned as-is for the handler to reject.
pub fn merge_config_json(base: &str, override_json: Option<&str>) -> String {
    let Some(override_json) = override_json.filter(|s| !s.trim().is_empty()) else {
        return base.to_string();
    };

    let Ok(mut merged) = serde_json::from_str::<Value>(base) else {
        tracing::debug!("base config is not valid JSON, skipping override merge");
        return base.to_string();
    };
    let overlay = match serde_json::from_str::<Value>(override_json) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "override config is not valid JSON, using base config");
            return base.to_string();
        }
    };

    deep_merge(&mut merged, overlay);
    merged.to_string()
}
