//! Engine configuration and workflow bundle loading.
//!
//! Reads `config.toml` from the data directory (`~/.nodeflow/` by default)
//! into [`EngineConfig`], falling back to defaults when the file is missing
//! or malformed. Workflow bundles are JSON documents imported by the CLI;
//! unlike the config, a bad bundle is a hard error.

use std::path::{Path, PathBuf};

use nodeflow_types::config::EngineConfig;
use nodeflow_types::workflow::WorkflowBundle;

use crate::sqlite::query::QueryCatalog;

const DATA_DIR_ENV: &str = "NODEFLOW_DATA_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `NODEFLOW_DATA_DIR` environment variable
/// 2. `~/.nodeflow`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".nodeflow"),
        None => PathBuf::from(".nodeflow"),
    }
}

/// Load engine configuration from `{data_dir}/config.toml`.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %config_path.display(), "no config.toml found, using defaults");
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!(path = %config_path.display(), error = %err, "failed to read config, using defaults");
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(path = %config_path.display(), error = %err, "failed to parse config, using defaults");
            EngineConfig::default()
        }
    }
}

/// Load the prebuilt query catalog from `{data_dir}/queries.toml`.
///
/// Same fallback rules as [`load_engine_config`]: a missing or malformed
/// file yields an empty catalog.
pub async fn load_query_catalog(data_dir: &Path) -> QueryCatalog {
    let path = data_dir.join("queries.toml");
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no queries.toml found, catalog is empty");
            return QueryCatalog::default();
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read query catalog");
            return QueryCatalog::default();
        }
    };

    match toml::from_str::<QueryCatalog>(&content) {
        Ok(catalog) => catalog,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to parse query catalog");
            QueryCatalog::default()
        }
    }
}

/// Read a `{workflow, templates, mappings}` bundle from a JSON file.
///
/// Mappings without a `workflowId` inherit the bundle's workflow id.
pub async fn read_bundle(path: &Path) -> Result<WorkflowBundle, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let mut bundle: WorkflowBundle =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    for mapping in &mut bundle.mappings {
        if mapping.workflow_id.is_empty() {
            mapping.workflow_id = bundle.workflow.id.clone();
        }
    }
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_config_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.engine.max_steps, 500);
        assert_eq!(config.router.max_steps, 20);
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[engine]
max_steps = 42

[http]
timeout_secs = 5

[idempotency]
ttl_secs = 60
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.engine.max_steps, 42);
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.idempotency.ttl_secs, 60);
        assert_eq!(config.audit.max_collection_entries, 100);
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.engine.max_steps, 500);
    }

    #[tokio::test]
    async fn query_catalog_loads_or_defaults() {
        let tmp = TempDir::new().unwrap();
        assert!(load_query_catalog(tmp.path()).await.queries.is_empty());

        tokio::fs::write(
            tmp.path().join("queries.toml"),
            r#"
[queries.student_by_id]
sql = "SELECT name FROM students WHERE id = ?"
params = ["id"]
"#,
        )
        .await
        .unwrap();
        let catalog = load_query_catalog(tmp.path()).await;
        assert_eq!(catalog.queries["student_by_id"].params, vec!["id".to_string()]);
    }

    #[tokio::test]
    async fn bundle_mappings_inherit_workflow_id() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fees.json");
        tokio::fs::write(
            &path,
            r#"{
  "workflow": {"id": "wf-fees", "instituteId": "inst-1", "name": "Fees"},
  "templates": [
    {"id": "t1", "nodeType": "TRIGGER", "nodeName": "start", "configJson": "{}", "instituteId": "inst-1"}
  ],
  "mappings": [{"nodeTemplateId": "t1", "isStartNode": true}]
}"#,
        )
        .await
        .unwrap();

        let bundle = read_bundle(&path).await.unwrap();
        assert_eq!(bundle.mappings[0].workflow_id, "wf-fees");
        assert_eq!(bundle.templates.len(), 1);
    }

    #[tokio::test]
    async fn bundle_errors_name_the_file() {
        let tmp = TempDir::new().unwrap();
        let missing = read_bundle(&tmp.path().join("nope.json")).await;
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let path = tmp.path().join("bad.json");
        tokio::fs::write(&path, "{").await.unwrap();
        let err = read_bundle(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn data_dir_from_env() {
        // SAFETY: restored immediately; no other test reads this variable.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-nodeflow");
        }
        assert_eq!(resolve_data_dir(), PathBuf::from("/tmp/test-nodeflow"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
