//! Engine configuration types.
//!
//! `EngineConfig` represents the top-level `config.toml`. Every field has a
//! default, so an empty file (or no file at all) yields a working engine.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the workflow engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: TraversalConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Guard for the single-path state-machine walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    #[serde(default = "default_engine_max_steps")]
    pub max_steps: u32,
}

fn default_engine_max_steps() -> u32 {
    500
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_steps: default_engine_max_steps(),
        }
    }
}

/// Guard for ordered fan-out routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_router_max_steps")]
    pub max_steps: u32,
}

fn default_router_max_steps() -> u32 {
    20
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_steps: default_router_max_steps(),
        }
    }
}

/// Limits applied when sanitizing contexts for the execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_max_serialized_chars")]
    pub max_serialized_chars: usize,
    #[serde(default = "default_max_collection_entries")]
    pub max_collection_entries: usize,
    #[serde(default = "default_max_string_chars")]
    pub max_string_chars: usize,
    /// Case-insensitive substrings that mark a key as sensitive.
    #[serde(default = "default_sensitive_patterns")]
    pub sensitive_patterns: Vec<String>,
}

fn default_max_serialized_chars() -> usize {
    50_000
}

fn default_max_collection_entries() -> usize {
    100
}

fn default_max_string_chars() -> usize {
    5_000
}

fn default_sensitive_patterns() -> Vec<String> {
    [
        "password",
        "secret",
        "token",
        "key",
        "credential",
        "pin",
        "otp",
        "auth",
        "private",
        "apikey",
        "ssn",
        "cvv",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_serialized_chars: default_max_serialized_chars(),
            max_collection_entries: default_max_collection_entries(),
            max_string_chars: default_max_string_chars(),
            sensitive_patterns: default_sensitive_patterns(),
        }
    }
}

/// In-process duplicate-run suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_idempotency_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_idempotency_ttl_secs() -> u64 {
    1_800
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_idempotency_ttl_secs(),
        }
    }
}

/// Outbound HTTP client used by the REST request strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "nodeflow/0.1".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            otel: false,
        }
    }
}
