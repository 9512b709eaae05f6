//! Runtime configuration: episode budgets and backend selection.
//!
//! Everything deserializes from TOML with per-field defaults, so a partial
//! config file (or none at all) yields a working runtime.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Budgets bounding a single reasoning episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLimits {
    /// Maximum reasoning steps per episode
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Maximum LLM requests per episode
    #[serde(default = "default_request_limit")]
    pub request_limit: u32,

    /// Maximum cumulative tokens per episode
    #[serde(default = "default_total_tokens_limit")]
    pub total_tokens_limit: u64,

    /// Per-call tool deadline
    #[serde(default = "default_tool_call_timeout_secs")]
    pub tool_call_timeout_secs: u64,

    /// Context window budget applied when reading session history
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// How many malformed model outputs are re-prompted before giving up
    #[serde(default = "default_parse_retry_budget")]
    pub parse_retry_budget: u32,
}

fn default_max_steps() -> u32 {
    10
}
fn default_request_limit() -> u32 {
    15
}
fn default_total_tokens_limit() -> u64 {
    100_000
}
fn default_tool_call_timeout_secs() -> u64 {
    30
}
fn default_max_context_tokens() -> usize {
    8_000
}
fn default_parse_retry_budget() -> u32 {
    2
}

impl RunLimits {
    pub fn tool_call_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_call_timeout_secs)
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            request_limit: default_request_limit(),
            total_tokens_limit: default_total_tokens_limit(),
            tool_call_timeout_secs: default_tool_call_timeout_secs(),
            max_context_tokens: default_max_context_tokens(),
            parse_retry_budget: default_parse_retry_budget(),
        }
    }
}

/// Which store implementation a router should use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend selector: "in_memory" or "sqlite"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Connection string or file path for durable backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_backend() -> String {
    "in_memory".into()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

/// Root runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Message store selection
    #[serde(default)]
    pub memory: BackendConfig,

    /// Event store selection
    #[serde(default)]
    pub events: BackendConfig,

    /// Default model parameters
    #[serde(default)]
    pub model: crate::llm::ModelConfig,

    /// Default episode budgets
    #[serde(default)]
    pub limits: RunLimits,
}

impl RuntimeConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> crate::error::Result<Self> {
        toml::from_str(s).map_err(|e| crate::error::Error::Internal(format!("invalid config: {e}")))
    }

    /// Load from a TOML file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| crate::error::Error::Internal(format!("cannot read config: {e}")))?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_defaults() {
        let limits = RunLimits::default();
        assert_eq!(limits.max_steps, 10);
        assert_eq!(limits.parse_retry_budget, 2);
        assert_eq!(limits.tool_call_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn empty_config_parses() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config.memory.backend, "in_memory");
        assert_eq!(config.events.backend, "in_memory");
    }

    #[test]
    fn partial_config_overrides() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [memory]
            backend = "sqlite"
            path = "ironhive.db"

            [limits]
            max_steps = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.memory.backend, "sqlite");
        assert_eq!(config.memory.path.as_deref(), Some("ironhive.db"));
        assert_eq!(config.limits.max_steps, 4);
        // untouched fields keep their defaults
        assert_eq!(config.limits.request_limit, 15);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(RuntimeConfig::from_toml_str("not valid [").is_err());
    }
}
