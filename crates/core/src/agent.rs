//! Background agent records: state, task config, status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RunLimits;
use crate::llm::ModelConfig;

/// Lifecycle state of a background agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundState {
    /// Registered but not yet scheduled
    Pending,
    /// Exactly one execution in flight
    Running,
    /// Scheduled, waiting for the next tick
    Idle,
    /// Ticks are ignored until resumed
    Paused,
    /// Last run exhausted its retries
    Error,
    /// Terminal; the record is gone from the manager
    Deleted,
}

impl BackgroundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundState::Pending => "pending",
            BackgroundState::Running => "running",
            BackgroundState::Idle => "idle",
            BackgroundState::Paused => "paused",
            BackgroundState::Error => "error",
            BackgroundState::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for BackgroundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a background agent does on every trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// The query fed to the reasoning loop
    pub query: String,

    /// Human-readable description of the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            description: None,
        }
    }
}

/// Full configuration of a background agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundAgentConfig {
    /// Unique id within a manager
    pub agent_id: String,

    /// System instruction for every episode
    pub system_instruction: String,

    /// Model parameters
    #[serde(default)]
    pub model: ModelConfig,

    /// The scheduled task
    pub task: TaskConfig,

    /// Seconds between trigger starts
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Retries after a failed episode before giving up for this trigger
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between retry attempts
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Episode budgets
    #[serde(default)]
    pub limits: RunLimits,
}

fn default_interval_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_delay_secs() -> u64 {
    5
}

impl BackgroundAgentConfig {
    pub fn new(agent_id: impl Into<String>, task: TaskConfig) -> Self {
        Self {
            agent_id: agent_id.into(),
            system_instruction: String::new(),
            model: ModelConfig::default(),
            task,
            interval_secs: default_interval_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            limits: RunLimits::default(),
        }
    }

    /// The dedicated session every episode of this agent writes to.
    pub fn session_id(&self) -> String {
        format!("background:{}", self.agent_id)
    }

    /// Validate before registration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.agent_id.trim().is_empty() {
            return Err("agent_id must not be empty".into());
        }
        if self.interval_secs == 0 {
            return Err("interval_secs must be at least 1".into());
        }
        if self.task.query.trim().is_empty() {
            return Err("task query must not be empty".into());
        }
        Ok(())
    }
}

/// Partial update applied by `update_config`. Absent fields are untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<RunLimits>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.task.is_none()
            && self.interval_secs.is_none()
            && self.max_retries.is_none()
            && self.retry_delay_secs.is_none()
            && self.model.is_none()
            && self.system_instruction.is_none()
            && self.limits.is_none()
    }
}

/// Point-in-time snapshot of a background agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: String,
    pub state: BackgroundState,
    /// The task's human-readable description, when configured
    pub description: Option<String>,
    pub run_count: u64,
    pub error_count: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub interval_secs: u64,
}
