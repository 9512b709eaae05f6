//! Error types for the ironhive domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all ironhive operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Event errors ---
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    // --- LLM errors ---
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    // --- Control-plane errors ---
    #[error("Manager error: {0}")]
    Manager(#[from] ManagerError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Serializable classification of a failed tool call.
///
/// This is what tool result envelopes carry so the reasoning loop (and any
/// event consumer) can tell *why* a call failed without inspecting free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Arguments failed JSON-schema validation
    BadArguments,
    /// No provider knows the tool name
    UnknownTool,
    /// The call exceeded its deadline
    Timeout,
    /// The tool executed but signaled failure
    ToolFailure,
    /// Transport/protocol error from a remote provider
    ProviderError,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolErrorKind::BadArguments => "bad_arguments",
            ToolErrorKind::UnknownTool => "unknown_tool",
            ToolErrorKind::Timeout => "timeout",
            ToolErrorKind::ToolFailure => "tool_failure",
            ToolErrorKind::ProviderError => "provider_error",
        };
        write!(f, "{s}")
    }
}

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments for {tool}: {reason}")]
    BadArguments { tool: String, reason: String },

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool timed out: {tool} after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("Tool execution failed: {tool}: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    #[error("Provider error from {tool}: {reason}")]
    Provider { tool: String, reason: String },
}

impl ToolError {
    /// Map this error to the envelope classification.
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::BadArguments { .. } => ToolErrorKind::BadArguments,
            ToolError::NotFound(_) => ToolErrorKind::UnknownTool,
            ToolError::Timeout { .. } => ToolErrorKind::Timeout,
            ToolError::ExecutionFailed { .. } => ToolErrorKind::ToolFailure,
            ToolError::Provider { .. } => ToolErrorKind::ProviderError,
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Memory backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event store error: {0}")]
    Storage(String),

    #[error("Event backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Which episode budget was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Steps,
    Requests,
    Tokens,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LimitKind::Steps => "steps",
            LimitKind::Requests => "requests",
            LimitKind::Tokens => "tokens",
        };
        write!(f, "{s}")
    }
}

/// Fatal episode errors. Recoverable conditions (tool failures, parse
/// retries, limit exhaustion) are episode outcomes, not errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Memory backend failed: {0}")]
    Memory(#[from] MemoryError),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManagerError {
    #[error("Duplicate agent id: {0}")]
    DuplicateId(String),

    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Invalid agent config: {0}")]
    InvalidConfig(String),
}
