//! Message domain types.
//!
//! Messages are the value objects that flow through the entire system:
//! a user query enters a session, the reasoning loop appends assistant and
//! tool messages, and the memory router reads them back under a token budget.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key carrying the owning agent's name.
pub const META_AGENT_NAME: &str = "agent_name";
/// Metadata key linking a tool message to the call that produced it.
pub const META_TOOL_CALL_ID: &str = "tool_call_id";

/// The role of a message sender in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (identity, rules)
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    /// Parse a stored role string. Unknown strings map to `User` so a
    /// corrupted row degrades to plain conversation text instead of failing
    /// the whole read.
    pub fn parse(s: &str) -> Role {
        match s {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::User,
        }
    }
}

/// A single message in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// The session this message belongs to
    pub session_id: String,

    /// Timestamp assigned at append time
    pub timestamp: DateTime<Utc>,

    /// Optional metadata (agent name, tool call id, etc.)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: Role, session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new system message.
    pub fn system(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::System, session_id, content)
    }

    /// Create a new user message.
    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::User, session_id, content)
    }

    /// Create a new assistant message.
    pub fn assistant(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, session_id, content)
    }

    /// Create a tool result message linked to its originating call.
    pub fn tool_result(
        session_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(Role::Tool, session_id, content)
            .with_metadata(META_TOOL_CALL_ID, tool_call_id.into())
    }

    /// Attach the owning agent's name.
    pub fn with_agent_name(self, agent_name: impl Into<String>) -> Self {
        self.with_metadata(META_AGENT_NAME, agent_name.into())
    }

    /// Attach an arbitrary metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The agent this message belongs to, if tagged.
    pub fn agent_name(&self) -> Option<&str> {
        self.metadata.get(META_AGENT_NAME).and_then(|v| v.as_str())
    }

    /// The tool call this message responds to, if any.
    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata
            .get(META_TOOL_CALL_ID)
            .and_then(|v| v.as_str())
    }

    /// Estimated token footprint of this message's content.
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

/// Estimate the token count of a text (rough: 4 bytes per token).
///
/// Deterministic and monotone: the estimate of a concatenation is at least
/// the sum of the parts minus one.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}
