//! Typed events emitted by the reasoning loop and the background control
//! plane. Events are observational: consumers subscribe per session, and a
//! failed emit never aborts the work that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::BackgroundState;
use crate::error::ToolErrorKind;

/// An event in a session's append-only stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Unique event ID
    pub id: String,

    /// The typed payload
    #[serde(flatten)]
    pub kind: EventKind,

    /// The agent that produced the event. For background lifecycle events
    /// this carries the agent id.
    pub agent_name: String,

    /// The session the event belongs to
    pub session_id: String,

    /// When the event was created
    pub timestamp: DateTime<Utc>,
}

impl AgentEvent {
    pub fn new(
        kind: EventKind,
        agent_name: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            agent_name: agent_name.into(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// All event types in the system, with their payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A user query entered a session
    UserMessage { content: String },

    /// The reasoning loop is about to call the model
    AgentCall { model: String },

    /// The model requested a tool call
    ToolCall {
        call_id: String,
        name: String,
        arguments: serde_json::Value,
    },

    /// A tool call finished (successfully or not)
    ToolResult {
        call_id: String,
        ok: bool,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_kind: Option<ToolErrorKind>,
    },

    /// Observation fed back to the model
    Observation { content: String },

    /// The episode produced its final answer
    FinalAnswer {
        content: String,
        tokens_used: u64,
        steps: u32,
    },

    /// Model output could not be parsed as an action or answer
    ParseError { raw_output: String, attempt: u32 },

    /// A background run started
    TaskStarted { run_count: u64 },

    /// A background run completed successfully
    TaskCompleted { duration_ms: u64 },

    /// A background run attempt failed
    TaskError {
        attempt: u32,
        error_kind: String,
        message: String,
    },

    /// A background agent changed state
    AgentStatusChanged {
        state: BackgroundState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_run_at: Option<DateTime<Utc>>,
        run_count: u64,
        error_count: u64,
    },

    /// A scheduler tick found the previous run still in flight
    SkippedBusy,

    /// The in-memory buffer overflowed and dropped old events
    EventDropped { count: u64 },
}

impl EventKind {
    /// Short name of the event type, handy for logs and assertions.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::UserMessage { .. } => "user_message",
            EventKind::AgentCall { .. } => "agent_call",
            EventKind::ToolCall { .. } => "tool_call",
            EventKind::ToolResult { .. } => "tool_result",
            EventKind::Observation { .. } => "observation",
            EventKind::FinalAnswer { .. } => "final_answer",
            EventKind::ParseError { .. } => "parse_error",
            EventKind::TaskStarted { .. } => "task_started",
            EventKind::TaskCompleted { .. } => "task_completed",
            EventKind::TaskError { .. } => "task_error",
            EventKind::AgentStatusChanged { .. } => "agent_status_changed",
            EventKind::SkippedBusy => "skipped_busy",
            EventKind::EventDropped { .. } => "event_dropped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_tags_type() {
        let event = AgentEvent::new(
            EventKind::ToolCall {
                call_id: "c1".into(),
                name: "add".into(),
                arguments: serde_json::json!({"a": 2, "b": 3}),
            },
            "assistant",
            "s1",
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tool_call\""));
        assert!(json.contains("\"session_id\":\"s1\""));

        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind.name(), "tool_call");
    }

    #[test]
    fn tool_result_omits_absent_error_kind() {
        let event = AgentEvent::new(
            EventKind::ToolResult {
                call_id: "c1".into(),
                ok: true,
                duration_ms: 12,
                error_kind: None,
            },
            "assistant",
            "s1",
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("error_kind"));
    }

    #[test]
    fn unit_variant_roundtrip() {
        let event = AgentEvent::new(EventKind::SkippedBusy, "watcher", "background:watcher");
        let json = serde_json::to_string(&event).unwrap();
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind.name(), "skipped_busy");
    }
}
