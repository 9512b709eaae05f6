//! Core domain model for the ironhive agent runtime.
//!
//! This crate defines the types every other crate speaks: messages and
//! sessions, typed events, tool descriptors and the in-process registry,
//! the LLM client capability, background agent records, and the error
//! taxonomy. It has no backend or engine logic of its own.

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod message;
pub mod tool;

pub use agent::{AgentStatus, BackgroundAgentConfig, BackgroundState, ConfigPatch, TaskConfig};
pub use config::{BackendConfig, RunLimits, RuntimeConfig};
pub use error::{
    EngineError, Error, EventError, LimitKind, LlmError, ManagerError, MemoryError, Result,
    ToolError, ToolErrorKind,
};
pub use event::{AgentEvent, EventKind};
pub use llm::{Completion, LlmClient, ModelConfig, TokenUsage};
pub use message::{estimate_tokens, Message, Role};
pub use tool::{
    FnTool, ProviderKind, Tool, ToolCall, ToolDescriptor, ToolRegistry, ToolResultEnvelope,
};
