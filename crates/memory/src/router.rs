//! Memory router — the session log API the reasoning loop talks to.
//!
//! Wraps one [`MessageStore`] and applies the token budget at read time:
//! the oldest non-system messages are dropped from the returned view while
//! the store keeps everything. A leading system message is never dropped.

use std::sync::Arc;

use ironhive_core::config::BackendConfig;
use ironhive_core::error::MemoryError;
use ironhive_core::message::{Message, Role};

use crate::in_memory::InMemoryMessageStore;
use crate::sqlite::SqliteMessageStore;
use crate::store::MessageStore;

/// Default context budget when the caller does not supply one.
const DEFAULT_CONTEXT_TOKENS: usize = 8_000;

pub struct MemoryRouter {
    store: Arc<dyn MessageStore>,
    max_context_tokens: usize,
}

impl MemoryRouter {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            max_context_tokens: DEFAULT_CONTEXT_TOKENS,
        }
    }

    /// Convenience constructor for the in-process backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryMessageStore::new()))
    }

    /// Build a router from a backend selector.
    pub async fn from_config(config: &BackendConfig) -> Result<Self, MemoryError> {
        match config.backend.as_str() {
            "in_memory" => Ok(Self::in_memory()),
            "sqlite" => {
                let path = config
                    .path
                    .as_deref()
                    .ok_or_else(|| MemoryError::Storage("sqlite backend needs a path".into()))?;
                Ok(Self::new(Arc::new(SqliteMessageStore::new(path).await?)))
            }
            other => Err(MemoryError::Storage(format!(
                "unknown memory backend: {other}"
            ))),
        }
    }

    /// Override the default read budget.
    pub fn with_token_budget(mut self, max_context_tokens: usize) -> Self {
        self.max_context_tokens = max_context_tokens;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.store.name()
    }

    /// Append a message; the timestamp was assigned at construction.
    pub async fn append(&self, message: Message) -> Result<(), MemoryError> {
        self.store.append(message).await
    }

    /// Append a message built from parts.
    pub async fn store_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        agent_name: Option<&str>,
    ) -> Result<(), MemoryError> {
        let mut message = Message::new(role, session_id, content);
        if let Some(name) = agent_name {
            message = message.with_agent_name(name);
        }
        self.append(message).await
    }

    /// Read the session under the router's default budget.
    pub async fn get_messages(
        &self,
        session_id: &str,
        agent_name: Option<&str>,
    ) -> Result<Vec<Message>, MemoryError> {
        self.get_messages_bounded(session_id, agent_name, self.max_context_tokens)
            .await
    }

    /// Read the session, optionally filtered by agent, truncated to fit the
    /// given token budget.
    pub async fn get_messages_bounded(
        &self,
        session_id: &str,
        agent_name: Option<&str>,
        max_tokens: usize,
    ) -> Result<Vec<Message>, MemoryError> {
        let mut messages = self.store.read(session_id).await?;

        if let Some(name) = agent_name {
            messages.retain(|m| m.agent_name().map(|a| a == name).unwrap_or(true));
        }

        Ok(apply_token_budget(messages, max_tokens))
    }

    /// Remove all messages of a session.
    pub async fn clear(&self, session_id: &str) -> Result<(), MemoryError> {
        self.store.clear(session_id).await
    }
}

/// Drop the oldest non-system messages until the view fits the budget.
/// A system message at the head of the log is always kept.
fn apply_token_budget(messages: Vec<Message>, max_tokens: usize) -> Vec<Message> {
    let total: usize = messages.iter().map(|m| m.estimated_tokens()).sum();
    if total <= max_tokens {
        return messages;
    }

    let mut rest = messages;
    let system = if rest.first().map(|m| m.role == Role::System).unwrap_or(false) {
        Some(rest.remove(0))
    } else {
        None
    };

    let reserved = system.as_ref().map(|m| m.estimated_tokens()).unwrap_or(0);
    let available = max_tokens.saturating_sub(reserved);

    // Walk backwards keeping the newest suffix that fits.
    let mut used = 0usize;
    let mut start = rest.len();
    for (i, message) in rest.iter().enumerate().rev() {
        let tokens = message.estimated_tokens();
        if used + tokens > available {
            break;
        }
        used += tokens;
        start = i;
    }

    let mut out = Vec::with_capacity(rest.len() - start + 1);
    if let Some(system) = system {
        out.push(system);
    }
    out.extend(rest.into_iter().skip(start));
    out
}
