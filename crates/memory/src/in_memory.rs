//! In-memory message store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use ironhive_core::error::MemoryError;
use ironhive_core::message::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::MessageStore;

/// Keeps every session's log in a process-local map. Appends within a
/// session are serialized by the write lock.
pub struct InMemoryMessageStore {
    sessions: Arc<RwLock<HashMap<String, Vec<Message>>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of sessions with at least one message.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, message: Message) -> Result<(), MemoryError> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(message.session_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn read(&self, session_id: &str) -> Result<Vec<Message>, MemoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<(), MemoryError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}
