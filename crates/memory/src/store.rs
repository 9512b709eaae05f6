//! MessageStore trait — the ordered per-session log capability.

use async_trait::async_trait;
use ironhive_core::error::MemoryError;
use ironhive_core::message::Message;

/// A per-session ordered message log.
///
/// Sessions are created lazily on first write and never implicitly
/// destroyed. Implementations must return messages in append order.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "sqlite").
    fn name(&self) -> &str;

    /// Append a message to its session.
    async fn append(&self, message: Message) -> Result<(), MemoryError>;

    /// Read all messages of a session in append order.
    async fn read(&self, session_id: &str) -> Result<Vec<Message>, MemoryError>;

    /// Remove all messages of a session.
    async fn clear(&self, session_id: &str) -> Result<(), MemoryError>;
}
