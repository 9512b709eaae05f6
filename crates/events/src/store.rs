//! EventStore trait — the append-only per-session event log capability.

use async_trait::async_trait;
use ironhive_core::error::EventError;
use ironhive_core::event::AgentEvent;
use tokio::sync::mpsc;

/// An append-only event log keyed by session.
///
/// `stream` hands back a receiver fed by a background forwarder; per
/// session, any single consumer observes events in append order.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "sqlite").
    fn name(&self) -> &str;

    /// Append an event to its session's stream.
    async fn append(&self, event: AgentEvent) -> Result<(), EventError>;

    /// Subscribe to a session's events.
    async fn stream(&self, session_id: &str) -> Result<mpsc::Receiver<AgentEvent>, EventError>;
}
