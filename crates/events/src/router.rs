//! Event router — the append/stream API the rest of the runtime talks to.
//!
//! Owns one backend chosen at construction time. Appends retry transient
//! backend failures a few times before surfacing; `emit` is the
//! fire-and-forget variant used on the hot path, because events are
//! observational and must never abort the work that produced them.

use std::sync::Arc;
use std::time::Duration;

use ironhive_core::config::BackendConfig;
use ironhive_core::error::EventError;
use ironhive_core::event::AgentEvent;
use tokio::sync::mpsc;
use tracing::warn;

use crate::in_memory::InMemoryEventStore;
use crate::sqlite::SqliteEventStore;
use crate::store::EventStore;

/// Total append attempts before giving up.
const APPEND_ATTEMPTS: u32 = 3;
/// Fixed delay between attempts.
const APPEND_RETRY_DELAY: Duration = Duration::from_millis(50);

pub struct EventRouter {
    store: Arc<dyn EventStore>,
}

impl EventRouter {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Convenience constructor for the in-process backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryEventStore::new()))
    }

    /// Build a router from a backend selector.
    pub async fn from_config(config: &BackendConfig) -> Result<Self, EventError> {
        match config.backend.as_str() {
            "in_memory" => Ok(Self::in_memory()),
            "sqlite" => {
                let path = config
                    .path
                    .as_deref()
                    .ok_or_else(|| EventError::Storage("sqlite backend needs a path".into()))?;
                Ok(Self::new(Arc::new(SqliteEventStore::new(path).await?)))
            }
            other => Err(EventError::Storage(format!(
                "unknown event backend: {other}"
            ))),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.store.name()
    }

    /// Append an event, retrying transient failures.
    pub async fn append(&self, event: AgentEvent) -> Result<(), EventError> {
        let mut last_error = None;
        for attempt in 1..=APPEND_ATTEMPTS {
            match self.store.append(event.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt < APPEND_ATTEMPTS {
                        tokio::time::sleep(APPEND_RETRY_DELAY).await;
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(EventError::Unavailable(format!(
            "append failed after {APPEND_ATTEMPTS} attempts: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Append an event, swallowing failures with a warning.
    ///
    /// Events are not authoritative; the reasoning loop keeps going when
    /// the event backend misbehaves.
    pub async fn emit(&self, event: AgentEvent) {
        let kind = event.kind.name();
        if let Err(e) = self.append(event).await {
            warn!(event = kind, error = %e, "Event emission failed, continuing");
        }
    }

    /// Subscribe to a session's events.
    pub async fn stream(&self, session_id: &str) -> Result<mpsc::Receiver<AgentEvent>, EventError> {
        self.store.stream(session_id).await
    }
}
