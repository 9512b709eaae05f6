//! In-memory event store — per-session ring buffer with broadcast fan-out.
//!
//! Subscribers created after events were appended see the buffered history
//! first, then live events; sequence numbers make the handoff duplicate-free.
//! When the buffer overflows, the oldest event is dropped and a single
//! `EventDropped` marker is injected on the next append.

use async_trait::async_trait;
use ironhive_core::error::EventError;
use ironhive_core::event::{AgentEvent, EventKind};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};

use crate::store::EventStore;

/// Buffered events kept per session.
const DEFAULT_BUFFER_CAPACITY: usize = 256;
/// Broadcast channel depth; lagging subscribers skip ahead.
const BROADCAST_CAPACITY: usize = 1024;
/// Depth of the per-subscriber delivery channel.
const SUBSCRIBER_CAPACITY: usize = 64;

struct SessionChannel {
    buffer: VecDeque<(u64, AgentEvent)>,
    next_seq: u64,
    dropped_since_marker: u64,
    tx: broadcast::Sender<(u64, AgentEvent)>,
}

impl SessionChannel {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            buffer: VecDeque::new(),
            next_seq: 0,
            dropped_since_marker: 0,
            tx,
        }
    }

    fn push(&mut self, event: AgentEvent, capacity: usize) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.buffer.push_back((seq, event.clone()));
        if self.buffer.len() > capacity {
            self.buffer.pop_front();
            self.dropped_since_marker += 1;
        }
        // No receivers is fine; the buffer still records history.
        let _ = self.tx.send((seq, event));
    }
}

pub struct InMemoryEventStore {
    sessions: Mutex<HashMap<String, SessionChannel>>,
    capacity: usize,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Override the per-session buffer capacity (mainly for tests).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, event: AgentEvent) -> Result<(), EventError> {
        let mut sessions = self.sessions.lock().expect("event store lock poisoned");
        let channel = sessions
            .entry(event.session_id.clone())
            .or_insert_with(SessionChannel::new);

        if channel.dropped_since_marker > 0 {
            let count = channel.dropped_since_marker;
            channel.dropped_since_marker = 0;
            let marker = AgentEvent::new(
                EventKind::EventDropped { count },
                event.agent_name.clone(),
                event.session_id.clone(),
            );
            channel.push(marker, self.capacity);
        }

        channel.push(event, self.capacity);
        Ok(())
    }

    async fn stream(&self, session_id: &str) -> Result<mpsc::Receiver<AgentEvent>, EventError> {
        let (snapshot, last_seq, mut live) = {
            let mut sessions = self.sessions.lock().expect("event store lock poisoned");
            let channel = sessions
                .entry(session_id.to_string())
                .or_insert_with(SessionChannel::new);
            let snapshot: Vec<(u64, AgentEvent)> = channel.buffer.iter().cloned().collect();
            let last_seq = snapshot.last().map(|(seq, _)| *seq);
            // Subscribe while the lock is held so nothing falls in the gap
            // between snapshot and live delivery.
            (snapshot, last_seq, channel.tx.subscribe())
        };

        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        tokio::spawn(async move {
            for (_, event) in snapshot {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            loop {
                match live.recv().await {
                    Ok((seq, event)) => {
                        if last_seq.map(|l| seq > l).unwrap_or(true)
                            && tx.send(event).await.is_err()
                        {
                            return;
                        }
                    }
                    // Lagged subscribers skip what the channel discarded.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(rx)
    }
}
