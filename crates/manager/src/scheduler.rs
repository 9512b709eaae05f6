//! Per-agent tickers.
//!
//! Each scheduled agent gets its own interval task. A tick spawns the
//! trigger instead of awaiting it, so a long run never blocks the ticker;
//! overlap is prevented by the agent's run-lock and a busy tick is dropped,
//! not queued. Rescheduling replaces the ticker, so a new interval is
//! measured from the moment of the update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::BackgroundAgent;

pub struct Scheduler {
    tickers: Mutex<HashMap<String, JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            tickers: Mutex::new(HashMap::new()),
            cancel,
        }
    }

    /// Start (or replace) the ticker for an agent.
    pub fn schedule(&self, agent: Arc<BackgroundAgent>, interval: Duration) {
        let agent_id = agent.agent_id().to_string();
        self.unschedule(&agent_id);

        info!(agent = %agent_id, interval_secs = interval.as_secs(), "Scheduling agent");
        let cancel = self.cancel.child_token();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        let agent = agent.clone();
                        tokio::spawn(async move {
                            agent.trigger().await;
                        });
                    }
                }
            }
        });

        self.tickers
            .lock()
            .expect("scheduler lock poisoned")
            .insert(agent_id, handle);
    }

    /// Stop an agent's ticker.
    pub fn unschedule(&self, agent_id: &str) {
        if let Some(handle) = self
            .tickers
            .lock()
            .expect("scheduler lock poisoned")
            .remove(agent_id)
        {
            debug!(agent = %agent_id, "Stopping ticker");
            handle.abort();
        }
    }

    /// Stop all tickers.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let mut tickers = self.tickers.lock().expect("scheduler lock poisoned");
        for (agent_id, handle) in tickers.drain() {
            debug!(agent = %agent_id, "Stopping ticker");
            handle.abort();
        }
    }
}
