//! The background-agent control plane.
//!
//! Owns the record table and the scheduler. All operations are safe to
//! call concurrently; the map lock is held only for map access, never
//! across a run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ironhive_agent::ReactEngine;
use ironhive_core::agent::{AgentStatus, BackgroundAgentConfig, ConfigPatch};
use ironhive_core::error::ManagerError;
use ironhive_events::EventRouter;

use crate::agent::BackgroundAgent;
use crate::scheduler::Scheduler;

pub struct BackgroundAgentManager {
    agents: RwLock<HashMap<String, Arc<BackgroundAgent>>>,
    scheduler: Scheduler,
    engine: Arc<ReactEngine>,
    events: Arc<EventRouter>,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl BackgroundAgentManager {
    pub fn new(engine: Arc<ReactEngine>, events: Arc<EventRouter>) -> Self {
        let cancel = CancellationToken::new();
        Self {
            agents: RwLock::new(HashMap::new()),
            scheduler: Scheduler::new(cancel.child_token()),
            engine,
            events,
            started: AtomicBool::new(false),
            cancel,
        }
    }

    fn get(&self, agent_id: &str) -> Result<Arc<BackgroundAgent>, ManagerError> {
        self.agents
            .read()
            .expect("manager lock poisoned")
            .get(agent_id)
            .cloned()
            .ok_or_else(|| ManagerError::NotFound(agent_id.to_string()))
    }

    /// Register a new agent. Scheduled right away if the manager has been
    /// started; initial state is idle.
    pub fn create_agent(&self, config: BackgroundAgentConfig) -> Result<String, ManagerError> {
        config.validate().map_err(ManagerError::InvalidConfig)?;

        let agent_id = config.agent_id.clone();
        let interval = Duration::from_secs(config.interval_secs);
        let agent = {
            let mut agents = self.agents.write().expect("manager lock poisoned");
            if agents.contains_key(&agent_id) {
                return Err(ManagerError::DuplicateId(agent_id));
            }
            let agent = BackgroundAgent::new(
                config,
                self.engine.clone(),
                self.events.clone(),
                &self.cancel,
            );
            agents.insert(agent_id.clone(), agent.clone());
            agent
        };

        info!(agent = %agent_id, "Background agent created");
        if self.started.load(Ordering::SeqCst) {
            self.scheduler.schedule(agent, interval);
        }
        Ok(agent_id)
    }

    /// Apply a partial config update. Reschedules when the interval
    /// changed; an in-flight run completes with its old config.
    pub async fn update_config(
        &self,
        agent_id: &str,
        patch: ConfigPatch,
    ) -> Result<(), ManagerError> {
        let agent = self.get(agent_id)?;
        if patch.is_empty() {
            return Ok(());
        }

        let new_interval = agent.apply_patch(patch).await;
        if let Some(interval_secs) = new_interval {
            if self.started.load(Ordering::SeqCst) {
                self.scheduler
                    .schedule(agent, Duration::from_secs(interval_secs));
            }
        }
        Ok(())
    }

    /// Pause an agent. Does not cancel an in-flight run.
    pub async fn pause(&self, agent_id: &str) -> Result<(), ManagerError> {
        self.get(agent_id)?.pause().await;
        Ok(())
    }

    /// Resume a paused agent.
    pub async fn resume(&self, agent_id: &str) -> Result<(), ManagerError> {
        self.get(agent_id)?.resume().await;
        Ok(())
    }

    /// Delete an agent: deregister, cancel any in-flight run, forget the
    /// record. Subsequent ticks are no-ops and the id resolves to NotFound.
    pub async fn delete_agent(&self, agent_id: &str) -> Result<(), ManagerError> {
        let agent = {
            let mut agents = self.agents.write().expect("manager lock poisoned");
            agents
                .remove(agent_id)
                .ok_or_else(|| ManagerError::NotFound(agent_id.to_string()))?
        };

        self.scheduler.unschedule(agent_id);
        agent.mark_deleted().await;
        info!(agent = %agent_id, "Background agent deleted");
        Ok(())
    }

    /// Snapshot one agent.
    pub async fn status(&self, agent_id: &str) -> Result<AgentStatus, ManagerError> {
        Ok(self.get(agent_id)?.status().await)
    }

    /// Snapshot every agent.
    pub async fn list(&self) -> Vec<AgentStatus> {
        let agents: Vec<Arc<BackgroundAgent>> = self
            .agents
            .read()
            .expect("manager lock poisoned")
            .values()
            .cloned()
            .collect();

        let mut statuses = Vec::with_capacity(agents.len());
        for agent in agents {
            statuses.push(agent.status().await);
        }
        statuses
    }

    /// Start scheduling. Agents created earlier are scheduled now.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Background agent manager starting");

        let agents: Vec<Arc<BackgroundAgent>> = self
            .agents
            .read()
            .expect("manager lock poisoned")
            .values()
            .cloned()
            .collect();
        for agent in agents {
            let interval = Duration::from_secs(agent.interval_secs().await);
            self.scheduler.schedule(agent, interval);
        }
    }

    /// Stop scheduling and cancel in-flight runs cooperatively. Each run
    /// stops at its next suspension point and releases its run-lock as it
    /// unwinds.
    pub async fn shutdown(&self) {
        info!("Background agent manager shutting down");
        self.started.store(false, Ordering::SeqCst);
        self.scheduler.shutdown();
        self.cancel.cancel();
    }
}
