//! A background agent: one scheduled task whose body is a reasoning
//! episode with a preset query and a dedicated session.
//!
//! The run-lock guarantees at most one in-flight execution; a tick that
//! finds it held is skipped, not queued. Retries use a fixed, cancelable
//! delay. Pausing mid-run takes effect when the run ends.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ironhive_agent::{EpisodeRequest, EpisodeStatus, ReactEngine};
use ironhive_core::agent::{AgentStatus, BackgroundAgentConfig, BackgroundState, ConfigPatch};
use ironhive_core::error::EngineError;
use ironhive_core::event::{AgentEvent, EventKind};
use ironhive_events::EventRouter;

pub struct BackgroundAgent {
    agent_id: String,
    session_id: String,
    config: tokio::sync::RwLock<BackgroundAgentConfig>,
    state: Mutex<BackgroundState>,
    pause_requested: AtomicBool,
    run_count: AtomicU64,
    error_count: AtomicU64,
    last_run_at: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
    run_lock: tokio::sync::Mutex<()>,
    engine: Arc<ReactEngine>,
    events: Arc<EventRouter>,
    cancel: CancellationToken,
}

impl BackgroundAgent {
    pub fn new(
        config: BackgroundAgentConfig,
        engine: Arc<ReactEngine>,
        events: Arc<EventRouter>,
        parent_cancel: &CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            agent_id: config.agent_id.clone(),
            session_id: config.session_id(),
            config: tokio::sync::RwLock::new(config),
            state: Mutex::new(BackgroundState::Idle),
            pause_requested: AtomicBool::new(false),
            run_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            last_run_at: Mutex::new(None),
            last_error: Mutex::new(None),
            run_lock: tokio::sync::Mutex::new(()),
            engine,
            events,
            cancel: parent_cancel.child_token(),
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> BackgroundState {
        *self.state.lock().expect("agent state lock poisoned")
    }

    fn set_state(&self, state: BackgroundState) {
        *self.state.lock().expect("agent state lock poisoned") = state;
    }

    pub async fn interval_secs(&self) -> u64 {
        self.config.read().await.interval_secs
    }

    /// Snapshot for `status`/`list`.
    pub async fn status(&self) -> AgentStatus {
        let config = self.config.read().await;
        AgentStatus {
            agent_id: self.agent_id.clone(),
            state: self.state(),
            description: config.task.description.clone(),
            run_count: self.run_count.load(Ordering::SeqCst),
            error_count: self.error_count.load(Ordering::SeqCst),
            last_run_at: *self.last_run_at.lock().expect("last_run_at lock poisoned"),
            last_error: self
                .last_error
                .lock()
                .expect("last_error lock poisoned")
                .clone(),
            interval_secs: config.interval_secs,
        }
    }

    /// Apply a partial config update. Returns the new interval when it
    /// changed, so the caller can reschedule. An in-flight run keeps the
    /// config it was started with.
    pub async fn apply_patch(&self, patch: ConfigPatch) -> Option<u64> {
        let mut config = self.config.write().await;
        let mut new_interval = None;

        if let Some(task) = patch.task {
            config.task = task;
        }
        if let Some(interval_secs) = patch.interval_secs {
            if interval_secs != config.interval_secs {
                new_interval = Some(interval_secs);
            }
            config.interval_secs = interval_secs;
        }
        if let Some(max_retries) = patch.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(retry_delay_secs) = patch.retry_delay_secs {
            config.retry_delay_secs = retry_delay_secs;
        }
        if let Some(model) = patch.model {
            config.model = model;
        }
        if let Some(system_instruction) = patch.system_instruction {
            config.system_instruction = system_instruction;
        }
        if let Some(limits) = patch.limits {
            config.limits = limits;
        }

        new_interval
    }

    /// Request a pause. Takes effect immediately when idle, otherwise at
    /// the end of the in-flight run.
    pub async fn pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
        if self.state() != BackgroundState::Running {
            self.set_state(BackgroundState::Paused);
            self.emit_status().await;
        }
    }

    /// Clear a pause.
    pub async fn resume(&self) {
        self.pause_requested.store(false, Ordering::SeqCst);
        if self.state() == BackgroundState::Paused {
            self.set_state(BackgroundState::Idle);
            self.emit_status().await;
        }
    }

    /// Mark deleted and cancel any in-flight run cooperatively.
    pub async fn mark_deleted(&self) {
        self.set_state(BackgroundState::Deleted);
        self.cancel.cancel();
        self.emit_status().await;
    }

    /// One scheduler tick.
    pub async fn trigger(&self) {
        if matches!(
            self.state(),
            BackgroundState::Paused | BackgroundState::Deleted
        ) {
            debug!(agent = %self.agent_id, state = %self.state(), "Tick ignored");
            return;
        }

        let Ok(_guard) = self.run_lock.try_lock() else {
            debug!(agent = %self.agent_id, "Previous run still in flight, skipping tick");
            self.emit(EventKind::SkippedBusy).await;
            return;
        };

        // The record may have been deleted between the state probe and the
        // lock acquisition.
        if self.state() == BackgroundState::Deleted {
            return;
        }

        self.set_state(BackgroundState::Running);
        self.emit(EventKind::TaskStarted {
            run_count: self.run_count.load(Ordering::SeqCst) + 1,
        })
        .await;
        self.emit_status().await;

        let config = self.config.read().await.clone();
        let started = std::time::Instant::now();
        let total_attempts = config.max_retries + 1;

        let mut succeeded = false;
        let mut cancelled = false;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let request = EpisodeRequest::new(&self.session_id, &self.agent_id, &config.task.query)
                .with_system_instruction(&config.system_instruction)
                .with_model(config.model.clone())
                .with_limits(config.limits.clone())
                .with_cancel(self.cancel.child_token());

            let failure = match self.engine.run(request).await {
                Ok(outcome) => match outcome.status {
                    EpisodeStatus::Completed => {
                        info!(agent = %self.agent_id, attempt, "Background run completed");
                        self.emit(EventKind::TaskCompleted {
                            duration_ms: started.elapsed().as_millis() as u64,
                        })
                        .await;
                        succeeded = true;
                        None
                    }
                    EpisodeStatus::Cancelled => {
                        info!(agent = %self.agent_id, "Background run cancelled");
                        cancelled = true;
                        None
                    }
                    EpisodeStatus::LimitExceeded(kind) => Some((
                        "limit_exceeded".to_string(),
                        format!("episode exceeded the {kind} budget"),
                    )),
                    EpisodeStatus::ParseFailure => Some((
                        "parse_failure".to_string(),
                        "model output unparseable past the retry budget".to_string(),
                    )),
                },
                Err(EngineError::Memory(e)) => {
                    Some(("backend_unavailable".to_string(), e.to_string()))
                }
                Err(EngineError::Llm(e)) => Some(("provider_error".to_string(), e.to_string())),
            };

            let Some((error_kind, message)) = failure else {
                break;
            };

            warn!(agent = %self.agent_id, attempt, error = %message, "Background run attempt failed");
            self.emit(EventKind::TaskError {
                attempt,
                error_kind,
                message: message.clone(),
            })
            .await;

            if attempt >= total_attempts {
                self.error_count.fetch_add(1, Ordering::SeqCst);
                *self.last_error.lock().expect("last_error lock poisoned") = Some(message);
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = tokio::time::sleep(std::time::Duration::from_secs(config.retry_delay_secs)) => {}
            }
        }

        self.run_count.fetch_add(1, Ordering::SeqCst);
        *self.last_run_at.lock().expect("last_run_at lock poisoned") = Some(Utc::now());

        let final_state = if self.state() == BackgroundState::Deleted {
            BackgroundState::Deleted
        } else if self.pause_requested.load(Ordering::SeqCst) {
            BackgroundState::Paused
        } else if succeeded || cancelled {
            BackgroundState::Idle
        } else {
            BackgroundState::Error
        };
        self.set_state(final_state);
        self.emit_status().await;
    }

    async fn emit(&self, kind: EventKind) {
        self.events
            .emit(AgentEvent::new(kind, &self.agent_id, &self.session_id))
            .await;
    }

    async fn emit_status(&self) {
        let kind = EventKind::AgentStatusChanged {
            state: self.state(),
            last_run_at: *self.last_run_at.lock().expect("last_run_at lock poisoned"),
            run_count: self.run_count.load(Ordering::SeqCst),
            error_count: self.error_count.load(Ordering::SeqCst),
        };
        self.emit(kind).await;
    }
}
