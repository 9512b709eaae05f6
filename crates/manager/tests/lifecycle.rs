//! Control-plane lifecycle tests: non-reentrancy under a fast schedule,
//! config updates and deletes against in-flight runs, retry accounting,
//! and the idempotence laws. Timing-sensitive tests run under paused
//! virtual time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ironhive_agent::ReactEngine;
use ironhive_core::agent::{BackgroundAgentConfig, BackgroundState, ConfigPatch, TaskConfig};
use ironhive_core::error::{LlmError, ManagerError};
use ironhive_core::event::{AgentEvent, EventKind};
use ironhive_core::llm::{Completion, LlmClient, ModelConfig, TokenUsage};
use ironhive_core::message::{Message, Role};
use ironhive_core::tool::{ToolDescriptor, ToolRegistry};
use ironhive_events::EventRouter;
use ironhive_manager::BackgroundAgentManager;
use ironhive_memory::MemoryRouter;
use ironhive_tools::ToolResolver;

/// Answers after a configurable delay and tracks concurrency, so overlap
/// would be visible as `max_concurrent > 1`.
struct ProbeClient {
    delay: Duration,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
    entered: AtomicUsize,
    seen_queries: Mutex<Vec<String>>,
}

impl ProbeClient {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            entered: AtomicUsize::new(0),
            seen_queries: Mutex::new(Vec::new()),
        })
    }

    fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    fn seen_queries(&self) -> Vec<String> {
        self.seen_queries.lock().unwrap().clone()
    }
}

/// Decrements the in-flight counter even when the call future is dropped
/// by cancellation.
struct ConcurrencyGuard<'a>(&'a AtomicUsize);

impl Drop for ConcurrencyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmClient for ProbeClient {
    fn name(&self) -> &str {
        "probe"
    }

    async fn complete(
        &self,
        _config: &ModelConfig,
        messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<Completion, LlmError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        let _guard = ConcurrencyGuard(&self.concurrent);

        if let Some(last_user) = messages.iter().rev().find(|m| m.role == Role::User) {
            self.seen_queries.lock().unwrap().push(last_user.content.clone());
        }

        tokio::time::sleep(self.delay).await;

        Ok(Completion {
            text: "Final Answer: done".into(),
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }
}

/// Always fails, for the retry path.
struct FailingClient;

#[async_trait]
impl LlmClient for FailingClient {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(
        &self,
        _config: &ModelConfig,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<Completion, LlmError> {
        Err(LlmError::Network("connection refused".into()))
    }
}

struct Harness {
    manager: BackgroundAgentManager,
    events: Arc<EventRouter>,
}

fn harness(client: Arc<dyn LlmClient>) -> Harness {
    let memory = Arc::new(MemoryRouter::in_memory());
    let events = Arc::new(EventRouter::in_memory());
    let resolver = Arc::new(ToolResolver::new(Arc::new(ToolRegistry::new())));
    let engine = Arc::new(ReactEngine::new(
        client,
        resolver,
        memory,
        events.clone(),
    ));
    Harness {
        manager: BackgroundAgentManager::new(engine, events.clone()),
        events,
    }
}

fn agent_config(agent_id: &str, interval_secs: u64) -> BackgroundAgentConfig {
    let mut config =
        BackgroundAgentConfig::new(agent_id, TaskConfig::new("Report the queue depth."));
    config.interval_secs = interval_secs;
    config.max_retries = 0;
    config.retry_delay_secs = 1;
    config
}

async fn collect_events(events: &EventRouter, session_id: &str) -> Vec<AgentEvent> {
    let mut rx = events.stream(session_id).await.unwrap();
    let mut collected = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
        collected.push(event);
    }
    collected
}

#[tokio::test]
async fn duplicate_id_rejected() {
    let h = harness(ProbeClient::new(Duration::from_millis(1)));
    h.manager.create_agent(agent_config("a", 60)).unwrap();
    let err = h.manager.create_agent(agent_config("a", 60)).unwrap_err();
    assert_eq!(err, ManagerError::DuplicateId("a".into()));
}

#[tokio::test]
async fn invalid_config_rejected() {
    let h = harness(ProbeClient::new(Duration::from_millis(1)));
    let mut config = agent_config("a", 60);
    config.task.query = "  ".into();
    assert!(matches!(
        h.manager.create_agent(config),
        Err(ManagerError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn unknown_agent_is_not_found() {
    let h = harness(ProbeClient::new(Duration::from_millis(1)));
    assert_eq!(
        h.manager.status("ghost").await.unwrap_err(),
        ManagerError::NotFound("ghost".into())
    );
    assert_eq!(
        h.manager.pause("ghost").await.unwrap_err(),
        ManagerError::NotFound("ghost".into())
    );
    assert!(h.manager.delete_agent("ghost").await.is_err());
}

#[tokio::test]
async fn pause_then_resume_on_idle_agent_is_identity() {
    let h = harness(ProbeClient::new(Duration::from_millis(1)));
    h.manager.create_agent(agent_config("a", 60)).unwrap();

    let before = h.manager.status("a").await.unwrap();
    h.manager.pause("a").await.unwrap();
    assert_eq!(
        h.manager.status("a").await.unwrap().state,
        BackgroundState::Paused
    );
    h.manager.resume("a").await.unwrap();

    let after = h.manager.status("a").await.unwrap();
    assert_eq!(after.state, BackgroundState::Idle);
    assert_eq!(after.run_count, before.run_count);
    assert_eq!(after.error_count, before.error_count);
}

#[tokio::test]
async fn empty_patch_is_a_noop() {
    let h = harness(ProbeClient::new(Duration::from_millis(1)));
    h.manager.create_agent(agent_config("a", 60)).unwrap();

    let before = h.manager.status("a").await.unwrap();
    h.manager
        .update_config("a", ConfigPatch::default())
        .await
        .unwrap();
    let after = h.manager.status("a").await.unwrap();

    assert_eq!(after.run_count, before.run_count);
    assert_eq!(after.interval_secs, before.interval_secs);
}

#[tokio::test]
async fn status_surfaces_the_task_description() {
    let h = harness(ProbeClient::new(Duration::from_millis(1)));

    let mut config = agent_config("a", 60);
    config.task.description = Some("hourly queue report".into());
    h.manager.create_agent(config).unwrap();

    let status = h.manager.status("a").await.unwrap();
    assert_eq!(status.description.as_deref(), Some("hourly queue report"));

    // Replacing the task replaces the description with it.
    h.manager
        .update_config(
            "a",
            ConfigPatch {
                task: Some(TaskConfig::new("something else")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let status = h.manager.status("a").await.unwrap();
    assert_eq!(status.description, None);
}

#[tokio::test(start_paused = true)]
async fn s4_fast_interval_never_overlaps() {
    let client = ProbeClient::new(Duration::from_secs(3));
    let h = harness(client.clone());

    h.manager.create_agent(agent_config("a", 1)).unwrap();
    h.manager.start().await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    h.manager.shutdown().await;

    assert_eq!(client.max_concurrent(), 1, "runs must never overlap");

    let status = h.manager.status("a").await.unwrap();
    assert!(
        (2..=4).contains(&status.run_count),
        "a 3s body on a 1s interval over 10s should finish 2..=4 runs, got {}",
        status.run_count
    );
    assert_eq!(status.error_count, 0);

    let events = collect_events(&h.events, "background:a").await;
    let skipped = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::SkippedBusy))
        .count();
    assert!(skipped >= 4, "busy ticks must be skipped, got {skipped}");

    let started = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::TaskStarted { .. }))
        .count();
    assert!(started >= 2);
}

#[tokio::test(start_paused = true)]
async fn s5_update_during_run_applies_to_next_trigger() {
    let client = ProbeClient::new(Duration::from_secs(2));
    let h = harness(client.clone());

    let mut config = agent_config("a", 10);
    config.task.query = "first question".into();
    h.manager.create_agent(config).unwrap();
    h.manager.start().await;

    // t=1: the first run (started at t=0) is still in flight.
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.manager
        .update_config(
            "a",
            ConfigPatch {
                task: Some(TaskConfig::new("second question")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // t=4: the first run has completed, with the old query.
    tokio::time::sleep(Duration::from_secs(3)).await;
    let status = h.manager.status("a").await.unwrap();
    assert_eq!(status.run_count, 1, "in-flight run counts exactly once");
    assert_eq!(client.seen_queries(), vec!["first question".to_string()]);

    // t=14: the second tick (t=10) ran with the new query.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let status = h.manager.status("a").await.unwrap();
    assert_eq!(status.run_count, 2);
    let queries = client.seen_queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[1].contains("second question"));

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn s6_delete_during_run_cancels_and_forgets() {
    let client = ProbeClient::new(Duration::from_secs(5));
    let h = harness(client.clone());

    h.manager.create_agent(agent_config("a", 10)).unwrap();
    h.manager.start().await;

    // t=1: mid-run.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(client.entered(), 1);
    h.manager.delete_agent("a").await.unwrap();

    // The id is immediately unresolvable.
    assert_eq!(
        h.manager.status("a").await.unwrap_err(),
        ManagerError::NotFound("a".into())
    );

    // t=21: well past several would-be ticks; nothing else ran.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(client.entered(), 1, "no trigger may fire after delete");
    assert_eq!(client.max_concurrent(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_runs_retry_then_record_the_error() {
    let h = harness(Arc::new(FailingClient));

    let mut config = agent_config("a", 1_000);
    config.max_retries = 1;
    config.retry_delay_secs = 5;
    h.manager.create_agent(config).unwrap();
    h.manager.start().await;

    // First run starts immediately: attempt at t=0 fails, retry at t=5 fails.
    tokio::time::sleep(Duration::from_secs(10)).await;

    let status = h.manager.status("a").await.unwrap();
    assert_eq!(status.run_count, 1);
    assert_eq!(status.error_count, 1);
    assert_eq!(status.state, BackgroundState::Error);
    assert!(status.last_error.is_some());
    assert!(status.last_run_at.is_some());

    let events = collect_events(&h.events, "background:a").await;
    let task_errors = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::TaskError { .. }))
        .count();
    assert_eq!(task_errors, 2, "one TaskError per attempt");

    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_future_ticks() {
    let client = ProbeClient::new(Duration::from_millis(10));
    let h = harness(client.clone());

    h.manager.create_agent(agent_config("a", 1)).unwrap();
    h.manager.start().await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    h.manager.shutdown().await;
    let after_shutdown = client.entered();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(client.entered(), after_shutdown);
}

#[tokio::test(start_paused = true)]
async fn interval_update_reschedules_from_the_update_moment() {
    let client = ProbeClient::new(Duration::from_millis(10));
    let h = harness(client.clone());

    h.manager.create_agent(agent_config("a", 1_000)).unwrap();
    h.manager.start().await;

    // t=1: only the immediate first run has happened.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(client.entered(), 1);

    h.manager
        .update_config(
            "a",
            ConfigPatch {
                interval_secs: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // The replacement ticker fires immediately, then every 2s.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(
        client.entered() >= 3,
        "expected runs on the new interval, got {}",
        client.entered()
    );

    h.manager.shutdown().await;
}
