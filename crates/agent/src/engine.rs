//! The ReAct engine — one reasoning episode from query to terminal state.
//!
//! Each step calls the model, parses its output into a tool call or a final
//! answer, dispatches tool calls through the resolver, and feeds the
//! observation back through session memory. Tool-layer failures are written
//! into the conversation so the model can recover; only memory or LLM
//! failures abort the episode. Budgets are checked after every step.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ironhive_core::config::RunLimits;
use ironhive_core::error::{EngineError, LimitKind};
use ironhive_core::event::{AgentEvent, EventKind};
use ironhive_core::llm::{LlmClient, ModelConfig};
use ironhive_core::message::Message;
use ironhive_core::tool::ToolCall;
use ironhive_events::EventRouter;
use ironhive_memory::MemoryRouter;
use ironhive_tools::ToolResolver;

use crate::loop_detector::{LoopDetector, STUCK_GUIDANCE};
use crate::parser::{parse_output, ParsedAction};
use crate::prompt::build_system_prompt;

/// Identical consecutive tool calls tolerated before corrective guidance.
const LOOP_THRESHOLD: usize = 3;

/// Everything one episode needs.
pub struct EpisodeRequest {
    pub session_id: String,
    pub agent_name: String,
    pub query: String,
    pub system_instruction: String,
    pub model: ModelConfig,
    pub limits: RunLimits,
    pub cancel: CancellationToken,
}

impl EpisodeRequest {
    pub fn new(
        session_id: impl Into<String>,
        agent_name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            agent_name: agent_name.into(),
            query: query.into(),
            system_instruction: String::new(),
            model: ModelConfig::default(),
            limits: RunLimits::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// How an episode ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeStatus {
    /// The model produced a final answer
    Completed,
    /// A step, request, or token budget was exhausted
    LimitExceeded(LimitKind),
    /// Model output stayed unparseable past the retry budget
    ParseFailure,
    /// Cooperative cancellation stopped the episode
    Cancelled,
}

/// The result of one episode, with accumulated usage.
#[derive(Debug, Clone)]
pub struct EpisodeOutcome {
    pub status: EpisodeStatus,
    pub answer: Option<String>,
    pub steps: u32,
    pub requests: u32,
    pub tokens: u64,
}

pub struct ReactEngine {
    llm: Arc<dyn LlmClient>,
    resolver: Arc<ToolResolver>,
    memory: Arc<MemoryRouter>,
    events: Arc<EventRouter>,
}

impl ReactEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        resolver: Arc<ToolResolver>,
        memory: Arc<MemoryRouter>,
        events: Arc<EventRouter>,
    ) -> Self {
        Self {
            llm,
            resolver,
            memory,
            events,
        }
    }

    /// Run one episode to a terminal state.
    ///
    /// Recoverable conditions end up in the returned outcome; only fatal
    /// memory or LLM errors are returned as `Err`.
    pub async fn run(&self, request: EpisodeRequest) -> Result<EpisodeOutcome, EngineError> {
        let EpisodeRequest {
            session_id,
            agent_name,
            query,
            system_instruction,
            model,
            limits,
            cancel,
        } = request;

        let tool_descriptors = self.resolver.list_tools();
        let system_prompt = build_system_prompt(&system_instruction, &tool_descriptors);

        info!(
            session = %session_id,
            agent = %agent_name,
            model = %model.model,
            max_steps = limits.max_steps,
            "Episode starting"
        );

        self.memory
            .append(Message::user(&session_id, &query).with_agent_name(&agent_name))
            .await?;
        self.emit(
            EventKind::UserMessage {
                content: query.clone(),
            },
            &agent_name,
            &session_id,
        )
        .await;

        let mut steps = 0u32;
        let mut requests = 0u32;
        let mut tokens = 0u64;
        let mut parse_errors = 0u32;
        let mut detector = LoopDetector::new(LOOP_THRESHOLD);

        loop {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(&agent_name, &session_id, steps, requests, tokens));
            }

            // ── Reasoning: bounded context, one model call ──
            let history = self
                .memory
                .get_messages_bounded(&session_id, Some(&agent_name), limits.max_context_tokens)
                .await?;
            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(Message::system(&session_id, &system_prompt));
            messages.extend(history);

            self.emit(
                EventKind::AgentCall {
                    model: model.model.clone(),
                },
                &agent_name,
                &session_id,
            )
            .await;

            let completion = tokio::select! {
                _ = cancel.cancelled() => {
                    return Ok(self.cancelled(&agent_name, &session_id, steps, requests, tokens));
                }
                result = self.llm.complete(&model, &messages, &tool_descriptors) => result?,
            };

            steps += 1;
            requests += 1;
            if let Some(usage) = &completion.usage {
                tokens += usage.total_tokens;
            }
            debug!(step = steps, requests, tokens, "Model responded");

            // ── Parse ──
            match parse_output(&completion.text) {
                Ok(ParsedAction::FinalAnswer(answer)) => {
                    self.memory
                        .append(
                            Message::assistant(&session_id, &answer).with_agent_name(&agent_name),
                        )
                        .await?;
                    self.emit(
                        EventKind::FinalAnswer {
                            content: answer.clone(),
                            tokens_used: tokens,
                            steps,
                        },
                        &agent_name,
                        &session_id,
                    )
                    .await;

                    info!(steps, tokens, "Episode completed");
                    return Ok(EpisodeOutcome {
                        status: EpisodeStatus::Completed,
                        answer: Some(answer),
                        steps,
                        requests,
                        tokens,
                    });
                }

                Ok(ParsedAction::ToolUse { name, arguments }) => {
                    let call = ToolCall::new(name, arguments);

                    self.memory
                        .append(
                            Message::assistant(&session_id, &completion.text)
                                .with_agent_name(&agent_name)
                                .with_metadata(
                                    "tool_calls",
                                    serde_json::json!([{
                                        "id": call.id,
                                        "name": call.name,
                                        "arguments": call.arguments,
                                    }]),
                                ),
                        )
                        .await?;
                    self.emit(
                        EventKind::ToolCall {
                            call_id: call.id.clone(),
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                        &agent_name,
                        &session_id,
                    )
                    .await;

                    // ── Acting: dispatch through the resolver ──
                    // An already-dispatched call is not cancelled; it is
                    // bounded by its own timeout.
                    let envelope = self
                        .resolver
                        .dispatch(&call, limits.tool_call_timeout())
                        .await;

                    if !envelope.ok {
                        warn!(
                            tool = %call.name,
                            kind = ?envelope.error_kind,
                            "Tool call failed, reporting to the model"
                        );
                    }

                    // ── Observing: reify the result into the conversation ──
                    self.memory
                        .append(
                            Message::tool_result(&session_id, &call.id, &envelope.content)
                                .with_agent_name(&agent_name),
                        )
                        .await?;
                    self.emit(
                        EventKind::ToolResult {
                            call_id: call.id.clone(),
                            ok: envelope.ok,
                            duration_ms: envelope.duration_ms,
                            error_kind: envelope.error_kind,
                        },
                        &agent_name,
                        &session_id,
                    )
                    .await;
                    self.emit(
                        EventKind::Observation {
                            content: envelope.content.clone(),
                        },
                        &agent_name,
                        &session_id,
                    )
                    .await;

                    detector.record(&call.name, &call.arguments);
                    if detector.is_stuck() {
                        warn!(tool = %call.name, "Repeated identical tool calls, injecting guidance");
                        self.memory
                            .append(
                                Message::user(&session_id, STUCK_GUIDANCE)
                                    .with_agent_name(&agent_name),
                            )
                            .await?;
                        detector.reset();
                    }
                }

                Err(parse_error) => {
                    parse_errors += 1;
                    self.emit(
                        EventKind::ParseError {
                            raw_output: completion.text.clone(),
                            attempt: parse_errors,
                        },
                        &agent_name,
                        &session_id,
                    )
                    .await;
                    self.memory
                        .append(
                            Message::assistant(&session_id, &completion.text)
                                .with_agent_name(&agent_name),
                        )
                        .await?;

                    if parse_errors > limits.parse_retry_budget {
                        warn!(attempts = parse_errors, "Parse retry budget exhausted");
                        return Ok(EpisodeOutcome {
                            status: EpisodeStatus::ParseFailure,
                            answer: None,
                            steps,
                            requests,
                            tokens,
                        });
                    }

                    let corrective = format!(
                        "Invalid response format: {parse_error}. Reply with either\nAction: {{\"tool\": \"<tool_name>\", \"parameters\": {{...}}}}\nor\nFinal Answer: <your answer>"
                    );
                    self.memory
                        .append(Message::user(&session_id, corrective).with_agent_name(&agent_name))
                        .await?;
                }
            }

            // ── Limit checks, after the step's effects are committed ──
            if steps >= limits.max_steps {
                warn!(steps, "Step limit reached");
                return Ok(self.limit_exceeded(LimitKind::Steps, steps, requests, tokens));
            }
            if requests >= limits.request_limit {
                warn!(requests, "Request limit reached");
                return Ok(self.limit_exceeded(LimitKind::Requests, steps, requests, tokens));
            }
            if tokens >= limits.total_tokens_limit {
                warn!(tokens, "Token limit reached");
                return Ok(self.limit_exceeded(LimitKind::Tokens, steps, requests, tokens));
            }
        }
    }

    fn limit_exceeded(
        &self,
        kind: LimitKind,
        steps: u32,
        requests: u32,
        tokens: u64,
    ) -> EpisodeOutcome {
        EpisodeOutcome {
            status: EpisodeStatus::LimitExceeded(kind),
            answer: None,
            steps,
            requests,
            tokens,
        }
    }

    fn cancelled(
        &self,
        agent_name: &str,
        session_id: &str,
        steps: u32,
        requests: u32,
        tokens: u64,
    ) -> EpisodeOutcome {
        info!(agent = %agent_name, session = %session_id, steps, "Episode cancelled");
        EpisodeOutcome {
            status: EpisodeStatus::Cancelled,
            answer: None,
            steps,
            requests,
            tokens,
        }
    }

    async fn emit(&self, kind: EventKind, agent_name: &str, session_id: &str) {
        self.events
            .emit(AgentEvent::new(kind, agent_name, session_id))
            .await;
    }
}
