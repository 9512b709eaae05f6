//! Scripted LLM client for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ironhive_core::error::LlmError;
use ironhive_core::llm::{Completion, LlmClient, ModelConfig, TokenUsage};
use ironhive_core::message::Message;
use ironhive_core::tool::ToolDescriptor;

/// One scripted model turn.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub text: String,
    pub usage: TokenUsage,
    /// Simulated latency before the response lands.
    pub delay: Option<Duration>,
}

impl ScriptedResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            delay: None,
        }
    }

    pub fn with_usage(mut self, total: u64) -> Self {
        self.usage = TokenUsage {
            prompt_tokens: total / 2,
            completion_tokens: total - total / 2,
            total_tokens: total,
        };
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Returns its scripted responses in order. When the script runs out it
/// either repeats the last response (`repeat_last`) or errors.
pub struct ScriptedClient {
    responses: Vec<ScriptedResponse>,
    next: AtomicUsize,
    repeat_last: bool,
    /// Last user-visible message of each received request, for assertions.
    seen_queries: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses,
            next: AtomicUsize::new(0),
            repeat_last: false,
            seen_queries: Mutex::new(Vec::new()),
        }
    }

    pub fn from_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| ScriptedResponse::text(*t)).collect())
    }

    /// Keep replaying the final response once the script is exhausted.
    pub fn repeating_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// How many completions have been served.
    pub fn calls(&self) -> usize {
        self.next.load(Ordering::SeqCst).min(self.responses.len().max(1))
    }

    /// Total completions requested, including repeats.
    pub fn requests(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    /// The last user message of every request seen so far.
    pub fn seen_queries(&self) -> Vec<String> {
        self.seen_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _config: &ModelConfig,
        messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<Completion, LlmError> {
        if let Some(last_user) = messages
            .iter()
            .rev()
            .find(|m| m.role == ironhive_core::message::Role::User)
        {
            self.seen_queries
                .lock()
                .unwrap()
                .push(last_user.content.clone());
        }

        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let effective = if index >= self.responses.len() {
            if self.repeat_last && !self.responses.is_empty() {
                self.responses.len() - 1
            } else {
                return Err(LlmError::NotConfigured("script exhausted".into()));
            }
        } else {
            index
        };

        let response = self.responses[effective].clone();
        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(Completion {
            text: response.text,
            usage: Some(response.usage),
        })
    }
}
