//! LLM client abstraction.
//!
//! The runtime consumes a single capability: send messages, get text and
//! token usage back. Concrete provider SDKs live outside this workspace;
//! anything that can answer `complete` plugs in here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::message::Message;
use crate::tool::ToolDescriptor;

/// Model parameters for a single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider id (e.g., "openai", "anthropic")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// The model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum tokens to generate per call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4.1".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: None,
            max_tokens: None,
        }
    }
}

/// Token usage statistics for one or more calls.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Accumulate another usage sample into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A complete response from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub text: String,

    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

/// The LLM capability consumed by the reasoning loop.
///
/// The tool descriptors are a hint: providers with structured function
/// calling may use them, text-only providers can ignore them because the
/// prompt already documents the tools.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Send a conversation and get a completion.
    async fn complete(
        &self,
        config: &ModelConfig,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Completion, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_config_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, "openai");
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.max_tokens.is_none());
    }

    #[test]
    fn model_config_from_partial_toml() {
        let config: ModelConfig = toml::from_str("model = \"gpt-4o-mini\"").unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.provider, "openai");
    }

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(&TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        total.add(&TokenUsage {
            prompt_tokens: 7,
            completion_tokens: 3,
            total_tokens: 10,
        });
        assert_eq!(total.total_tokens, 25);
        assert_eq!(total.prompt_tokens, 17);
    }
}
