//! Tool trait, descriptors, result envelopes, and the in-process registry.
//!
//! Tools are what give an agent the ability to act in the world. The local
//! registry (this module) holds in-process callables; remote providers are
//! fronted by the facade in the tools crate. Both produce the same
//! normalized [`ToolResultEnvelope`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::warn;

use crate::error::{ToolError, ToolErrorKind};

/// Which family of provider served a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// In-process registered callable
    Local,
    /// Remote provider behind the facade
    Remote,
}

/// Description of a callable tool, as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique name within its namespace
    pub name: String,

    /// What the tool does (sent to the LLM)
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,

    /// Which provider family owns the tool
    pub provider: ProviderKind,
}

/// A request to execute a tool, produced by the action parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// The normalized result of a tool call, regardless of provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultEnvelope {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub ok: bool,

    /// Output on success, error text on failure
    pub content: String,

    /// Failure classification, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,

    /// Wall-clock duration of the call
    pub duration_ms: u64,

    /// Which provider family served the call
    pub provider: ProviderKind,
}

impl ToolResultEnvelope {
    pub fn success(
        call_id: impl Into<String>,
        provider: ProviderKind,
        content: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            ok: true,
            content: content.into(),
            error_kind: None,
            duration_ms,
            provider,
        }
    }

    pub fn failure(
        call_id: impl Into<String>,
        provider: ProviderKind,
        kind: ToolErrorKind,
        message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            ok: false,
            content: message.into(),
            error_kind: Some(kind),
            duration_ms,
            provider,
        }
    }
}

/// The core Tool trait.
///
/// Each in-process tool implements this trait and is registered in the
/// [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    /// Convert this tool into a descriptor for catalogs and prompts.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
            provider: ProviderKind::Local,
        }
    }
}

/// Adapter turning a synchronous closure into a [`Tool`].
///
/// The closure runs on the blocking worker pool so it may do blocking work.
pub struct FnTool {
    name: String,
    description: String,
    schema: serde_json::Value,
    f: Arc<dyn Fn(serde_json::Value) -> Result<String, String> + Send + Sync>,
}

impl FnTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        f: impl Fn(serde_json::Value) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            f: Arc::new(f),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let f = self.f.clone();
        let name = self.name.clone();
        let joined = tokio::task::spawn_blocking(move || f(arguments)).await;
        match joined {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(reason)) => Err(ToolError::ExecutionFailed { tool: name, reason }),
            Err(e) => Err(ToolError::ExecutionFailed {
                tool: name,
                reason: e.to_string(),
            }),
        }
    }
}

/// Validate arguments against a JSON schema.
pub fn validate_arguments(
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> Result<(), String> {
    let validator = jsonschema::options()
        .build(schema)
        .map_err(|e| format!("failed to compile validation schema: {e}"))?;

    if validator.is_valid(arguments) {
        Ok(())
    } else {
        let messages: Vec<String> = validator
            .iter_errors(arguments)
            .map(|e| format!("- {e}"))
            .collect();
        Err(format!(
            "schema validation failed:\n{}",
            messages.join("\n")
        ))
    }
}

/// The in-process tool catalog.
///
/// Registration is allowed at runtime; readers always see either the old or
/// the new full entry, never a partial one.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool. Duplicate names overwrite with a warning.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        if tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Overwriting existing tool registration");
        }
    }

    /// Register a synchronous closure as a tool.
    pub fn register_fn(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        f: impl Fn(serde_json::Value) -> Result<String, String> + Send + Sync + 'static,
    ) {
        self.register(Arc::new(FnTool::new(name, description, schema, f)));
    }

    /// Get a tool by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .contains_key(name)
    }

    /// Descriptors of all registered tools.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .values()
            .map(|t| t.descriptor())
            .collect()
    }

    /// Names of all registered tools.
    pub fn names(&self) -> Vec<String> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Execute a tool call with argument validation and a deadline.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// envelope so the reasoning loop can feed it back to the model.
    pub async fn execute(&self, call: &ToolCall, timeout: Duration) -> ToolResultEnvelope {
        let started = std::time::Instant::now();
        let elapsed = |s: std::time::Instant| s.elapsed().as_millis() as u64;

        let Some(tool) = self.lookup(&call.name) else {
            return ToolResultEnvelope::failure(
                &call.id,
                ProviderKind::Local,
                ToolErrorKind::UnknownTool,
                format!("Tool not found: {}", call.name),
                elapsed(started),
            );
        };

        if let Err(reason) = validate_arguments(&tool.parameters_schema(), &call.arguments) {
            return ToolResultEnvelope::failure(
                &call.id,
                ProviderKind::Local,
                ToolErrorKind::BadArguments,
                reason,
                elapsed(started),
            );
        }

        match tokio::time::timeout(timeout, tool.execute(call.arguments.clone())).await {
            Ok(Ok(output)) => ToolResultEnvelope::success(
                &call.id,
                ProviderKind::Local,
                output,
                elapsed(started),
            ),
            Ok(Err(e)) => ToolResultEnvelope::failure(
                &call.id,
                ProviderKind::Local,
                e.kind(),
                e.to_string(),
                elapsed(started),
            ),
            Err(_) => ToolResultEnvelope::failure(
                &call.id,
                ProviderKind::Local,
                ToolErrorKind::Timeout,
                format!(
                    "Tool call timed out after {}s: {}",
                    timeout.as_secs(),
                    call.name
                ),
                elapsed(started),
            ),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
