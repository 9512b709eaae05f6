//! Remote tool facade — one namespace over many remote providers.
//!
//! Transport, handshake, and authentication live outside this crate; a
//! provider arrives here already connected and only has to answer
//! `list_tools` and `call_tool`. Discovery builds a public-name catalog;
//! name collisions across providers are disambiguated deterministically by
//! suffixing the provider id.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use ironhive_core::error::{ToolError, ToolErrorKind};
use ironhive_core::tool::{validate_arguments, ProviderKind, ToolCall, ToolDescriptor, ToolResultEnvelope};

/// A tool as advertised by a remote provider.
#[derive(Debug, Clone)]
pub struct RemoteToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The provider-level result of a remote call. Transport failures are
/// `Err(ToolError)`; a tool that ran but signaled failure is `ok: false`.
#[derive(Debug, Clone)]
pub struct RemoteCallOutcome {
    pub ok: bool,
    pub content: String,
}

/// An already-connected remote tool provider.
#[async_trait]
pub trait RemoteToolProvider: Send + Sync {
    /// Stable provider id, used for collision suffixes.
    fn id(&self) -> &str;

    /// Advertise the provider's tools.
    async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, ToolError>;

    /// Invoke a tool by its provider-side name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<RemoteCallOutcome, ToolError>;
}

struct CatalogEntry {
    provider: Arc<dyn RemoteToolProvider>,
    remote_name: String,
    description: String,
    parameters: serde_json::Value,
}

pub struct RemoteToolFacade {
    providers: Vec<Arc<dyn RemoteToolProvider>>,
    catalog: RwLock<HashMap<String, CatalogEntry>>,
}

impl RemoteToolFacade {
    pub fn new(providers: Vec<Arc<dyn RemoteToolProvider>>) -> Self {
        Self {
            providers,
            catalog: RwLock::new(HashMap::new()),
        }
    }

    /// Ask every provider for its tools and rebuild the public catalog.
    ///
    /// A provider that fails to answer is skipped with a warning so one
    /// broken connection does not hide the others. Returns the number of
    /// tools in the rebuilt catalog.
    pub async fn discover(&self) -> usize {
        let mut fresh: HashMap<String, CatalogEntry> = HashMap::new();

        for provider in &self.providers {
            let specs = match provider.list_tools().await {
                Ok(specs) => specs,
                Err(e) => {
                    warn!(provider = provider.id(), error = %e, "Tool discovery failed, skipping provider");
                    continue;
                }
            };

            for spec in specs {
                let public_name = if fresh.contains_key(&spec.name) {
                    let qualified = format!("{}__{}", spec.name, provider.id());
                    warn!(
                        tool = %spec.name,
                        provider = provider.id(),
                        public_name = %qualified,
                        "Tool name collision, disambiguating"
                    );
                    qualified
                } else {
                    spec.name.clone()
                };

                debug!(provider = provider.id(), tool = %public_name, "Discovered remote tool");
                fresh.insert(
                    public_name,
                    CatalogEntry {
                        provider: provider.clone(),
                        remote_name: spec.name,
                        description: spec.description,
                        parameters: spec.parameters,
                    },
                );
            }
        }

        let count = fresh.len();
        *self.catalog.write().expect("facade catalog lock poisoned") = fresh;
        count
    }

    /// Whether a public name is in the catalog.
    pub fn contains(&self, name: &str) -> bool {
        self.catalog
            .read()
            .expect("facade catalog lock poisoned")
            .contains_key(name)
    }

    /// Descriptors of all discovered tools.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.catalog
            .read()
            .expect("facade catalog lock poisoned")
            .iter()
            .map(|(public_name, entry)| ToolDescriptor {
                name: public_name.clone(),
                description: entry.description.clone(),
                parameters: entry.parameters.clone(),
                provider: ProviderKind::Remote,
            })
            .collect()
    }

    /// Execute a discovered tool with validation and a deadline.
    ///
    /// No retries here: retry policy belongs to the caller.
    pub async fn execute(&self, call: &ToolCall, timeout: Duration) -> ToolResultEnvelope {
        let started = std::time::Instant::now();
        let elapsed = |s: std::time::Instant| s.elapsed().as_millis() as u64;

        let (provider, remote_name, parameters) = {
            let catalog = self.catalog.read().expect("facade catalog lock poisoned");
            match catalog.get(&call.name) {
                Some(entry) => (
                    entry.provider.clone(),
                    entry.remote_name.clone(),
                    entry.parameters.clone(),
                ),
                None => {
                    return ToolResultEnvelope::failure(
                        &call.id,
                        ProviderKind::Remote,
                        ToolErrorKind::UnknownTool,
                        format!("Tool not found: {}", call.name),
                        elapsed(started),
                    );
                }
            }
        };

        if let Err(reason) = validate_arguments(&parameters, &call.arguments) {
            return ToolResultEnvelope::failure(
                &call.id,
                ProviderKind::Remote,
                ToolErrorKind::BadArguments,
                reason,
                elapsed(started),
            );
        }

        match tokio::time::timeout(timeout, provider.call_tool(&remote_name, &call.arguments)).await
        {
            Ok(Ok(outcome)) => {
                if outcome.ok {
                    ToolResultEnvelope::success(
                        &call.id,
                        ProviderKind::Remote,
                        outcome.content,
                        elapsed(started),
                    )
                } else {
                    ToolResultEnvelope::failure(
                        &call.id,
                        ProviderKind::Remote,
                        ToolErrorKind::ToolFailure,
                        outcome.content,
                        elapsed(started),
                    )
                }
            }
            Ok(Err(e)) => ToolResultEnvelope::failure(
                &call.id,
                ProviderKind::Remote,
                ToolErrorKind::ProviderError,
                e.to_string(),
                elapsed(started),
            ),
            Err(_) => ToolResultEnvelope::failure(
                &call.id,
                ProviderKind::Remote,
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

#[cfg(test)]
mod tests {
    use super::*;

    /// A provider serving a fixed set of tools that echo their arguments.
    struct StaticProvider {
        id: String,
        tools: Vec<RemoteToolSpec>,
        fail_calls: bool,
    }

    impl StaticProvider {
        fn new(id: &str, tool_names: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                id: id.into(),
                tools: tool_names
                    .iter()
                    .map(|name| RemoteToolSpec {
                        name: name.to_string(),
                        description: format!("{name} from {id}"),
                        parameters: serde_json::json!({
                            "type": "object",
                            "properties": { "value": { "type": "string" } },
                            "required": ["value"]
                        }),
                    })
                    .collect(),
                fail_calls: false,
            })
        }
    }

    #[async_trait]
    impl RemoteToolProvider for StaticProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, ToolError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: &serde_json::Value,
        ) -> Result<RemoteCallOutcome, ToolError> {
            if self.fail_calls {
                return Err(ToolError::Provider {
                    tool: name.into(),
                    reason: "connection reset".into(),
                });
            }
            Ok(RemoteCallOutcome {
                ok: true,
                content: format!("{}:{}", self.id, arguments["value"].as_str().unwrap_or("")),
            })
        }
    }

    #[tokio::test]
    async fn discovery_builds_catalog() {
        let facade = RemoteToolFacade::new(vec![StaticProvider::new("alpha", &["search", "fetch"])]);
        assert_eq!(facade.discover().await, 2);
        assert!(facade.contains("search"));
        assert!(facade.contains("fetch"));
        assert_eq!(facade.list().len(), 2);
    }

    #[tokio::test]
    async fn collisions_get_provider_suffix() {
        let facade = RemoteToolFacade::new(vec![
            StaticProvider::new("alpha", &["search"]),
            StaticProvider::new("beta", &["search"]),
        ]);
        assert_eq!(facade.discover().await, 2);
        assert!(facade.contains("search"));
        assert!(facade.contains("search__beta"));
    }

    #[tokio::test]
    async fn suffixed_name_routes_to_its_provider() {
        let facade = RemoteToolFacade::new(vec![
            StaticProvider::new("alpha", &["search"]),
            StaticProvider::new("beta", &["search"]),
        ]);
        facade.discover().await;

        let call = ToolCall::new("search__beta", serde_json::json!({"value": "x"}));
        let envelope = facade.execute(&call, Duration::from_secs(5)).await;
        assert!(envelope.ok);
        assert_eq!(envelope.content, "beta:x");
        assert_eq!(envelope.provider, ProviderKind::Remote);
    }

    #[tokio::test]
    async fn unknown_tool_envelope() {
        let facade = RemoteToolFacade::new(vec![]);
        facade.discover().await;

        let call = ToolCall::new("ghost", serde_json::json!({}));
        let envelope = facade.execute(&call, Duration::from_secs(1)).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.error_kind, Some(ToolErrorKind::UnknownTool));
    }

    #[tokio::test]
    async fn arguments_validated_against_cached_schema() {
        let facade = RemoteToolFacade::new(vec![StaticProvider::new("alpha", &["search"])]);
        facade.discover().await;

        let call = ToolCall::new("search", serde_json::json!({"value": 42}));
        let envelope = facade.execute(&call, Duration::from_secs(1)).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.error_kind, Some(ToolErrorKind::BadArguments));
    }

    #[tokio::test]
    async fn transport_error_becomes_provider_error() {
        let provider = Arc::new(StaticProvider {
            id: "alpha".into(),
            tools: vec![RemoteToolSpec {
                name: "search".into(),
                description: "flaky".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            fail_calls: true,
        });
        let facade = RemoteToolFacade::new(vec![provider]);
        facade.discover().await;

        let call = ToolCall::new("search", serde_json::json!({}));
        let envelope = facade.execute(&call, Duration::from_secs(1)).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.error_kind, Some(ToolErrorKind::ProviderError));
        assert!(envelope.content.contains("connection reset"));
    }
}
