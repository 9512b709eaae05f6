//! Tool resolver — the single dispatch point for all tool calls.
//!
//! Probes the local registry first, then the remote facade; exactly one
//! provider is invoked per call. The resolver is stateless beyond the two
//! catalogs it holds.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use ironhive_core::error::ToolErrorKind;
use ironhive_core::tool::{ProviderKind, ToolCall, ToolDescriptor, ToolRegistry, ToolResultEnvelope};

use crate::remote::RemoteToolFacade;

pub struct ToolResolver {
    local: Arc<ToolRegistry>,
    remote: Option<Arc<RemoteToolFacade>>,
}

impl ToolResolver {
    pub fn new(local: Arc<ToolRegistry>) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    /// Attach a remote facade probed after the local registry.
    pub fn with_remote(mut self, remote: Arc<RemoteToolFacade>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// The merged catalog, local tools first.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut descriptors = self.local.list();
        if let Some(remote) = &self.remote {
            descriptors.extend(remote.list());
        }
        descriptors
    }

    /// Dispatch one call to whichever provider knows the name.
    pub async fn dispatch(&self, call: &ToolCall, timeout: Duration) -> ToolResultEnvelope {
        if self.local.contains(&call.name) {
            debug!(tool = %call.name, "Dispatching to local registry");
            return self.local.execute(call, timeout).await;
        }

        if let Some(remote) = &self.remote {
            if remote.contains(&call.name) {
                debug!(tool = %call.name, "Dispatching to remote facade");
                return remote.execute(call, timeout).await;
            }
        }

        ToolResultEnvelope::failure(
            &call.id,
            ProviderKind::Local,
            ToolErrorKind::UnknownTool,
            format!("No provider knows tool: {}", call.name),
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{RemoteCallOutcome, RemoteToolProvider, RemoteToolSpec};
    use async_trait::async_trait;
    use ironhive_core::error::ToolError;

    struct OneToolProvider;

    #[async_trait]
    impl RemoteToolProvider for OneToolProvider {
        fn id(&self) -> &str {
            "remote"
        }

        async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, ToolError> {
            Ok(vec![RemoteToolSpec {
                name: "remote_only".into(),
                description: "only remotely available".into(),
                parameters: serde_json::json!({"type": "object"}),
            }])
        }

        async fn call_tool(
            &self,
            _name: &str,
            _arguments: &serde_json::Value,
        ) -> Result<RemoteCallOutcome, ToolError> {
            Ok(RemoteCallOutcome {
                ok: true,
                content: "remote result".into(),
            })
        }
    }

    async fn resolver() -> ToolResolver {
        let registry = Arc::new(ToolRegistry::new());
        registry.register_fn(
            "local_echo",
            "Echo locally",
            serde_json::json!({"type": "object"}),
            |args| Ok(args.to_string()),
        );

        let facade = Arc::new(RemoteToolFacade::new(vec![Arc::new(OneToolProvider)]));
        facade.discover().await;

        ToolResolver::new(registry).with_remote(facade)
    }

    #[tokio::test]
    async fn local_tool_wins() {
        let resolver = resolver().await;
        let call = ToolCall::new("local_echo", serde_json::json!({}));
        let envelope = resolver.dispatch(&call, Duration::from_secs(1)).await;
        assert!(envelope.ok);
        assert_eq!(envelope.provider, ProviderKind::Local);
    }

    #[tokio::test]
    async fn falls_back_to_remote() {
        let resolver = resolver().await;
        let call = ToolCall::new("remote_only", serde_json::json!({}));
        let envelope = resolver.dispatch(&call, Duration::from_secs(1)).await;
        assert!(envelope.ok);
        assert_eq!(envelope.provider, ProviderKind::Remote);
        assert_eq!(envelope.content, "remote result");
    }

    #[tokio::test]
    async fn unknown_everywhere() {
        let resolver = resolver().await;
        let call = ToolCall::new("nowhere", serde_json::json!({}));
        let envelope = resolver.dispatch(&call, Duration::from_secs(1)).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.error_kind, Some(ToolErrorKind::UnknownTool));
    }

    #[tokio::test]
    async fn merged_catalog_lists_both_families() {
        let resolver = resolver().await;
        let descriptors = resolver.list_tools();
        let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"local_echo"));
        assert!(names.contains(&"remote_only"));
    }
}
