//! Tool dispatch for the ironhive runtime.
//!
//! The remote facade presents connected tool providers as one namespace,
//! and the resolver fuses it with the in-process registry behind a single
//! dispatch call used by the reasoning loop. A couple of built-in local
//! tools are included for wiring and tests.

pub mod builtin;
pub mod remote;
pub mod resolver;

use std::sync::Arc;

use ironhive_core::tool::ToolRegistry;

pub use builtin::{CalculatorTool, EchoTool};
pub use remote::{RemoteCallOutcome, RemoteToolFacade, RemoteToolProvider, RemoteToolSpec};
pub use resolver::ToolResolver;

/// Create a registry with all built-in tools registered.
pub fn default_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(CalculatorTool));
    registry.register(Arc::new(EchoTool));
    registry
}
