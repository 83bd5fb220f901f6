//! The fixed plugin capability interface and chain dispatch.
//!
//! Plugins are compiled into the host and registered by name. A request
//! runs through an ordered chain of plugins; each one receives a [`Next`]
//! continuation and decides whether to call the rest of the chain.
//!
//! ```text
//! run_chain([router, provider])
//!   invoke("router")    router.handle(ctx, next) ──▶ next.run(ctx)
//!                                                      invoke("provider")
//!                                                        provider.handle(ctx, end)
//! ```
//!
//! Every handler runs inside its own execution-context frame, so whatever
//! it does through the [`Sandbox`] is attributed to it, and nested calls
//! revert to the caller when they return.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use warden_contracts::error::{WardenError, WardenResult};
use warden_core::ExecutionContext;

use crate::sandbox::Sandbox;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A third-party extension.
///
/// Implementations must perform every sensitive operation through the
/// [`Sandbox`] they are handed. Code that reaches for `std::fs` or
/// `std::env` directly is outside the mediation boundary.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Called once after the plugin's permission lock is active.
    async fn initialize(&self, _sandbox: &Sandbox) -> WardenResult<()> {
        Ok(())
    }

    /// Handle one request. The default just forwards to the rest of the chain.
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        _sandbox: &Sandbox,
        next: Next<'_>,
    ) -> WardenResult<()> {
        next.run(ctx).await;
        Ok(())
    }

    /// Called once when the host shuts down.
    async fn shutdown(&self) -> WardenResult<()> {
        Ok(())
    }
}

/// A handler failure, recorded on the request instead of aborting the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFailure {
    pub plugin: String,
    pub error: String,
}

/// Mutable state threaded through one chain run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub route: String,
    pub request: serde_json::Value,
    pub response: serde_json::Map<String, serde_json::Value>,
    pub errors: Vec<PluginFailure>,
    pub trace: Vec<String>,
    /// Set when a plugin fails or stops the chain; later plugins are skipped.
    pub short_circuited: bool,
}

impl RequestContext {
    pub fn new(route: impl Into<String>, request: serde_json::Value) -> Self {
        Self {
            route: route.into(),
            request,
            ..Self::default()
        }
    }

    pub fn add_trace(&mut self, entry: impl Into<String>) {
        self.trace.push(entry.into());
    }

    pub fn short_circuit(&mut self) {
        self.short_circuited = true;
    }
}

#[derive(Clone)]
pub(crate) struct ChainLink {
    pub(crate) name: Arc<str>,
    pub(crate) plugin: Arc<dyn Plugin>,
}

/// The remainder of the chain after the current plugin.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [ChainLink],
    sandbox: &'a Sandbox,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [ChainLink], sandbox: &'a Sandbox) -> Self {
        Self { chain, sandbox }
    }

    /// True when no plugin follows.
    pub fn is_end(&self) -> bool {
        self.chain.is_empty()
    }

    /// Run the rest of the chain. Failures are recorded on `ctx`.
    pub async fn run(self, ctx: &mut RequestContext) {
        run_chain(self.chain, self.sandbox, ctx).await
    }
}

pub(crate) fn run_chain<'a>(
    chain: &'a [ChainLink],
    sandbox: &'a Sandbox,
    ctx: &'a mut RequestContext,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        if ctx.short_circuited {
            return;
        }
        let Some((link, rest)) = chain.split_first() else {
            ctx.add_trace("reached end of chain");
            return;
        };

        ctx.add_trace(format!("executing '{}'", link.name));
        debug!(plugin = %link.name, remaining = rest.len(), "executing plugin");

        let next = Next::new(rest, sandbox);
        let outcome = ExecutionContext::invoke(&link.name, link.plugin.handle(ctx, sandbox, next))
            .await
            .and_then(|result| result);

        match outcome {
            Ok(()) => ctx.add_trace(format!("'{}' finished", link.name)),
            Err(e) => {
                error!(plugin = %link.name, error = %e, "plugin execution failed");
                ctx.add_trace(format!("'{}' FAILED: {}", link.name, e));
                ctx.errors.push(PluginFailure {
                    plugin: link.name.to_string(),
                    error: e.to_string(),
                });
                ctx.short_circuit();
            }
        }
    })
}

/// Turn a plugin's own error into the failure recorded for it.
pub(crate) fn failed(plugin: &str, e: WardenError) -> WardenError {
    match e {
        WardenError::PluginFailed { .. } => e,
        other => WardenError::PluginFailed {
            plugin: plugin.to_string(),
            reason: other.to_string(),
        },
    }
}
