//! The enforcement mediator: the single choke point every sensitive
//! operation passes through.
//!
//! Each check runs the same fixed pipeline:
//!
//!   Parse op → Acting plugin → Lock lookup → Normalize → Protected → Match → Audit
//!
//! Host code (no plugin frame) is allowed without consulting any grant, but
//! is still audited. Every call records exactly one audit event, whatever
//! the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, warn};

use warden_contracts::{
    audit::AuditEvent,
    decision::{Decision, DenyReason},
    error::{WardenError, WardenResult},
    grant::OperationType,
};

use crate::context::ExecutionContext;
use crate::normalize::{normalize, CanonicalResource};
use crate::traits::{AuditRecorder, GrantRegistry, ResourceMatcher};

/// Wires the registry, matcher, and audit recorder together in trust order.
///
/// One mediator is shared by every plugin on a host. It holds no per-plugin
/// state of its own; attribution comes from [`ExecutionContext`].
pub struct Mediator {
    registry: Arc<dyn GrantRegistry>,
    matcher: Box<dyn ResourceMatcher>,
    audit: Arc<dyn AuditRecorder>,
    host_root: PathBuf,
}

impl Mediator {
    pub fn new(
        registry: Arc<dyn GrantRegistry>,
        matcher: Box<dyn ResourceMatcher>,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            registry,
            matcher,
            audit,
            host_root: PathBuf::from("/"),
        }
    }

    /// Directory that relative file paths from host code resolve against.
    pub fn with_host_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.host_root = root.into();
        self
    }

    /// Check an operation named by its wire string.
    ///
    /// Unrecognized names are denied for everyone, host code included.
    pub fn check(&self, op_type: &str, raw: &str) -> Decision {
        match OperationType::parse(op_type) {
            Some(op) => self.evaluate(op, raw).0,
            None => {
                let plugin = ExecutionContext::current();
                warn!(
                    plugin = plugin.as_deref().unwrap_or("<host>"),
                    operation = %op_type,
                    "unknown operation type denied"
                );
                let decision = Decision::deny(
                    DenyReason::UnknownOperation,
                    format!("'{}' is not a recognized operation type", op_type),
                );
                self.record(plugin.as_deref(), op_type, raw, &decision);
                decision
            }
        }
    }

    pub fn check_op(&self, op: OperationType, raw: &str) -> Decision {
        self.evaluate(op, raw).0
    }

    /// Check `op` and return the canonical resource the caller must act on.
    ///
    /// Mediated APIs perform their operation on the returned path, never on
    /// the raw expression, so what was checked is what gets touched.
    pub fn authorize(&self, op: OperationType, raw: &str) -> WardenResult<CanonicalResource> {
        let (decision, resource) = self.evaluate(op, raw);
        match decision {
            Decision::Allow => Ok(resource.unwrap_or_else(|| CanonicalResource::verbatim(op, raw))),
            Decision::Deny { reason, detail } => {
                let plugin = ExecutionContext::current()
                    .map(|p| p.to_string())
                    .unwrap_or_default();
                let shown = resource
                    .as_ref()
                    .map(|r| r.key().to_string())
                    .unwrap_or_else(|| raw.to_string());
                Err(match reason {
                    DenyReason::ProtectedResource => WardenError::ProtectedResourceViolation {
                        plugin,
                        resource: shown,
                    },
                    DenyReason::UnknownOperation | DenyReason::UnresolvableResource => {
                        WardenError::UnknownOperation {
                            operation: op.to_string(),
                            reason: detail,
                        }
                    }
                    DenyReason::PermissionDenied | DenyReason::LockUnavailable => {
                        WardenError::PermissionDenied {
                            plugin,
                            operation: op.to_string(),
                            resource: shown,
                        }
                    }
                })
            }
        }
    }

    fn evaluate(&self, op: OperationType, raw: &str) -> (Decision, Option<CanonicalResource>) {
        // ── Step 1: Who is acting? ───────────────────────────────────────────
        let Some(plugin) = ExecutionContext::current() else {
            let resource = normalize(op, raw, &self.host_root)
                .unwrap_or_else(|_| CanonicalResource::verbatim(op, raw));
            debug!(operation = %op, resource = %resource.key(), "host operation allowed");
            self.record(None, op.as_str(), resource.key(), &Decision::Allow);
            return (Decision::Allow, Some(resource));
        };

        // ── Step 2: The acting plugin's frozen grants ───────────────────────
        let Some(grants) = self.registry.lookup(&plugin) else {
            error!(plugin = %plugin, operation = %op, "no permission lock loaded for acting plugin");
            let decision = Decision::deny(
                DenyReason::LockUnavailable,
                format!("no permission lock is loaded for plugin '{}'", plugin),
            );
            self.record(Some(plugin.as_ref()), op.as_str(), raw, &decision);
            return (decision, None);
        };

        // ── Step 3: Canonical form ───────────────────────────────────────────
        let resource = match normalize(op, raw, &grants.root) {
            Ok(resource) => resource,
            Err(reason) => {
                warn!(
                    plugin = %plugin,
                    operation = %op,
                    resource = %raw,
                    reason = %reason,
                    "resource could not be normalized"
                );
                let decision = Decision::deny(DenyReason::UnresolvableResource, reason.0);
                self.record(Some(plugin.as_ref()), op.as_str(), raw, &decision);
                return (decision, None);
            }
        };

        // ── Step 4: Protected resources, before any grant is consulted ──────
        let decision = if self.registry.is_protected_resource(&plugin, op, &resource) {
            error!(
                plugin = %plugin,
                operation = %op,
                resource = %resource.key(),
                "protected resource access blocked"
            );
            Decision::deny(
                DenyReason::ProtectedResource,
                format!("'{}' is a protected resource", resource.key()),
            )
        } else {
            // ── Step 5: Grant matching ───────────────────────────────────────
            let decision = self.matcher.decide(grants.lock.grants(), op, &resource);
            if decision.is_allowed() {
                debug!(plugin = %plugin, operation = %op, resource = %resource.key(), "operation allowed");
            } else {
                warn!(plugin = %plugin, operation = %op, resource = %resource.key(), "operation denied");
            }
            decision
        };

        // ── Step 6: Audit, exactly once ─────────────────────────────────────
        self.record(Some(plugin.as_ref()), op.as_str(), resource.key(), &decision);
        (decision, Some(resource))
    }

    fn record(&self, plugin: Option<&str>, op: &str, resource: &str, decision: &Decision) {
        let event = AuditEvent::from_decision(
            ExecutionContext::work_id(),
            plugin,
            op,
            resource,
            decision,
        );
        self.audit.record(event);
    }

    pub fn host_root(&self) -> &Path {
        &self.host_root
    }
}
