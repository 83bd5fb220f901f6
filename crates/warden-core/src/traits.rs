//! Core trait definitions for the Warden enforcement pipeline.
//!
//! These three traits define the trust boundary around the mediator:
//!
//! - `GrantRegistry`: trusted source of locked grants and plugin roots
//! - `ResourceMatcher`: trusted, pure decision function
//! - `AuditRecorder`: trusted, infallible sink for every decision
//!
//! The mediator wires them together in a fixed order. Plugin code never
//! holds any of them directly.

use std::path::Path;
use std::sync::Arc;

use warden_contracts::{
    audit::AuditEvent,
    decision::Decision,
    grant::{OperationType, PermissionGrant},
    lock::PermissionLock,
};

use crate::normalize::CanonicalResource;

/// What the registry knows about one loaded plugin.
///
/// Both fields are `Arc`s so a lookup on the hot path is two refcount bumps.
#[derive(Debug, Clone)]
pub struct PluginGrants {
    /// Canonical plugin directory; relative file resources resolve here.
    pub root: Arc<Path>,
    /// The frozen grant snapshot.
    pub lock: Arc<PermissionLock>,
}

/// Read-only view over loaded permission locks.
///
/// Implementations must not perform I/O in `lookup` or
/// `is_protected_resource`: both run on every check.
pub trait GrantRegistry: Send + Sync {
    /// Return the cached lock and root for `plugin`, or `None` if the plugin
    /// has not been loaded.
    fn lookup(&self, plugin: &str) -> Option<PluginGrants>;

    /// Hard-coded carve-out evaluated before any grant is consulted.
    ///
    /// Returning `true` denies the operation with `protected-resource` no
    /// matter how broad the plugin's grants are.
    fn is_protected_resource(
        &self,
        plugin: &str,
        op: OperationType,
        resource: &CanonicalResource,
    ) -> bool;
}

/// The pure allow/deny function over a grant set.
///
/// Implementations must be deterministic and side-effect free. Absence of a
/// matching grant denies; there are no explicit deny rules.
pub trait ResourceMatcher: Send + Sync {
    fn decide(
        &self,
        grants: &[PermissionGrant],
        op: OperationType,
        resource: &CanonicalResource,
    ) -> Decision;
}

/// Append-only sink for audit events.
///
/// `record` returns nothing: a failing backing store must never break
/// enforcement. Implementations buffer or drop (and flag the loss) instead.
pub trait AuditRecorder: Send + Sync {
    fn record(&self, event: AuditEvent);
}

impl<T: AuditRecorder + ?Sized> AuditRecorder for Arc<T> {
    fn record(&self, event: AuditEvent) {
        (**self).record(event)
    }
}
