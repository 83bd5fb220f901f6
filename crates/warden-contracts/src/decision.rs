//! Enforcement decision types.
//!
//! Every check produces a binary `Decision`. There is no "warn but allow"
//! mode: anything other than `Allow` means the originating operation must
//! fail without being attempted.

use serde::{Deserialize, Serialize};

/// The outcome of one enforcement check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// The operation may proceed.
    Allow,

    /// The operation must not be attempted.
    Deny {
        reason: DenyReason,
        /// Human-readable explanation, written to the audit log.
        detail: String,
    },
}

impl Decision {
    pub fn deny(reason: DenyReason, detail: impl Into<String>) -> Self {
        Decision::Deny {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// The machine-readable reason string recorded in audit events.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Decision::Allow => "granted",
            Decision::Deny { reason, .. } => reason.as_str(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Decision::Allow => Severity::Info,
            Decision::Deny { reason, .. } => reason.severity(),
        }
    }
}

/// Why a check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    /// The target is a lock file, manifest, or secure directory. Grants are
    /// never consulted for these.
    ProtectedResource,
    /// No grant of the requested type matches the resource.
    PermissionDenied,
    /// The operation type is outside the recognized set.
    UnknownOperation,
    /// The resource expression has no unambiguous canonical form.
    UnresolvableResource,
    /// A plugin frame is active but no lock is loaded for it.
    LockUnavailable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::ProtectedResource => "protected-resource",
            DenyReason::PermissionDenied => "permission-denied",
            DenyReason::UnknownOperation => "unknown-operation",
            DenyReason::UnresolvableResource => "unresolvable-resource",
            DenyReason::LockUnavailable => "lock-unavailable",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DenyReason::ProtectedResource | DenyReason::LockUnavailable => Severity::Critical,
            DenyReason::PermissionDenied
            | DenyReason::UnknownOperation
            | DenyReason::UnresolvableResource => Severity::Warning,
        }
    }
}

/// Audit severity. Protected-resource attempts are always `Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}
