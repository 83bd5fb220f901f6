//! Audit event and unit-of-work identity types.
//!
//! The mediator emits exactly one `AuditEvent` per check, allowed or not.
//! Events reference plugins by name only; they own nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::{Decision, Severity};

/// Unique identifier for one logical unit of work (one request or task).
///
/// Every execution-context scope gets a fresh id, which appears on every
/// audit event recorded inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkId(pub uuid::Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary outcome as written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Allow,
    Deny,
}

/// One enforcement decision, as consumed by operators and log tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    /// The unit of work the check ran in, if any.
    pub work_id: Option<WorkId>,
    /// The acting plugin. `None` means trusted host code.
    pub plugin_name: Option<String>,
    /// The operation type exactly as requested (may be unrecognized).
    pub operation_type: String,
    /// The canonical resource when normalization succeeded, else the raw
    /// expression.
    pub resource: String,
    pub decision: Outcome,
    /// Reason code (`granted`, `protected-resource`, ...) plus detail.
    pub reason: String,
    pub severity: Severity,
}

impl AuditEvent {
    /// Build an event from a decision, stamping the current time.
    pub fn from_decision(
        work_id: Option<WorkId>,
        plugin_name: Option<&str>,
        operation_type: &str,
        resource: &str,
        decision: &Decision,
    ) -> Self {
        let (outcome, reason) = match decision {
            Decision::Allow => (Outcome::Allow, decision.reason_code().to_string()),
            Decision::Deny { reason, detail } => {
                (Outcome::Deny, format!("{}: {}", reason.as_str(), detail))
            }
        };
        Self {
            timestamp: Utc::now(),
            work_id,
            plugin_name: plugin_name.map(str::to_string),
            operation_type: operation_type.to_string(),
            resource: resource.to_string(),
            decision: outcome,
            reason,
            severity: decision.severity(),
        }
    }

    pub fn is_denial(&self) -> bool {
        self.decision == Outcome::Deny
    }
}
