//! # warden-contracts
//!
//! Shared types, schemas, and the error taxonomy for the Warden plugin
//! permission engine.
//!
//! All crates in the workspace import from here. No enforcement logic lives
//! in this crate, only data definitions.

pub mod audit;
pub mod decision;
pub mod error;
pub mod grant;
pub mod lock;
pub mod manifest;

#[cfg(test)]
mod tests {
    use super::*;
    use audit::{AuditEvent, Outcome, WorkId};
    use decision::{Decision, DenyReason, Severity};
    use error::WardenError;
    use grant::{OperationType, PermissionGrant, ResourceClass};
    use lock::{LockState, PermissionLock};
    use manifest::{PermissionRequest, PluginManifest};

    fn manifest(permissions: Vec<PermissionRequest>) -> PluginManifest {
        PluginManifest {
            name: "model-router".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            permissions,
        }
    }

    fn request(op: OperationType, resource: &str) -> PermissionRequest {
        PermissionRequest {
            op,
            resource: resource.to_string(),
            description: String::new(),
        }
    }

    // ── OperationType ────────────────────────────────────────────────────────

    #[test]
    fn operation_type_parse_accepts_every_wire_name() {
        for op in OperationType::ALL {
            assert_eq!(OperationType::parse(op.as_str()), Some(op));
        }
    }

    #[test]
    fn operation_type_parse_is_exact() {
        assert_eq!(OperationType::parse("FILE-READ"), None);
        assert_eq!(OperationType::parse("file.read"), None);
        assert_eq!(OperationType::parse("file"), None);
        assert_eq!(OperationType::parse(""), None);
    }

    #[test]
    fn operation_type_from_str_reports_unknown_operation() {
        let err = "socket-raw".parse::<OperationType>().unwrap_err();
        match err {
            WardenError::UnknownOperation { operation, .. } => assert_eq!(operation, "socket-raw"),
            other => panic!("expected UnknownOperation, got {:?}", other),
        }
    }

    #[test]
    fn operation_type_serializes_kebab_case() {
        let json = serde_json::to_string(&OperationType::RouteRegistration).unwrap();
        assert_eq!(json, "\"route-registration\"");
    }

    #[test]
    fn resource_classes_group_related_types() {
        assert_eq!(OperationType::FileRead.resource_class(), ResourceClass::File);
        assert_eq!(OperationType::FileWrite.resource_class(), ResourceClass::File);
        assert_eq!(OperationType::NetworkDomain.resource_class(), ResourceClass::Network);
        assert_eq!(OperationType::RouteRegistration.resource_class(), ResourceClass::Route);
    }

    // ── PermissionLock ───────────────────────────────────────────────────────

    #[test]
    fn lock_from_manifest_copies_requests_in_order() {
        let m = manifest(vec![
            request(OperationType::FileRead, "config.yml"),
            request(OperationType::NetworkHttps, "api.openai.com"),
        ]);
        let lock = PermissionLock::from_manifest(&m);

        assert_eq!(lock.plugin_name(), "model-router");
        assert_eq!(
            lock.grants(),
            &[
                PermissionGrant::new(OperationType::FileRead, "config.yml", ""),
                PermissionGrant::new(OperationType::NetworkHttps, "api.openai.com", ""),
            ]
        );
    }

    #[test]
    fn lock_from_manifest_collapses_duplicates() {
        let m = manifest(vec![
            request(OperationType::FileRead, "data/*"),
            request(OperationType::FileRead, "data/*"),
        ]);
        assert_eq!(PermissionLock::from_manifest(&m).grants().len(), 1);
    }

    #[test]
    fn lock_file_format_uses_camel_case_fields() {
        let m = manifest(vec![request(OperationType::FileRead, "config.yml")]);
        let json = serde_json::to_value(PermissionLock::from_manifest(&m)).unwrap();

        assert_eq!(json["pluginName"], "model-router");
        assert_eq!(json["grants"][0]["type"], "file-read");
        assert_eq!(json["grants"][0]["resourcePattern"], "config.yml");
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn lock_with_unknown_grant_type_fails_to_parse() {
        let raw = r#"{
            "pluginName": "x",
            "grants": [{ "type": "root-shell", "resourcePattern": "*" }],
            "createdAt": "2026-01-01T00:00:00Z"
        }"#;
        assert!(serde_json::from_str::<PermissionLock>(raw).is_err());
    }

    // ── LockState ────────────────────────────────────────────────────────────

    #[test]
    fn lock_state_only_moves_forward() {
        assert!(LockState::Absent.permits(LockState::Created));
        assert!(LockState::Created.permits(LockState::Active));
        assert!(LockState::Absent.permits(LockState::Active));

        assert!(!LockState::Active.permits(LockState::Created));
        assert!(!LockState::Active.permits(LockState::Absent));
        assert!(!LockState::Created.permits(LockState::Absent));
        assert!(!LockState::Active.permits(LockState::Active));
    }

    // ── Decision / AuditEvent ────────────────────────────────────────────────

    #[test]
    fn protected_resource_denials_are_critical() {
        let d = Decision::deny(DenyReason::ProtectedResource, "lock file");
        assert!(!d.is_allowed());
        assert_eq!(d.reason_code(), "protected-resource");
        assert_eq!(d.severity(), Severity::Critical);
    }

    #[test]
    fn audit_event_from_allow() {
        let event = AuditEvent::from_decision(
            Some(WorkId::new()),
            Some("model-router"),
            "file-read",
            "config.yml",
            &Decision::Allow,
        );
        assert_eq!(event.decision, Outcome::Allow);
        assert_eq!(event.reason, "granted");
        assert_eq!(event.severity, Severity::Info);
        assert!(!event.is_denial());
    }

    #[test]
    fn audit_event_from_deny_carries_reason_and_detail() {
        let event = AuditEvent::from_decision(
            None,
            Some("model-router"),
            "file-write",
            "permissions.lock.json",
            &Decision::deny(DenyReason::ProtectedResource, "lock files are immutable"),
        );
        assert!(event.is_denial());
        assert!(event.reason.starts_with("protected-resource"));
        assert!(event.reason.contains("lock files are immutable"));
    }

    #[test]
    fn work_id_new_produces_unique_values() {
        let unique: std::collections::HashSet<String> =
            (0..100).map(|_| WorkId::new().0.to_string()).collect();
        assert_eq!(unique.len(), 100);
    }

    // ── WardenError display messages ─────────────────────────────────────────

    #[test]
    fn error_permission_denied_display() {
        let err = WardenError::PermissionDenied {
            plugin: "claude-provider".to_string(),
            operation: "file-read".to_string(),
            resource: "other.yml".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("claude-provider"));
        assert!(msg.contains("file-read"));
        assert!(msg.contains("other.yml"));
    }

    #[test]
    fn error_lock_corrupt_display() {
        let err = WardenError::LockCorrupt {
            plugin: "router".to_string(),
            reason: "plugin name mismatch".to_string(),
        };
        assert!(err.to_string().contains("corrupt"));
        assert!(err.to_string().contains("plugin name mismatch"));
    }

    #[test]
    fn error_illegal_transition_display() {
        let err = WardenError::IllegalLockTransition {
            plugin: "router".to_string(),
            from: LockState::Active,
            to: LockState::Created,
        };
        assert!(err.to_string().contains("active -> created"));
    }
}
