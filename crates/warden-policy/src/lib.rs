//! # warden-policy
//!
//! The deny-by-default resource matcher for Warden.
//!
//! ## Overview
//!
//! This crate provides [`PatternMatcher`], which implements the
//! [`ResourceMatcher`](warden_core::traits::ResourceMatcher) trait. A grant
//! only ever applies to its own operation type, and an operation is allowed
//! only when some grant's pattern matches the canonical resource.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use warden_policy::PatternMatcher;
//!
//! let mediator = Mediator::new(registry, Box::new(PatternMatcher::new()), audit);
//! ```
//!
//! ## Pattern shapes
//!
//! `*`, exact literals, `dir/*` (strictly below `dir`), and `*.ext` (final
//! segment suffix). See [`pattern`] for the full table.

pub mod matcher;
pub mod pattern;

pub use matcher::PatternMatcher;
pub use pattern::GrantPattern;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::Path;

    use warden_contracts::{
        decision::Decision,
        grant::{OperationType, PermissionGrant, ResourceClass},
    };
    use warden_core::{normalize, CanonicalResource, ResourceMatcher};

    use crate::{GrantPattern, PatternMatcher};

    // ── Helpers ───────────────────────────────────────────────────────────────

    const ROOT: &str = "/warden-test-plugin-root";

    fn resource(op: OperationType, raw: &str) -> CanonicalResource {
        normalize(op, raw, Path::new(ROOT)).unwrap()
    }

    fn decide(grants: &[(OperationType, &str)], op: OperationType, raw: &str) -> Decision {
        let grants: Vec<PermissionGrant> = grants
            .iter()
            .map(|(op, pattern)| PermissionGrant::new(*op, *pattern, ""))
            .collect();
        PatternMatcher::new().decide(&grants, op, &resource(op, raw))
    }

    fn allowed(grants: &[(OperationType, &str)], op: OperationType, raw: &str) -> bool {
        decide(grants, op, raw).is_allowed()
    }

    // ── 1. deny-by-default ────────────────────────────────────────────────────

    #[test]
    fn test_empty_grant_set_denies_everything() {
        for op in OperationType::ALL {
            let raw = match op.resource_class() {
                ResourceClass::Route => "/x",
                _ => "x",
            };
            let d = decide(&[], op, raw);
            assert_eq!(d.reason_code(), "permission-denied", "{op} should be denied");
        }
    }

    // ── 2. type isolation ─────────────────────────────────────────────────────

    #[test]
    fn test_grants_never_cross_operation_types() {
        let grants = [(OperationType::FileRead, "*")];
        assert!(allowed(&grants, OperationType::FileRead, "anything.txt"));
        assert!(!allowed(&grants, OperationType::FileWrite, "anything.txt"));

        let grants = [(OperationType::NetworkHttps, "*")];
        assert!(!allowed(&grants, OperationType::NetworkHttp, "example.com"));
        assert!(!allowed(&grants, OperationType::NetworkDomain, "example.com"));
    }

    // ── 3. pattern shapes ─────────────────────────────────────────────────────

    #[test]
    fn test_exact_pattern() {
        let grants = [(OperationType::FileRead, "config.yml")];
        assert!(allowed(&grants, OperationType::FileRead, "config.yml"));
        assert!(allowed(&grants, OperationType::FileRead, "./config.yml"));
        assert!(!allowed(&grants, OperationType::FileRead, "other.yml"));
        assert!(!allowed(&grants, OperationType::FileRead, "sub/config.yml"));
    }

    #[test]
    fn test_directory_pattern_matches_strictly_inside() {
        let grants = [(OperationType::FileWrite, "data/*")];
        assert!(allowed(&grants, OperationType::FileWrite, "data/a.json"));
        assert!(allowed(&grants, OperationType::FileWrite, "data/nested/deep/b.json"));
        assert!(!allowed(&grants, OperationType::FileWrite, "data"));
        assert!(!allowed(&grants, OperationType::FileWrite, "database/a.json"));
        assert!(!allowed(&grants, OperationType::FileWrite, "other/a.json"));
    }

    #[test]
    fn test_extension_pattern_uses_final_segment() {
        let grants = [(OperationType::FileRead, "*.json")];
        assert!(allowed(&grants, OperationType::FileRead, "a.json"));
        assert!(allowed(&grants, OperationType::FileRead, "deep/dir/b.json"));
        assert!(!allowed(&grants, OperationType::FileRead, "a.json.bak"));
        assert!(!allowed(&grants, OperationType::FileRead, "json"));
    }

    #[test]
    fn test_dotdot_pattern_never_matches() {
        let grants = [(OperationType::FileRead, "../other/*")];
        assert!(!allowed(&grants, OperationType::FileRead, "other/x"));
        assert_eq!(
            GrantPattern::parse(OperationType::FileRead, "data/../../etc/*"),
            GrantPattern::Never
        );
    }

    #[test]
    fn test_patterns_are_lexically_normalized() {
        assert_eq!(
            GrantPattern::parse(OperationType::FileRead, "./data//*"),
            GrantPattern::Below("data".to_string())
        );
        assert_eq!(
            GrantPattern::parse(OperationType::FileRead, "data/*/x"),
            GrantPattern::Exact("data/*/x".to_string())
        );
    }

    #[test]
    fn test_absolute_directory_pattern() {
        let grants = [(OperationType::FileRead, "/var/lib/shared/*")];
        assert!(allowed(&grants, OperationType::FileRead, "/var/lib/shared/models/a.bin"));
        assert!(!allowed(&grants, OperationType::FileRead, "/var/lib/private/a.bin"));
    }

    // ── 4. network ────────────────────────────────────────────────────────────

    #[test]
    fn test_network_host_match_ignores_path_and_case() {
        let grants = [(OperationType::NetworkHttps, "api.openai.com")];
        assert!(allowed(&grants, OperationType::NetworkHttps, "https://api.openai.com/v1/chat"));
        assert!(allowed(&grants, OperationType::NetworkHttps, "https://API.OPENAI.COM"));
        assert!(!allowed(&grants, OperationType::NetworkHttps, "https://api.anthropic.com"));
    }

    #[test]
    fn test_network_subdomain_wildcard() {
        let grants = [(OperationType::NetworkDomain, "*.example.com")];
        assert!(allowed(&grants, OperationType::NetworkDomain, "api.example.com"));
        assert!(allowed(&grants, OperationType::NetworkDomain, "api.example.com:8443"));
        assert!(!allowed(&grants, OperationType::NetworkDomain, "example.com"));
        assert!(!allowed(&grants, OperationType::NetworkDomain, "evilexample.com"));
    }

    #[test]
    fn test_network_pattern_given_as_url() {
        let grants = [(OperationType::NetworkHttps, "https://API.anthropic.com/")];
        assert!(allowed(&grants, OperationType::NetworkHttps, "api.anthropic.com"));
    }

    #[test]
    fn test_network_pattern_with_default_port_matches() {
        let grants = [(OperationType::NetworkHttps, "https://api.example.com:443")];
        assert!(allowed(&grants, OperationType::NetworkHttps, "https://api.example.com/v1"));
        assert!(allowed(&grants, OperationType::NetworkHttps, "api.example.com:443"));
        assert!(!allowed(&grants, OperationType::NetworkHttps, "https://api.example.com:8443"));

        let grants = [(OperationType::NetworkHttp, "internal.local:80")];
        assert!(allowed(&grants, OperationType::NetworkHttp, "http://internal.local/health"));
    }

    #[test]
    fn test_network_pattern_with_other_port_stays_distinct() {
        let grants = [(OperationType::NetworkHttps, "api.example.com:8443")];
        assert!(allowed(&grants, OperationType::NetworkHttps, "https://api.example.com:8443/v1"));
        assert!(!allowed(&grants, OperationType::NetworkHttps, "https://api.example.com"));
    }

    // ── 5. other classes ──────────────────────────────────────────────────────

    #[test]
    fn test_route_prefix_pattern() {
        let grants = [(OperationType::RouteRegistration, "/api/v1/plugins/router/*")];
        assert!(allowed(&grants, OperationType::RouteRegistration, "/api/v1/plugins/router/chat"));
        assert!(!allowed(&grants, OperationType::RouteRegistration, "/api/v1/admin"));
    }

    #[test]
    fn test_subprocess_and_environment_exact() {
        let grants = [
            (OperationType::Subprocess, "git"),
            (OperationType::Environment, "OPENAI_API_KEY"),
        ];
        assert!(allowed(&grants, OperationType::Subprocess, "git status"));
        assert!(!allowed(&grants, OperationType::Subprocess, "rm -rf /"));
        assert!(allowed(&grants, OperationType::Environment, "OPENAI_API_KEY"));
        assert!(!allowed(&grants, OperationType::Environment, "AWS_SECRET_ACCESS_KEY"));
    }

    // ── 6. determinism ────────────────────────────────────────────────────────

    #[test]
    fn test_same_inputs_same_decision() {
        let grants = [(OperationType::FileRead, "data/*")];
        let first = decide(&grants, OperationType::FileRead, "data/x");
        for _ in 0..10 {
            assert_eq!(decide(&grants, OperationType::FileRead, "data/x"), first);
        }
    }
}
