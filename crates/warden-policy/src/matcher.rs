//! Grant-set matcher.
//!
//! `PatternMatcher` implements the `ResourceMatcher` trait from warden-core.
//!
//! Evaluation algorithm:
//!
//! 1. Keep only grants whose type equals the requested operation type.
//! 2. Parse each kept grant's pattern for the operation's resource class.
//! 3. The first pattern that matches the canonical resource → `Allow`.
//! 4. If none matched → `Deny` with `permission-denied` (deny-by-default).

use tracing::{debug, trace};

use warden_contracts::{
    decision::{Decision, DenyReason},
    grant::{OperationType, PermissionGrant},
};
use warden_core::{CanonicalResource, ResourceMatcher};

use crate::pattern::GrantPattern;

/// The stateless, deny-by-default matcher used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternMatcher;

impl PatternMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceMatcher for PatternMatcher {
    fn decide(
        &self,
        grants: &[PermissionGrant],
        op: OperationType,
        resource: &CanonicalResource,
    ) -> Decision {
        let mut considered = 0usize;

        for grant in grants.iter().filter(|g| g.op == op) {
            considered += 1;
            let pattern = GrantPattern::parse(op, &grant.resource_pattern);
            trace!(pattern = %grant.resource_pattern, parsed = ?pattern, "testing grant");
            if pattern.matches(resource) {
                debug!(
                    operation = %op,
                    resource = %resource.key(),
                    pattern = %grant.resource_pattern,
                    "grant matched"
                );
                return Decision::Allow;
            }
        }

        Decision::deny(
            DenyReason::PermissionDenied,
            if considered == 0 {
                format!("no '{}' grant in permission lock", op)
            } else {
                format!("no '{}' grant matches '{}'", op, resource.key())
            },
        )
    }
}
