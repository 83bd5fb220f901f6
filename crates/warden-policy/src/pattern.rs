//! Grant resource patterns.
//!
//! A pattern is parsed once per resource class into one of four shapes:
//!
//! | Pattern      | Matches                                              |
//! |--------------|------------------------------------------------------|
//! | `*`          | any resource                                         |
//! | `dir/*`      | anything strictly below `dir` (one or more segments) |
//! | `*.ext`      | any resource whose final segment ends in `.ext`      |
//! | anything else| the identical canonical key                          |
//!
//! Patterns are normalized lexically the same way file keys are (`./`
//! dropped, duplicate `/` collapsed). A pattern with a `..` segment can
//! never be satisfied, since no canonical key contains one. Network
//! patterns without a wildcard go through the same URL canonicalization as
//! requested addresses, so an explicit default port is dropped.

use warden_contracts::grant::{OperationType, ResourceClass};
use warden_core::{normalize_network, CanonicalResource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantPattern {
    Any,
    Exact(String),
    /// `base/*`; `base` may be empty for `/*`.
    Below(String),
    /// `*.ext`; holds the suffix including the dot.
    Suffix(String),
    Never,
}

impl GrantPattern {
    /// Parse `raw` as a pattern for resources of `op`.
    pub fn parse(op: OperationType, raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return GrantPattern::Any;
        }
        let Some(pattern) = normalize_pattern(op, raw) else {
            return GrantPattern::Never;
        };

        if let Some(base) = pattern.strip_suffix("/*") {
            if !base.contains('*') {
                return GrantPattern::Below(base.to_string());
            }
        }
        if let Some(ext) = pattern.strip_prefix('*') {
            if ext.starts_with('.') && ext.len() > 1 && !ext.contains('*') && !ext.contains('/') {
                return GrantPattern::Suffix(ext.to_string());
            }
        }
        GrantPattern::Exact(pattern)
    }

    pub fn matches(&self, resource: &CanonicalResource) -> bool {
        let key = resource.key();
        match self {
            GrantPattern::Any => true,
            GrantPattern::Never => false,
            GrantPattern::Exact(literal) => key == literal,
            GrantPattern::Below(base) => key
                .strip_prefix(base.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|rest| !rest.is_empty()),
            GrantPattern::Suffix(ext) => {
                let tail = match resource.class() {
                    ResourceClass::Network => host_part(key),
                    _ => resource.file_name(),
                };
                tail.len() > ext.len() && tail.ends_with(ext.as_str())
            }
        }
    }
}

fn normalize_pattern(op: OperationType, raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    if op.resource_class() == ResourceClass::Network {
        if !raw.contains('*') {
            return normalize_network(op, raw).ok();
        }
        // A wildcard is not a valid host, keep it lexical.
        let host = raw.split_once("://").map_or(raw, |(_, rest)| rest);
        let host = host.split('/').next().unwrap_or(host);
        return Some(host.trim_end_matches('.').to_ascii_lowercase());
    }

    let absolute = raw.starts_with('/');
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    Some(if absolute { format!("/{}", joined) } else { joined })
}

fn host_part(key: &str) -> &str {
    key.rsplit_once(':').map_or(key, |(host, _)| host)
}
