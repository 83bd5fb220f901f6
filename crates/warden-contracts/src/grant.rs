//! Permission grant vocabulary.
//!
//! Warden uses a closed set of operation types. A plugin may only perform an
//! operation if its permission lock holds a grant of exactly that type whose
//! resource pattern matches the target. Types never generalize into each
//! other: `file-read` does not satisfy a `file-write` check.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WardenError;

/// The closed set of sensitive operations a plugin can be granted.
///
/// Serialized in kebab-case (`"file-read"`, `"route-registration"`, ...) in
/// both manifests and lock files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    FileRead,
    FileWrite,
    NetworkHttp,
    NetworkHttps,
    NetworkDomain,
    Subprocess,
    Environment,
    Database,
    RouteRegistration,
}

/// How a resource expression for a given operation type is interpreted.
///
/// Normalization rules (symlink resolution, case folding, URL parsing) are
/// fixed per class, never per grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    File,
    Network,
    Process,
    Environment,
    Database,
    Route,
}

impl OperationType {
    /// Every recognized operation type, in declaration order.
    pub const ALL: [OperationType; 9] = [
        OperationType::FileRead,
        OperationType::FileWrite,
        OperationType::NetworkHttp,
        OperationType::NetworkHttps,
        OperationType::NetworkDomain,
        OperationType::Subprocess,
        OperationType::Environment,
        OperationType::Database,
        OperationType::RouteRegistration,
    ];

    /// The wire name used in manifests, lock files, and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileRead => "file-read",
            Self::FileWrite => "file-write",
            Self::NetworkHttp => "network-http",
            Self::NetworkHttps => "network-https",
            Self::NetworkDomain => "network-domain",
            Self::Subprocess => "subprocess",
            Self::Environment => "environment",
            Self::Database => "database",
            Self::RouteRegistration => "route-registration",
        }
    }

    /// Parse a wire name. Matching is exact and case-sensitive; anything
    /// outside the closed set returns `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_str() == name)
    }

    pub fn resource_class(&self) -> ResourceClass {
        match self {
            Self::FileRead | Self::FileWrite => ResourceClass::File,
            Self::NetworkHttp | Self::NetworkHttps | Self::NetworkDomain => ResourceClass::Network,
            Self::Subprocess => ResourceClass::Process,
            Self::Environment => ResourceClass::Environment,
            Self::Database => ResourceClass::Database,
            Self::RouteRegistration => ResourceClass::Route,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| WardenError::UnknownOperation {
            operation: s.to_string(),
            reason: "not a recognized operation type".to_string(),
        })
    }
}

/// One `(operation type, resource pattern)` authorization entry.
///
/// Grants are owned by a `PermissionLock` and have no lifecycle of their own.
/// Once part of a lock they are never modified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    #[serde(rename = "type")]
    pub op: OperationType,
    pub resource_pattern: String,
    #[serde(default)]
    pub description: String,
}

impl PermissionGrant {
    pub fn new(
        op: OperationType,
        resource_pattern: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            op,
            resource_pattern: resource_pattern.into(),
            description: description.into(),
        }
    }
}
