//! Plugin manifest types.
//!
//! The manifest is author-supplied and untrusted after first load. Only the
//! first successful load consults `permissions`; every later load reads the
//! permission lock instead.

use serde::{Deserialize, Serialize};

use crate::grant::{OperationType, PermissionGrant};

/// File name of the manifest inside a plugin's directory.
pub const MANIFEST_FILE_NAME: &str = "plugin.toml";

/// A plugin's self-declared identity and requested permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin name. Used as the key for locks, grants, and audit.
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Requested permissions, in declaration order.
    #[serde(default)]
    pub permissions: Vec<PermissionRequest>,
}

/// One permission entry as the plugin author wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    #[serde(rename = "type")]
    pub op: OperationType,
    pub resource: String,
    #[serde(default)]
    pub description: String,
}

impl PermissionRequest {
    pub fn to_grant(&self) -> PermissionGrant {
        PermissionGrant::new(self.op, self.resource.clone(), self.description.clone())
    }
}
