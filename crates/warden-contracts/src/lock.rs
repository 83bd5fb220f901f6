//! Permission lock types.
//!
//! A `PermissionLock` is the host-generated, immutable record of what a
//! plugin was actually granted. It is derived from the manifest exactly once
//! (trust on first use) and is never regenerated automatically: when the
//! manifest and lock disagree, the lock wins.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    grant::PermissionGrant,
    manifest::PluginManifest,
};

/// File name of the lock inside a plugin's directory.
pub const LOCK_FILE_NAME: &str = "permissions.lock.json";

/// The immutable per-plugin grant snapshot.
///
/// Fields are private: once constructed a lock can only be read. The lock
/// store hands it out behind an `Arc` so every task shares one copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionLock {
    plugin_name: String,
    grants: Vec<PermissionGrant>,
    created_at: DateTime<Utc>,
}

impl PermissionLock {
    /// Derive a lock verbatim from the manifest's permission requests.
    ///
    /// Duplicate requests collapse into one grant; the first declaration's
    /// position is kept.
    pub fn from_manifest(manifest: &PluginManifest) -> Self {
        let mut grants: Vec<PermissionGrant> = Vec::with_capacity(manifest.permissions.len());
        for request in &manifest.permissions {
            let grant = request.to_grant();
            if !grants.contains(&grant) {
                grants.push(grant);
            }
        }
        Self {
            plugin_name: manifest.name.clone(),
            grants,
            created_at: Utc::now(),
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn grants(&self) -> &[PermissionGrant] {
        &self.grants
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Trust-on-first-use lifecycle of a plugin's lock.
///
/// ```text
/// Absent ──(manifest snapshot persisted)──▶ Created ──(cached)──▶ Active
///                                                                   ▲
/// lock file already on disk ────────────────────────────────────────┘
/// ```
///
/// There is no edge back to `Absent` or from `Active` to `Created`: the
/// engine never rewrites or deletes a lock. Only an operator removing the
/// file out-of-band (followed by a restart) starts the cycle again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockState {
    Absent,
    Created,
    Active,
}

impl LockState {
    /// Return true if moving from `self` to `next` is a legal transition.
    pub fn permits(self, next: LockState) -> bool {
        matches!(
            (self, next),
            (LockState::Absent, LockState::Created)
                | (LockState::Absent, LockState::Active)
                | (LockState::Created, LockState::Active)
        )
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockState::Absent => "absent",
            LockState::Created => "created",
            LockState::Active => "active",
        };
        f.write_str(name)
    }
}
