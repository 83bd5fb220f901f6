//! The lock store: trust-on-first-use creation, loading, and the hot-path
//! grant cache.
//!
//! ```text
//! load_plugin(dir)
//!   ├─ read plugin.toml            (ManifestParse on failure)
//!   └─ ensure_lock
//!        ├─ lock file present  → parse, check name  → Active
//!        └─ lock file absent   → snapshot manifest, persist no-clobber
//!                                → Created → Active
//! ```
//!
//! Once a plugin is active its lock is served from memory. Nothing in this
//! module ever rewrites or deletes a lock file.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use warden_contracts::{
    error::{WardenError, WardenResult},
    grant::{OperationType, PermissionGrant, ResourceClass},
    lock::{LockState, PermissionLock, LOCK_FILE_NAME},
    manifest::{PluginManifest, MANIFEST_FILE_NAME},
};
use warden_core::{CanonicalResource, GrantRegistry, PluginGrants};

use crate::manifest::read_manifest;

/// One active plugin as seen by the enforcement hot path.
#[derive(Debug, Clone)]
struct ActivePlugin {
    root: Arc<Path>,
    lock: Arc<PermissionLock>,
}

/// Owns every loaded permission lock and answers `GrantRegistry` queries.
///
/// Share one store per host behind an `Arc`; all methods take `&self`.
#[derive(Debug, Default)]
pub struct LockStore {
    secure_dirs: Vec<PathBuf>,
    active: RwLock<HashMap<String, ActivePlugin>>,
    /// Per-plugin-name creation guards.
    creating: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny every file operation under these directories, whatever the grants.
    pub fn with_secure_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.secure_dirs = dirs
            .into_iter()
            .map(|d| {
                let d = d.as_ref();
                d.canonicalize().unwrap_or_else(|_| d.to_path_buf())
            })
            .collect();
        self
    }

    /// Read `plugin.toml` from `plugin_dir`, then [`ensure_lock`](Self::ensure_lock).
    pub fn load_plugin(&self, plugin_dir: &Path) -> WardenResult<Arc<PermissionLock>> {
        let manifest = read_manifest(plugin_dir)?;
        self.ensure_lock(&manifest, plugin_dir)
    }

    /// Return the plugin's lock, creating it from `manifest` if none exists.
    ///
    /// An existing lock always wins: the manifest's permissions are ignored
    /// and the on-disk grants are returned unchanged. Calling this again for
    /// an already-active plugin returns the cached lock without touching disk.
    pub fn ensure_lock(
        &self,
        manifest: &PluginManifest,
        plugin_dir: &Path,
    ) -> WardenResult<Arc<PermissionLock>> {
        let name = manifest.name.as_str();
        let root = plugin_dir.canonicalize().map_err(|e| WardenError::LockWrite {
            plugin: name.to_string(),
            reason: format!("cannot resolve plugin directory '{}': {}", plugin_dir.display(), e),
        })?;
        if let Some(active) = self.active_for(name, &root)? {
            return Ok(active);
        }

        let guard = self.creation_guard(name);
        let _held = guard.lock().unwrap_or_else(PoisonError::into_inner);

        // Another thread may have finished while we waited.
        if let Some(active) = self.active_for(name, &root)? {
            return Ok(active);
        }

        let lock_path = root.join(LOCK_FILE_NAME);

        let mut state = LockState::Absent;
        let lock = if lock_path.exists() {
            let lock = read_lock(&lock_path, name)?;
            info!(
                plugin = %name,
                grants = lock.grants().len(),
                "loaded existing permission lock; manifest permissions ignored"
            );
            lock
        } else {
            match create_lock(manifest, &lock_path)? {
                Created::Written(lock) => {
                    state = transition(name, state, LockState::Created)?;
                    info!(plugin = %name, grants = lock.grants().len(), "permission lock created");
                    lock
                }
                Created::LostRace => {
                    debug!(plugin = %name, "lock appeared during creation; loading it");
                    read_lock(&lock_path, name)?
                }
            }
        };
        transition(name, state, LockState::Active)?;

        let lock = Arc::new(lock);
        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.to_string(),
                ActivePlugin {
                    root: Arc::from(root.as_path()),
                    lock: Arc::clone(&lock),
                },
            );
        Ok(lock)
    }

    /// The active lock's grants for `plugin`.
    pub fn grants(&self, plugin: &str) -> Option<Vec<PermissionGrant>> {
        self.active_plugin(plugin).map(|p| p.lock.grants().to_vec())
    }

    pub fn lock(&self, plugin: &str) -> Option<Arc<PermissionLock>> {
        self.active_plugin(plugin).map(|p| p.lock)
    }

    /// Canonical directory of an active plugin.
    pub fn plugin_root(&self, plugin: &str) -> Option<PathBuf> {
        self.active_plugin(plugin).map(|p| p.root.to_path_buf())
    }

    /// Names of every active plugin, sorted.
    pub fn loaded_plugins(&self) -> Vec<String> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = active.keys().cloned().collect();
        names.sort();
        names
    }

    /// `Active` once cached; `Absent` otherwise. `Created` is never observable
    /// from outside because creation and activation happen under one guard.
    pub fn state(&self, plugin: &str) -> LockState {
        if self.active_plugin(plugin).is_some() {
            LockState::Active
        } else {
            LockState::Absent
        }
    }

    pub fn secure_dirs(&self) -> &[PathBuf] {
        &self.secure_dirs
    }

    fn active_plugin(&self, plugin: &str) -> Option<ActivePlugin> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin)
            .cloned()
    }

    /// The cached lock for `plugin`, provided it was loaded from `root`.
    fn active_for(&self, plugin: &str, root: &Path) -> WardenResult<Option<Arc<PermissionLock>>> {
        match self.active_plugin(plugin) {
            None => Ok(None),
            Some(active) if *active.root == *root => Ok(Some(active.lock)),
            Some(active) => Err(WardenError::ManifestParse {
                path: root.join(MANIFEST_FILE_NAME).display().to_string(),
                reason: format!(
                    "plugin name '{}' is already loaded from '{}'",
                    plugin,
                    active.root.display()
                ),
            }),
        }
    }

    fn creation_guard(&self, plugin: &str) -> Arc<Mutex<()>> {
        let mut creating = self.creating.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(creating.entry(plugin.to_string()).or_default())
    }
}

impl GrantRegistry for LockStore {
    fn lookup(&self, plugin: &str) -> Option<PluginGrants> {
        self.active_plugin(plugin).map(|p| PluginGrants {
            root: p.root,
            lock: p.lock,
        })
    }

    /// Lock files and manifests are off limits to every plugin:
    ///
    /// - `file-write` to any path named `permissions.lock.json` or `plugin.toml`
    /// - `file-read` of any path named `permissions.lock.json`
    /// - any file operation under a configured secure directory
    ///
    /// Names compare case-insensitively so a case-folding filesystem cannot
    /// be used to reach the same file under another spelling.
    fn is_protected_resource(
        &self,
        plugin: &str,
        op: OperationType,
        resource: &CanonicalResource,
    ) -> bool {
        if resource.class() != ResourceClass::File {
            return false;
        }
        let name = resource.file_name();
        let is_lock = name.eq_ignore_ascii_case(LOCK_FILE_NAME);
        let is_manifest = name.eq_ignore_ascii_case(MANIFEST_FILE_NAME);

        let protected = match op {
            OperationType::FileWrite => is_lock || is_manifest,
            OperationType::FileRead => is_lock,
            _ => false,
        };
        if protected {
            return true;
        }

        let in_secure_dir = resource
            .path()
            .is_some_and(|path| self.secure_dirs.iter().any(|dir| path.starts_with(dir)));
        if in_secure_dir {
            warn!(plugin = %plugin, resource = %resource.key(), "file operation inside secure directory");
        }
        in_secure_dir
    }
}

// ── Lock file I/O ─────────────────────────────────────────────────────────────

enum Created {
    Written(PermissionLock),
    LostRace,
}

fn read_lock(path: &Path, expected: &str) -> WardenResult<PermissionLock> {
    let corrupt = |reason: String| {
        error!(plugin = %expected, path = %path.display(), reason = %reason, "permission lock is corrupt");
        WardenError::LockCorrupt {
            plugin: expected.to_string(),
            reason,
        }
    };

    let contents = std::fs::read_to_string(path)
        .map_err(|e| corrupt(format!("failed to read '{}': {}", path.display(), e)))?;
    let lock: PermissionLock = serde_json::from_str(&contents)
        .map_err(|e| corrupt(format!("failed to parse '{}': {}", path.display(), e)))?;

    if lock.plugin_name() != expected {
        return Err(corrupt(format!(
            "lock names plugin '{}' but manifest names '{}'",
            lock.plugin_name(),
            expected
        )));
    }
    Ok(lock)
}

/// Write the snapshot to a temp file beside `lock_path` and link it into
/// place only if nothing is there yet.
fn create_lock(manifest: &PluginManifest, lock_path: &Path) -> WardenResult<Created> {
    let write_err = |reason: String| WardenError::LockWrite {
        plugin: manifest.name.clone(),
        reason,
    };

    let lock = PermissionLock::from_manifest(manifest);
    let json = serde_json::to_string_pretty(&lock)
        .map_err(|e| write_err(format!("failed to serialize lock: {}", e)))?;

    let dir = lock_path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| write_err(format!("failed to create temp file in '{}': {}", dir.display(), e)))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| write_err(format!("failed to write temp lock: {}", e)))?;

    match tmp.persist_noclobber(lock_path) {
        Ok(_) => Ok(Created::Written(lock)),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(Created::LostRace),
        Err(e) => Err(write_err(format!(
            "failed to persist '{}': {}",
            lock_path.display(),
            e.error
        ))),
    }
}

fn transition(plugin: &str, from: LockState, to: LockState) -> WardenResult<LockState> {
    if !from.permits(to) {
        return Err(WardenError::IllegalLockTransition {
            plugin: plugin.to_string(),
            from,
            to,
        });
    }
    debug!(plugin = %plugin, from = %from, to = %to, "lock state transition");
    Ok(to)
}
