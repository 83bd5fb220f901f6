//! # warden-host
//!
//! Plugin hosting on top of the Warden enforcement engine.
//!
//! [`Warden`] wires the lock store, the pattern matcher, and an audit
//! recorder into one [`Mediator`], loads plugin directories, and runs
//! request chains with every handler inside its own execution-context
//! frame. Plugins see the world only through the [`Sandbox`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_host::{PluginRegistry, Warden, WardenConfig};
//!
//! let config = WardenConfig::from_file(Path::new("warden.toml"))?;
//! let plugins = PluginRegistry::new().with("model-router", ModelRouter::default());
//! let mut warden = Warden::new(config, plugins)?;
//!
//! let report = warden.load_all().await?;
//! let ctx = warden.dispatch("/api/v1/chat", serde_json::json!({"q": "hi"})).await?;
//! ```

pub mod config;
pub mod plugin;
pub mod registry;
pub mod sandbox;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use warden_audit::{InMemoryAuditRecorder, JsonlAuditRecorder, ViolationLog};
use warden_contracts::{
    audit::AuditEvent,
    error::{WardenError, WardenResult},
};
use warden_core::{AuditRecorder, ExecutionContext, Mediator};
use warden_lock::{read_manifest, LockStore};
use warden_policy::PatternMatcher;

pub use config::{AuditConfig, WardenConfig};
pub use plugin::{Next, Plugin, PluginFailure, RequestContext};
pub use registry::{LoadReport, PluginRegistry};
pub use sandbox::{RouteTable, Sandbox, HOST_OWNER};

use plugin::{failed, run_chain, ChainLink};

/// Chain id for hosts that keep their audit trail in memory. That trail is
/// bounded by `audit.buffer_capacity`.
pub const MEMORY_CHAIN_ID: &str = "warden-memory";

/// A running plugin host.
pub struct Warden {
    config: WardenConfig,
    store: Arc<LockStore>,
    recorder: Arc<ViolationLog<Arc<dyn AuditRecorder>>>,
    file_log: Option<Arc<JsonlAuditRecorder>>,
    memory_log: Option<InMemoryAuditRecorder>,
    mediator: Arc<Mediator>,
    sandbox: Sandbox,
    implementations: PluginRegistry,
    active: BTreeMap<String, Arc<dyn Plugin>>,
}

impl Warden {
    /// Build a host from configuration. Opens the audit file if one is set.
    pub fn new(config: WardenConfig, implementations: PluginRegistry) -> WardenResult<Self> {
        match config.audit.path.clone() {
            Some(path) => {
                let file_log = Arc::new(JsonlAuditRecorder::open(path, config.audit.buffer_capacity)?);
                let recorder: Arc<dyn AuditRecorder> = file_log.clone();
                Ok(Self::assemble(config, implementations, recorder, Some(file_log)))
            }
            None => {
                let memory_log =
                    InMemoryAuditRecorder::with_capacity(MEMORY_CHAIN_ID, config.audit.buffer_capacity);
                let recorder: Arc<dyn AuditRecorder> = Arc::new(memory_log.clone());
                let mut warden = Self::assemble(config, implementations, recorder, None);
                warden.memory_log = Some(memory_log);
                Ok(warden)
            }
        }
    }

    /// Build a host that records to `recorder` instead of the configured sink.
    pub fn with_recorder(
        config: WardenConfig,
        implementations: PluginRegistry,
        recorder: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self::assemble(config, implementations, recorder, None)
    }

    fn assemble(
        config: WardenConfig,
        implementations: PluginRegistry,
        recorder: Arc<dyn AuditRecorder>,
        file_log: Option<Arc<JsonlAuditRecorder>>,
    ) -> Self {
        let store = Arc::new(LockStore::new().with_secure_dirs(&config.secure_dirs));
        let recorder = Arc::new(ViolationLog::new(recorder));

        let mut mediator = Mediator::new(store.clone(), Box::new(PatternMatcher::new()), recorder.clone());
        if let Ok(cwd) = std::env::current_dir() {
            mediator = mediator.with_host_root(cwd);
        }
        let mediator = Arc::new(mediator);
        let sandbox = Sandbox::new(mediator.clone(), Arc::new(RouteTable::new()));

        Self {
            config,
            store,
            recorder,
            file_log,
            memory_log: None,
            mediator,
            sandbox,
            implementations,
            active: BTreeMap::new(),
        }
    }

    // ── Loading ──────────────────────────────────────────────────────────────

    /// Load every plugin directory under `plugins_dir`.
    ///
    /// Directories whose names start with `.` or `_` are skipped. A plugin
    /// that fails to load is reported and left inactive; the rest continue.
    pub async fn load_all(&mut self) -> WardenResult<LoadReport> {
        let plugins_dir = self.config.plugins_dir.clone();
        let entries = std::fs::read_dir(&plugins_dir).map_err(|e| WardenError::ConfigError {
            reason: format!("cannot read plugins_dir '{}': {}", plugins_dir.display(), e),
        })?;

        let mut dirs: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with('.') && !n.starts_with('_'))
            })
            .collect();
        dirs.sort();

        let mut report = LoadReport::default();
        for dir in dirs {
            let label = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.load_plugin(&dir).await {
                Ok(name) => report.loaded.push(name),
                Err(e) => {
                    warn!(plugin_dir = %label, error = %e, "plugin failed to load");
                    report.failed.push((label, e));
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "plugin loading complete"
        );
        Ok(report)
    }

    /// Load one plugin directory, activate its lock, and initialize it.
    ///
    /// Returns the plugin's name. Loading an already-active plugin again is
    /// a no-op.
    pub async fn load_plugin(&mut self, dir: &Path) -> WardenResult<String> {
        let manifest = read_manifest(dir)?;
        let name = manifest.name.clone();
        if self.active.contains_key(&name) {
            self.store.ensure_lock(&manifest, dir)?;
            return Ok(name);
        }

        // No implementation means no lock is ever written for it.
        let plugin = self.implementations.get(&name)?;
        let lock = self.store.ensure_lock(&manifest, dir)?;

        let sandbox = self.sandbox.clone();
        ExecutionContext::scope(ExecutionContext::invoke(&name, plugin.initialize(&sandbox)))
            .await
            .and_then(|result| result)
            .map_err(|e| failed(&name, e))?;

        info!(plugin = %name, grants = lock.grants().len(), "plugin active");
        self.active.insert(name.clone(), plugin);
        Ok(name)
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    /// Run `ctx` through the named plugins, in order, as one unit of work.
    pub async fn run_chain(&self, chain: &[&str], mut ctx: RequestContext) -> WardenResult<RequestContext> {
        let links = chain
            .iter()
            .map(|name| {
                self.active
                    .get(*name)
                    .map(|plugin| ChainLink {
                        name: Arc::from(*name),
                        plugin: Arc::clone(plugin),
                    })
                    .ok_or_else(|| WardenError::PluginNotFound {
                        name: name.to_string(),
                    })
            })
            .collect::<WardenResult<Vec<_>>>()?;

        ExecutionContext::scope(run_chain(&links, &self.sandbox, &mut ctx)).await;
        Ok(ctx)
    }

    /// Deliver a request to the plugin that registered `route`.
    pub async fn dispatch(&self, route: &str, request: serde_json::Value) -> WardenResult<RequestContext> {
        let owner = self
            .sandbox
            .routes()
            .owner(route)
            .filter(|owner| owner != HOST_OWNER)
            .ok_or_else(|| WardenError::PluginNotFound {
                name: format!("route {}", route),
            })?;
        self.run_chain(&[owner.as_str()], RequestContext::new(route, request))
            .await
    }

    /// Shut every active plugin down, newest name last, then flush the audit log.
    pub async fn shutdown(&mut self) -> WardenResult<()> {
        let active = std::mem::take(&mut self.active);
        for (name, plugin) in active.iter().rev() {
            let outcome = ExecutionContext::scope(ExecutionContext::invoke(name, plugin.shutdown()))
                .await
                .and_then(|result| result);
            if let Err(e) = outcome {
                warn!(plugin = %name, error = %e, "plugin shutdown failed");
            }
        }
        self.flush_audit()
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn store(&self) -> &LockStore {
        &self.store
    }

    pub fn mediator(&self) -> &Arc<Mediator> {
        &self.mediator
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn active_plugins(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    /// Recent denials recorded against `plugin`, oldest first.
    pub fn violations(&self, plugin: &str) -> Vec<AuditEvent> {
        self.recorder.violations(plugin)
    }

    /// Write any buffered audit records to the audit file.
    pub fn flush_audit(&self) -> WardenResult<()> {
        match &self.file_log {
            Some(log) => log.flush(),
            None => Ok(()),
        }
    }

    /// Audit records lost to buffer overflow (file log) or evicted from the
    /// bounded in-memory log since start-up.
    pub fn audit_dropped(&self) -> u64 {
        match (&self.file_log, &self.memory_log) {
            (Some(log), _) => log.dropped(),
            (None, Some(log)) => log.dropped(),
            (None, None) => 0,
        }
    }
}
