//! Mediated APIs: the only way plugins should reach files, the network,
//! processes, environment variables, databases, and the route table.
//!
//! Each method asks the mediator first and then acts on the canonical
//! resource it returns, never on the caller's raw string. A denial comes
//! back as a typed error before anything is touched.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use url::Url;

use warden_contracts::{
    decision::Decision,
    error::{WardenError, WardenResult},
    grant::OperationType,
};
use warden_core::{CanonicalResource, ExecutionContext, Mediator};

/// Owner recorded for routes registered by host code.
pub const HOST_OWNER: &str = "<host>";

/// Registered HTTP routes and the plugin that owns each.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: RwLock<BTreeMap<String, String>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self, route: &str) -> Option<String> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(route)
            .cloned()
    }

    /// `(route, owner)` pairs in route order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(r, o)| (r.clone(), o.clone()))
            .collect()
    }

    fn insert(&self, route: String, owner: String) -> WardenResult<()> {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        match routes.get(&route) {
            Some(existing) if *existing != owner => Err(WardenError::ConfigError {
                reason: format!("route '{}' is already registered by '{}'", route, existing),
            }),
            _ => {
                routes.insert(route, owner);
                Ok(())
            }
        }
    }
}

/// Handle through which plugins perform sensitive operations.
///
/// Cheap to clone; every clone shares the same mediator and route table.
#[derive(Clone)]
pub struct Sandbox {
    mediator: Arc<Mediator>,
    routes: Arc<RouteTable>,
}

impl Sandbox {
    pub fn new(mediator: Arc<Mediator>, routes: Arc<RouteTable>) -> Self {
        Self { mediator, routes }
    }

    /// Raw decision without performing anything.
    pub fn check(&self, op_type: &str, resource: &str) -> Decision {
        self.mediator.check(op_type, resource)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    // ── Files ────────────────────────────────────────────────────────────────

    pub async fn read_to_string(&self, path: &str) -> WardenResult<String> {
        let target = self.file_target(OperationType::FileRead, path)?;
        tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| io_error(&target, e))
    }

    pub async fn read(&self, path: &str) -> WardenResult<Vec<u8>> {
        let target = self.file_target(OperationType::FileRead, path)?;
        tokio::fs::read(&target).await.map_err(|e| io_error(&target, e))
    }

    /// Replace `path` atomically: write a sibling temp file, then rename.
    pub async fn write(&self, path: &str, contents: impl AsRef<[u8]>) -> WardenResult<()> {
        let target = self.file_target(OperationType::FileWrite, path)?;
        let contents = contents.as_ref().to_vec();
        let dest = target.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dest, &contents))
            .await
            .map_err(|e| io_error(&target, std::io::Error::new(std::io::ErrorKind::Other, e)))?
            .map_err(|e| io_error(&target, e))
    }

    pub async fn create_dir_all(&self, path: &str) -> WardenResult<()> {
        let target = self.file_target(OperationType::FileWrite, path)?;
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| io_error(&target, e))
    }

    pub async fn remove_file(&self, path: &str) -> WardenResult<()> {
        let target = self.file_target(OperationType::FileWrite, path)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| io_error(&target, e))
    }

    fn file_target(&self, op: OperationType, path: &str) -> WardenResult<PathBuf> {
        let resource = self.mediator.authorize(op, path)?;
        Ok(resource
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(path)))
    }

    // ── Network ──────────────────────────────────────────────────────────────

    /// Authorize an outbound request to `url` and return the parsed URL to
    /// hand to the HTTP client. The operation type follows the scheme.
    pub fn http_request(&self, url: &str) -> WardenResult<Url> {
        let parsed = Url::parse(url).map_err(|e| WardenError::UnknownOperation {
            operation: "network".to_string(),
            reason: format!("invalid URL '{}': {}", url, e),
        })?;
        let op = match parsed.scheme() {
            "http" => OperationType::NetworkHttp,
            "https" => OperationType::NetworkHttps,
            other => {
                return Err(WardenError::UnknownOperation {
                    operation: format!("network-{}", other),
                    reason: "only http and https are mediated".to_string(),
                })
            }
        };
        self.mediator.authorize(op, url)?;
        Ok(parsed)
    }

    /// Authorize a connection to `host[:port]` by domain, for non-HTTP
    /// protocols. Returns the canonical `host[:port]`.
    pub fn connect_domain(&self, host: &str) -> WardenResult<String> {
        let resource = self.mediator.authorize(OperationType::NetworkDomain, host)?;
        Ok(resource.key().to_string())
    }

    // ── Processes ────────────────────────────────────────────────────────────

    /// Run `command_line` (program followed by whitespace-separated args) and
    /// collect its output. Only the program name is subject to grants.
    pub async fn run_command(&self, command_line: &str) -> WardenResult<std::process::Output> {
        let resource = self.mediator.authorize(OperationType::Subprocess, command_line)?;
        let program = resource.key().to_string();
        let args: Vec<&str> = command_line.split_whitespace().skip(1).collect();
        debug!(program = %program, args = args.len(), "spawning mediated subprocess");
        tokio::process::Command::new(&program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| WardenError::Io {
                path: program,
                reason: e.to_string(),
            })
    }

    // ── Environment ──────────────────────────────────────────────────────────

    /// Read an environment variable. `Ok(None)` when allowed but unset.
    pub fn env_var(&self, name: &str) -> WardenResult<Option<String>> {
        let resource = self.mediator.authorize(OperationType::Environment, name)?;
        Ok(std::env::var(resource.key()).ok())
    }

    // ── Databases ────────────────────────────────────────────────────────────

    /// Authorize access to a database by identifier and return the canonical
    /// identifier the connection layer should use.
    pub fn database(&self, name: &str) -> WardenResult<String> {
        let resource = self.mediator.authorize(OperationType::Database, name)?;
        Ok(resource.key().to_string())
    }

    // ── Routes ───────────────────────────────────────────────────────────────

    /// Register an HTTP route for the calling plugin.
    ///
    /// Returns the canonical route. Re-registering one's own route is a
    /// no-op; claiming another owner's route is a `ConfigError`.
    pub fn register_route(&self, path: &str) -> WardenResult<String> {
        let resource: CanonicalResource =
            self.mediator.authorize(OperationType::RouteRegistration, path)?;
        let owner = ExecutionContext::current()
            .map(|p| p.to_string())
            .unwrap_or_else(|| HOST_OWNER.to_string());
        let route = resource.key().to_string();
        self.routes.insert(route.clone(), owner.clone())?;
        info!(route = %route, owner = %owner, "route registered");
        Ok(route)
    }
}

fn write_atomic(dest: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = dest.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> WardenError {
    WardenError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
