//! Canonicalization of raw resource expressions.
//!
//! The matcher only ever compares canonical forms, so every ambiguity has to
//! be resolved here, before a decision is made. Anything that cannot be
//! reduced to one unambiguous form is rejected, and the mediator denies it.
//!
//! Rules per resource class:
//!
//! | Class       | Canonical key                                              |
//! |-------------|------------------------------------------------------------|
//! | File        | root-relative `/`-separated path, or absolute path outside |
//! | Network     | lower-cased host, `:port` only when non-default            |
//! | Process     | program token of the command line                          |
//! | Environment | variable name, verbatim                                    |
//! | Database    | trimmed identifier                                         |
//! | Route       | `/`-prefixed path with empty segments collapsed            |
//!
//! File paths are resolved lexically first (`.` dropped, `..` collapsed; a
//! relative path climbing above the plugin root is rejected), then the
//! deepest existing ancestor is canonicalized on disk so symlinks cannot
//! smuggle a path out of the root.

use std::path::{Component, Path, PathBuf};

use url::Url;

use warden_contracts::grant::{OperationType, ResourceClass};

/// A resource in the only form the matcher and the protected-resource rule
/// ever see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalResource {
    class: ResourceClass,
    key: String,
    path: Option<PathBuf>,
}

impl CanonicalResource {
    /// Build an un-normalized resource. Only the trusted host path uses this,
    /// when a host-supplied expression has no canonical form.
    pub fn verbatim(op: OperationType, raw: &str) -> Self {
        let class = op.resource_class();
        let path = (class == ResourceClass::File).then(|| PathBuf::from(raw));
        Self {
            class,
            key: raw.to_string(),
            path,
        }
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    /// The string grant patterns are matched against.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Absolute, symlink-resolved path for file resources.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Final `/`-separated segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Why a resource expression has no canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeError(pub String);

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn reject<T>(reason: impl Into<String>) -> Result<T, NormalizeError> {
    Err(NormalizeError(reason.into()))
}

/// Normalize `raw` for `op`. `root` is the acting plugin's canonical directory
/// and anchors relative file paths.
pub fn normalize(op: OperationType, raw: &str, root: &Path) -> Result<CanonicalResource, NormalizeError> {
    if raw.contains('\0') {
        return reject("resource contains a NUL byte");
    }
    let class = op.resource_class();
    let (key, path) = match class {
        ResourceClass::File => {
            let (key, path) = normalize_file(raw, root)?;
            (key, Some(path))
        }
        ResourceClass::Network => (normalize_network(op, raw)?, None),
        ResourceClass::Process => (normalize_command(raw)?, None),
        ResourceClass::Environment => (normalize_env_var(raw)?, None),
        ResourceClass::Database => (normalize_database(raw)?, None),
        ResourceClass::Route => (normalize_route(raw)?, None),
    };
    Ok(CanonicalResource { class, key, path })
}

// ── File ──────────────────────────────────────────────────────────────────────

fn normalize_file(raw: &str, root: &Path) -> Result<(String, PathBuf), NormalizeError> {
    if raw.trim().is_empty() {
        return reject("empty file path");
    }
    let requested = Path::new(raw);
    let relative = !requested.has_root();

    let lexical = if relative {
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in requested.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return reject(format!("'{}' escapes the plugin directory", raw));
                    }
                }
                Component::Normal(part) => parts.push(part),
                Component::RootDir | Component::Prefix(_) => {
                    return reject(format!("'{}' mixes relative and absolute forms", raw));
                }
            }
        }
        parts.iter().fold(root.to_path_buf(), |acc, part| acc.join(part))
    } else {
        lexical_absolute(requested)
    };

    let resolved = resolve_existing_prefix(&lexical)?;

    if relative && !resolved.starts_with(root) {
        return reject(format!("'{}' resolves outside the plugin directory", raw));
    }

    let key = match resolved.strip_prefix(root) {
        Ok(inside) => slash_joined(inside)?,
        Err(_) => resolved
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| NormalizeError(format!("'{}' is not valid UTF-8", raw)))?,
    };
    let key = if key.is_empty() { ".".to_string() } else { key };
    Ok((key, resolved))
}

/// Collapse `.` and `..` in an absolute path without touching the disk.
fn lexical_absolute(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the deepest ancestor that exists and re-attach the rest.
fn resolve_existing_prefix(path: &Path) -> Result<PathBuf, NormalizeError> {
    let mut ancestor = path;
    loop {
        if ancestor.exists() {
            let canonical = ancestor.canonicalize().map_err(|e| {
                NormalizeError(format!("cannot resolve '{}': {}", ancestor.display(), e))
            })?;
            let suffix = path.strip_prefix(ancestor).unwrap_or(Path::new(""));
            return Ok(if suffix.as_os_str().is_empty() {
                canonical
            } else {
                canonical.join(suffix)
            });
        }
        match ancestor.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => ancestor = parent,
            _ => return Ok(path.to_path_buf()),
        }
    }
}

fn slash_joined(path: &Path) -> Result<String, NormalizeError> {
    let mut parts = Vec::new();
    for component in path.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| NormalizeError(format!("'{}' is not valid UTF-8", path.display())))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

// ── Network ───────────────────────────────────────────────────────────────────

/// Canonical `host[:port]` for a network operation. Default ports for the
/// scheme are dropped, so under `network-https` the addresses
/// `https://h:443/v1` and `h` agree.
pub fn normalize_network(op: OperationType, raw: &str) -> Result<String, NormalizeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return reject("empty network address");
    }

    let url = if raw.contains("://") {
        Url::parse(raw).map_err(|e| NormalizeError(format!("invalid URL '{}': {}", raw, e)))?
    } else {
        let scheme = if op == OperationType::NetworkHttp { "http" } else { "https" };
        Url::parse(&format!("{}://{}", scheme, raw))
            .map_err(|e| NormalizeError(format!("invalid host '{}': {}", raw, e)))?
    };

    let scheme_ok = match op {
        OperationType::NetworkHttp => url.scheme() == "http",
        OperationType::NetworkHttps => url.scheme() == "https",
        _ => true,
    };
    if !scheme_ok {
        return reject(format!("scheme '{}' does not match operation '{}'", url.scheme(), op));
    }

    let host = url
        .host_str()
        .ok_or_else(|| NormalizeError(format!("'{}' has no host", raw)))?
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if host.is_empty() {
        return reject(format!("'{}' has no host", raw));
    }

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

// ── Process / environment / database / route ─────────────────────────────────

fn normalize_command(raw: &str) -> Result<String, NormalizeError> {
    raw.split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| NormalizeError("empty command line".to_string()))
}

fn normalize_env_var(raw: &str) -> Result<String, NormalizeError> {
    if raw.is_empty() || raw.contains(&['=', '\0'][..]) || raw.chars().any(char::is_whitespace) {
        return reject(format!("'{}' is not a valid environment variable name", raw));
    }
    Ok(raw.to_string())
}

fn normalize_database(raw: &str) -> Result<String, NormalizeError> {
    let name = raw.trim();
    if name.is_empty() {
        return reject("empty database identifier");
    }
    Ok(name.to_string())
}

fn normalize_route(raw: &str) -> Result<String, NormalizeError> {
    if !raw.starts_with('/') {
        return reject(format!("route '{}' must start with '/'", raw));
    }
    let mut segments = Vec::new();
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return reject(format!("route '{}' contains a relative segment", raw));
        }
        segments.push(segment);
    }
    Ok(format!("/{}", segments.join("/")))
}
