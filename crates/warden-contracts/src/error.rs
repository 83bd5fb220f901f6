//! Error taxonomy for the Warden permission engine.
//!
//! Load-time errors (`ManifestParse`, `LockCorrupt`, `LockWrite`) disable only
//! the plugin they concern. Runtime denials surface as
//! `ProtectedResourceViolation`, `PermissionDenied`, or `UnknownOperation` on
//! the calling plugin's invocation path and cannot be retried with more
//! privilege.

use thiserror::Error;

use crate::lock::LockState;

/// The unified error type for the Warden crates.
#[derive(Debug, Error)]
pub enum WardenError {
    /// The manifest is malformed or missing required fields.
    #[error("manifest parse error in '{path}': {reason}")]
    ManifestParse { path: String, reason: String },

    /// The on-disk lock is unreadable or names a different plugin.
    ///
    /// The plugin fails to load and is flagged for the operator.
    #[error("permission lock for plugin '{plugin}' is corrupt: {reason}")]
    LockCorrupt { plugin: String, reason: String },

    /// The lock could not be persisted during first load.
    #[error("failed to write permission lock for plugin '{plugin}': {reason}")]
    LockWrite { plugin: String, reason: String },

    /// A lock state change that the trust-on-first-use lifecycle forbids.
    #[error("illegal lock transition for plugin '{plugin}': {from} -> {to}")]
    IllegalLockTransition {
        plugin: String,
        from: LockState,
        to: LockState,
    },

    /// The plugin tried to touch a lock file, manifest, or secure directory.
    #[error("plugin '{plugin}' attempted to access protected resource '{resource}'")]
    ProtectedResourceViolation { plugin: String, resource: String },

    /// No grant authorizes the operation.
    #[error("plugin '{plugin}' is not permitted to perform '{operation}' on '{resource}'")]
    PermissionDenied {
        plugin: String,
        operation: String,
        resource: String,
    },

    /// Unrecognized operation type or a resource with no canonical form.
    #[error("unknown operation '{operation}': {reason}")]
    UnknownOperation { operation: String, reason: String },

    /// A plugin frame was entered outside any unit-of-work scope.
    #[error("execution context unavailable: {reason}")]
    ContextUnavailable { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("plugin not found: {name}")]
    PluginNotFound { name: String },

    /// A plugin's own handler returned an error.
    #[error("plugin '{plugin}' failed: {reason}")]
    PluginFailed { plugin: String, reason: String },

    /// An I/O failure in a mediated operation, after it was authorized.
    #[error("i/o error on '{path}': {reason}")]
    Io { path: String, reason: String },
}

/// Convenience alias used throughout the Warden crates.
pub type WardenResult<T> = Result<T, WardenError>;
