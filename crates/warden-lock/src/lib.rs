//! # warden-lock
//!
//! Trust-on-first-use permission locks for Warden plugins.
//!
//! The first time a plugin loads, its manifest's requested permissions are
//! frozen into `permissions.lock.json` inside the plugin directory. Every
//! later load reads that file and ignores whatever the manifest now asks
//! for. [`LockStore`] implements
//! [`GrantRegistry`](warden_core::traits::GrantRegistry), so it is what the
//! mediator consults on every check.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use warden_lock::LockStore;
//!
//! let store = Arc::new(LockStore::new().with_secure_dirs(["/srv/warden/secure"]));
//! let lock = store.load_plugin(Path::new("plugins/model-router"))?;
//! ```

pub mod manifest;
pub mod store;

pub use manifest::{parse_manifest, read_manifest};
pub use store::LockStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
