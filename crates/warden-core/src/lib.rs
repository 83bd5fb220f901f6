//! # warden-core
//!
//! The enforcement runtime for Warden plugins.
//!
//! This crate provides:
//! - The three trusted traits (`GrantRegistry`, `ResourceMatcher`, `AuditRecorder`)
//! - `ExecutionContext`, the per-unit-of-work plugin attribution stack
//! - Resource normalization into canonical forms
//! - The `Mediator` that wires them together in the correct trust order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{ExecutionContext, Mediator};
//!
//! ExecutionContext::scope(async {
//!     ExecutionContext::invoke("model-router", async {
//!         let decision = mediator.check("file-read", "config.yml");
//!     }).await
//! }).await;
//! ```

pub mod context;
pub mod mediator;
pub mod normalize;
pub mod traits;

pub use context::{ExecutionContext, FrameGuard};
pub use mediator::Mediator;
pub use normalize::{normalize, normalize_network, CanonicalResource, NormalizeError};
pub use traits::{AuditRecorder, GrantRegistry, PluginGrants, ResourceMatcher};
