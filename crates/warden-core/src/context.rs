//! Execution context tracking: which plugin is "in control" right now.
//!
//! Each logical unit of work (one inbound request, one task) owns a private
//! stack of plugin frames stored in a tokio task-local. [`invoke`] does not
//! push onto that stack: it runs the plugin's future under its own copy,
//! parent frames plus the new one, so the frame exists only while that
//! future is being polled. Sibling futures joined inside the caller keep
//! the caller's attribution. Synchronous code uses [`enter`], whose guard
//! pops the frame on every exit path, panics included.
//!
//! [`invoke`]: ExecutionContext::invoke
//! [`enter`]: ExecutionContext::enter
//!
//! ```text
//! scope(request) ──▶ invoke("router") ──▶ invoke("claude-provider")
//!   stack: []          stack: [router]      stack: [router, claude-provider]
//!                                           current() == "claude-provider"
//!                      current() == "router" ◀── provider returns, frame popped
//! ```
//!
//! Stacks are never shared between units of work, so two concurrent
//! requests driven by different plugins cannot observe each other's
//! attribution. Code running outside any plugin frame is host code and is
//! fully trusted.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, trace};

use warden_contracts::{
    audit::WorkId,
    error::{WardenError, WardenResult},
};

tokio::task_local! {
    static CONTEXT: ContextStack;
}

struct ContextStack {
    work_id: WorkId,
    frames: RefCell<Vec<Arc<str>>>,
}

impl ContextStack {
    fn new(work_id: WorkId, frames: Vec<Arc<str>>) -> Self {
        Self {
            work_id,
            frames: RefCell::new(frames),
        }
    }
}

/// Namespace for the per-unit-of-work attribution stack.
pub struct ExecutionContext;

impl ExecutionContext {
    /// Run `fut` as a new unit of work with an empty frame stack.
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        let work_id = WorkId::new();
        debug!(work_id = %work_id.0, "execution scope opened");
        CONTEXT
            .scope(ContextStack::new(work_id, Vec::new()), fut)
            .await
    }

    /// Thread-bound variant of [`scope`](Self::scope) for synchronous hosts.
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        CONTEXT.sync_scope(ContextStack::new(WorkId::new(), Vec::new()), f)
    }

    /// Wrap `fut` so it runs with a copy of the caller's current stack.
    ///
    /// Use this for work a plugin spawns onto another task; without it the
    /// spawned task would run with no frames and be treated as host code.
    /// The snapshot is taken now, not when the returned future is polled.
    pub fn inherit<F: Future>(fut: F) -> impl Future<Output = F::Output> {
        let (work_id, frames) = CONTEXT
            .try_with(|ctx| (ctx.work_id, ctx.frames.borrow().clone()))
            .unwrap_or_else(|_| (WorkId::new(), Vec::new()));
        CONTEXT.scope(ContextStack::new(work_id, frames), fut)
    }

    /// Push a frame for `plugin`. The frame is popped when the guard drops.
    ///
    /// Returns `ContextUnavailable` when called outside any scope: a plugin
    /// frame with nowhere to live would silently attribute to nothing.
    pub fn enter(plugin: &str) -> WardenResult<FrameGuard> {
        CONTEXT
            .try_with(|ctx| {
                let mut frames = ctx.frames.borrow_mut();
                let depth = frames.len();
                frames.push(Arc::from(plugin));
                trace!(plugin = %plugin, depth = depth + 1, "plugin frame entered");
                FrameGuard {
                    work_id: ctx.work_id,
                    depth,
                }
            })
            .map_err(|_| WardenError::ContextUnavailable {
                reason: format!("cannot enter plugin '{}' outside an execution scope", plugin),
            })
    }

    /// Run `fut` with `plugin` on top of the caller's stack.
    ///
    /// The frame belongs to `fut` alone. Anything the caller polls
    /// alongside it (`join!`, `select!`) still sees the caller's frames, and
    /// dropping `fut` early leaves the caller's stack untouched.
    pub async fn invoke<F: Future>(plugin: &str, fut: F) -> WardenResult<F::Output> {
        let (work_id, mut frames) = CONTEXT
            .try_with(|ctx| (ctx.work_id, ctx.frames.borrow().clone()))
            .map_err(|_| WardenError::ContextUnavailable {
                reason: format!("cannot invoke plugin '{}' outside an execution scope", plugin),
            })?;
        frames.push(Arc::from(plugin));
        trace!(plugin = %plugin, depth = frames.len(), "plugin invoked");
        Ok(CONTEXT.scope(ContextStack::new(work_id, frames), fut).await)
    }

    /// The plugin currently in control, or `None` for host code.
    pub fn current() -> Option<Arc<str>> {
        CONTEXT
            .try_with(|ctx| ctx.frames.borrow().last().cloned())
            .ok()
            .flatten()
    }

    /// Number of plugin frames on the current stack.
    pub fn depth() -> usize {
        CONTEXT
            .try_with(|ctx| ctx.frames.borrow().len())
            .unwrap_or(0)
    }

    /// The current unit of work, if inside a scope.
    pub fn work_id() -> Option<WorkId> {
        CONTEXT.try_with(|ctx| ctx.work_id).ok()
    }
}

/// Scoped plugin frame. Dropping it pops the frame (and anything left above
/// it, should inner guards have leaked).
#[must_use = "the plugin frame is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FrameGuard {
    work_id: WorkId,
    depth: usize,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        // A guard moved to another unit of work must not touch that stack.
        let _ = CONTEXT.try_with(|ctx| {
            if ctx.work_id == self.work_id {
                ctx.frames.borrow_mut().truncate(self.depth);
            }
        });
    }
}
