//! Per-plugin violation history.
//!
//! `ViolationLog` wraps another recorder and, in addition to forwarding
//! every event, remembers the most recent denials for each plugin so an
//! operator surface can answer "what has this plugin been refused?"
//! without scanning the whole audit log.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use warden_contracts::audit::AuditEvent;
use warden_core::AuditRecorder;

/// Denials remembered per plugin before the oldest are forgotten.
pub const DEFAULT_VIOLATIONS_PER_PLUGIN: usize = 256;

pub struct ViolationLog<R> {
    inner: R,
    per_plugin: usize,
    by_plugin: Mutex<HashMap<String, VecDeque<AuditEvent>>>,
}

impl<R: AuditRecorder> ViolationLog<R> {
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, DEFAULT_VIOLATIONS_PER_PLUGIN)
    }

    pub fn with_limit(inner: R, per_plugin: usize) -> Self {
        Self {
            inner,
            per_plugin: per_plugin.max(1),
            by_plugin: Mutex::new(HashMap::new()),
        }
    }

    /// Recent denials for `plugin`, oldest first.
    pub fn violations(&self, plugin: &str) -> Vec<AuditEvent> {
        self.by_plugin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin)
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// One line per denial: `"<operation> <resource>: <reason>"`.
    pub fn messages(&self, plugin: &str) -> Vec<String> {
        self.violations(plugin)
            .iter()
            .map(|e| format!("{} {}: {}", e.operation_type, e.resource, e.reason))
            .collect()
    }

    /// Plugins with at least one remembered denial, sorted.
    pub fn plugins(&self) -> Vec<String> {
        let map = self.by_plugin.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: AuditRecorder> AuditRecorder for ViolationLog<R> {
    fn record(&self, event: AuditEvent) {
        if event.is_denial() {
            if let Some(plugin) = event.plugin_name.clone() {
                let mut map = self.by_plugin.lock().unwrap_or_else(PoisonError::into_inner);
                let entries = map.entry(plugin).or_default();
                if entries.len() == self.per_plugin {
                    entries.pop_front();
                }
                entries.push_back(event.clone());
            }
        }
        self.inner.record(event);
    }
}
