//! Plugin implementations by name, and the outcome of loading them.

use std::collections::BTreeMap;
use std::sync::Arc;

use warden_contracts::error::{WardenError, WardenResult};

use crate::plugin::Plugin;

/// The plugins compiled into this host, keyed by manifest name.
///
/// Registering an implementation grants it nothing: it only becomes
/// active once a plugin directory with a matching manifest is loaded.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, plugin: impl Plugin + 'static) -> Self {
        self.register(name, Arc::new(plugin));
        self
    }

    /// Returns the implementation previously registered under `name`, if any.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        plugin: Arc<dyn Plugin>,
    ) -> Option<Arc<dyn Plugin>> {
        self.plugins.insert(name.into(), plugin)
    }

    pub fn get(&self, name: &str) -> WardenResult<Arc<dyn Plugin>> {
        self.plugins
            .get(name)
            .cloned()
            .ok_or_else(|| WardenError::PluginNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }
}

/// What `load_all` managed to bring up.
///
/// A failure here only concerns its own plugin; siblings still load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    /// `(plugin directory name, reason)`.
    pub failed: Vec<(String, WardenError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
