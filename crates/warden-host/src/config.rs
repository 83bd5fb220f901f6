//! Host configuration, loaded from TOML.
//!
//! ```toml
//! plugins_dir = "plugins"
//! secure_dirs = ["system_secure"]
//!
//! [audit]
//! path = "logs/audit.jsonl"
//! buffer_capacity = 4096
//! ```
//!
//! Relative paths in a file loaded with [`WardenConfig::from_file`] are
//! resolved against the file's directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use warden_audit::DEFAULT_BUFFER_CAPACITY;
use warden_contracts::error::{WardenError, WardenResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Directory whose subdirectories are plugins.
    pub plugins_dir: PathBuf,

    /// Directories no plugin may read or write, whatever its grants.
    #[serde(default)]
    pub secure_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// JSONL audit file. When unset, events are kept in memory only.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Records held while the audit file is unwritable.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl WardenConfig {
    /// A configuration with only the plugin directory set.
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            secure_dirs: Vec::new(),
            audit: AuditConfig::default(),
        }
    }

    /// Parse `s` as TOML.
    ///
    /// Returns `WardenError::ConfigError` if the TOML is malformed, has
    /// unknown keys, or sets a zero buffer capacity.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        let config: WardenConfig = toml::from_str(s).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to parse warden config: {}", e),
        })?;
        if config.audit.buffer_capacity == 0 {
            return Err(WardenError::ConfigError {
                reason: "audit.buffer_capacity must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    /// Read and parse the file at `path`.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        let config = Self::from_toml_str(&contents)?;
        Ok(match path.parent() {
            Some(base) => config.relative_to(base),
            None => config,
        })
    }

    fn relative_to(mut self, base: &Path) -> Self {
        let anchor = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.plugins_dir = anchor(self.plugins_dir);
        self.secure_dirs = self.secure_dirs.into_iter().map(anchor).collect();
        self.audit.path = self.audit.path.map(anchor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config = WardenConfig::from_toml_str(
            r#"
            plugins_dir = "/srv/plugins"
            secure_dirs = ["/srv/secure"]

            [audit]
            path = "/var/log/warden/audit.jsonl"
            buffer_capacity = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.plugins_dir, PathBuf::from("/srv/plugins"));
        assert_eq!(config.secure_dirs, vec![PathBuf::from("/srv/secure")]);
        assert_eq!(config.audit.buffer_capacity, 128);
    }

    #[test]
    fn audit_section_is_optional() {
        let config = WardenConfig::from_toml_str("plugins_dir = \"plugins\"").unwrap();
        assert_eq!(config.audit, AuditConfig::default());
        assert!(config.secure_dirs.is_empty());
    }

    #[test]
    fn unknown_keys_and_zero_capacity_are_rejected() {
        assert!(matches!(
            WardenConfig::from_toml_str("plugins_dir = \"p\"\nplugin_dir = \"q\""),
            Err(WardenError::ConfigError { .. })
        ));
        assert!(matches!(
            WardenConfig::from_toml_str("plugins_dir = \"p\"\n[audit]\nbuffer_capacity = 0"),
            Err(WardenError::ConfigError { .. })
        ));
    }

    #[test]
    fn from_file_anchors_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(
            &path,
            "plugins_dir = \"plugins\"\nsecure_dirs = [\"/abs\"]\n[audit]\npath = \"audit.jsonl\"\n",
        )
        .unwrap();

        let config = WardenConfig::from_file(&path).unwrap();
        assert_eq!(config.plugins_dir, dir.path().join("plugins"));
        assert_eq!(config.secure_dirs, vec![PathBuf::from("/abs")]);
        assert_eq!(config.audit.path, Some(dir.path().join("audit.jsonl")));
    }

    #[test]
    fn missing_file_is_config_error() {
        assert!(matches!(
            WardenConfig::from_file(Path::new("/definitely/not/here.toml")),
            Err(WardenError::ConfigError { .. })
        ));
    }
}
