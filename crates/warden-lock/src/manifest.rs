//! `plugin.toml` loading and validation.
//!
//! The manifest is author-controlled, so everything it says is checked
//! before a lock can be derived from it. A manifest that fails here never
//! produces a lock, and the plugin is left unloaded.

use std::path::Path;

use warden_contracts::{
    error::{WardenError, WardenResult},
    manifest::{PluginManifest, MANIFEST_FILE_NAME},
};

/// Parse and validate manifest TOML. `origin` is only used in error messages.
///
/// Returns `WardenError::ManifestParse` if the TOML is malformed, a required
/// field is missing, a permission names an unrecognized type, or the plugin
/// name could escape a directory (`/`, `\`, `..`).
pub fn parse_manifest(s: &str, origin: &str) -> WardenResult<PluginManifest> {
    let manifest: PluginManifest = toml::from_str(s).map_err(|e| WardenError::ManifestParse {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;

    let invalid = |reason: String| WardenError::ManifestParse {
        path: origin.to_string(),
        reason,
    };

    let name = manifest.name.trim();
    if name.is_empty() {
        return Err(invalid("plugin name must not be empty".to_string()));
    }
    if name != manifest.name {
        return Err(invalid(format!(
            "plugin name '{}' has leading or trailing whitespace",
            manifest.name
        )));
    }
    if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
        return Err(invalid(format!("plugin name '{}' is not a valid identifier", name)));
    }
    if manifest.version.trim().is_empty() {
        return Err(invalid("plugin version must not be empty".to_string()));
    }
    for (index, request) in manifest.permissions.iter().enumerate() {
        if request.resource.trim().is_empty() {
            return Err(invalid(format!(
                "permission #{} ({}) has an empty resource",
                index + 1,
                request.op
            )));
        }
    }

    Ok(manifest)
}

/// Read `<dir>/plugin.toml`.
pub fn read_manifest(dir: &Path) -> WardenResult<PluginManifest> {
    let path = dir.join(MANIFEST_FILE_NAME);
    let contents = std::fs::read_to_string(&path).map_err(|e| WardenError::ManifestParse {
        path: path.display().to_string(),
        reason: format!("failed to read manifest: {}", e),
    })?;
    parse_manifest(&contents, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use warden_contracts::grant::OperationType;

    use super::*;

    fn parse_err(s: &str) -> String {
        match parse_manifest(s, "plugin.toml") {
            Err(WardenError::ManifestParse { reason, .. }) => reason,
            other => panic!("expected ManifestParse, got {:?}", other),
        }
    }

    #[test]
    fn parses_a_complete_manifest() {
        let m = parse_manifest(
            r#"
            name = "model-router"
            version = "1.2.0"
            description = "Routes chat requests"

            [[permissions]]
            type = "file-read"
            resource = "config.yml"
            description = "Read routing table"

            [[permissions]]
            type = "network-https"
            resource = "api.openai.com"
            "#,
            "plugin.toml",
        )
        .unwrap();

        assert_eq!(m.name, "model-router");
        assert_eq!(m.permissions.len(), 2);
        assert_eq!(m.permissions[0].op, OperationType::FileRead);
        assert_eq!(m.permissions[1].description, "");
    }

    #[test]
    fn permissions_default_to_empty() {
        let m = parse_manifest("name = \"quiet\"\nversion = \"0.1.0\"\n", "plugin.toml").unwrap();
        assert!(m.permissions.is_empty());
    }

    #[test]
    fn missing_version_is_rejected() {
        assert!(parse_err("name = \"x\"").contains("version"));
    }

    #[test]
    fn unknown_permission_type_is_rejected() {
        let reason = parse_err(
            r#"
            name = "x"
            version = "1"
            [[permissions]]
            type = "kernel-module"
            resource = "*"
            "#,
        );
        assert!(reason.contains("kernel-module") || reason.contains("unknown variant"));
    }

    #[test]
    fn path_like_names_are_rejected() {
        parse_err("name = \"../evil\"\nversion = \"1\"");
        parse_err("name = \"a/b\"\nversion = \"1\"");
        parse_err("name = \"\"\nversion = \"1\"");
    }

    #[test]
    fn empty_resource_is_rejected() {
        let reason = parse_err(
            r#"
            name = "x"
            version = "1"
            [[permissions]]
            type = "file-read"
            resource = "  "
            "#,
        );
        assert!(reason.contains("empty resource"));
    }

    #[test]
    fn read_manifest_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_manifest(dir.path()),
            Err(WardenError::ManifestParse { .. })
        ));
    }
}
