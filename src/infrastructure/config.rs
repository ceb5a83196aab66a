//! Configuration file management.
//!
//! Handles loading and saving the sync configuration and the external
//! extension manifest.

use std::path::{Path, PathBuf};

use crate::domain::{AppError, ExtensionManifest, Result, SyncConfiguration};

use super::{fs_ops, jsonc};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CODE_SYNC_HOME";

const SETTINGS_FILE: &str = "settings.json";
const LOCAL_SETTINGS_FILE: &str = "local-settings.json";

/// Reads and writes files in the code-sync data directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store at the explicit directory, else `$CODE_SYNC_HOME`, else the default.
    #[must_use]
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let dir = explicit
            .or_else(|| {
                std::env::var_os(DATA_DIR_ENV)
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(Self::default_data_dir);
        Self::new(dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".code-sync")
    }

    #[cfg(test)]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the configuration file.
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Path of the machine-local settings overrides.
    #[must_use]
    pub fn local_settings_file(&self) -> PathBuf {
        self.dir.join(LOCAL_SETTINGS_FILE)
    }

    /// Whether a configuration file has been written yet.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.settings_file().is_file()
    }

    /// Load the configuration.
    ///
    /// # Errors
    /// Returns error if the file is missing or cannot be parsed.
    pub fn load(&self) -> Result<SyncConfiguration> {
        let path = self.settings_file();
        if !path.exists() {
            return Err(AppError::NotFound { path });
        }

        let content = fs_ops::read_file(&path)?;
        if content.trim().is_empty() {
            tracing::warn!(path = %path.display(), "Configuration file is empty, using defaults");
            return Ok(SyncConfiguration::default());
        }

        jsonc::from_str(&content).map_err(|e| AppError::Config {
            message: format!("Failed to parse {}: {e}", path.display()),
        })
    }

    /// Save the configuration with four-space indentation.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn save(&self, config: &SyncConfiguration) -> Result<()> {
        let path = self.settings_file();
        let mut content = jsonc::to_pretty_string(config)?;
        content.push('\n');
        fs_ops::write_file(&path, &content)?;

        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

/// Load an extension manifest. A missing or blank file is an empty manifest.
///
/// # Errors
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_manifest(path: &Path) -> Result<ExtensionManifest> {
    if !path.exists() {
        return Ok(ExtensionManifest::default());
    }

    let content = fs_ops::read_file(path)?;
    if content.trim().is_empty() {
        return Ok(ExtensionManifest::default());
    }

    serde_json::from_value(jsonc::parse_value(&content)?).map_err(|e| AppError::json_in(path, e))
}

/// Write an extension manifest.
///
/// # Errors
/// Returns error if the file cannot be written.
pub fn save_manifest(path: &Path, manifest: &ExtensionManifest) -> Result<()> {
    let mut content = jsonc::to_pretty_string(manifest)?;
    content.push('\n');
    fs_ops::write_file(path, &content)?;

    tracing::debug!(
        path = %path.display(),
        count = manifest.extensions.len(),
        "Extension manifest written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExtensionLocation;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(AppError::NotFound { .. })));

        let mut config = SyncConfiguration::with_external_path("/sync/code");
        config.auto_export = false;
        config.excluded.exclude(ExtensionLocation::External, "pub.skip");
        store.save(&config).unwrap();

        assert!(store.exists());
        let loaded = store.load().unwrap();
        assert_eq!(loaded, config);

        let text = std::fs::read_to_string(store.settings_file()).unwrap();
        assert!(text.contains("\n    \"externalPath\": \"/sync/code\""));
    }

    #[test]
    fn test_load_tolerates_comments_and_keeps_unknown_keys() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        std::fs::write(
            store.settings_file(),
            "{\n  // where the cloud folder lives\n  \"externalPath\": \"/x\",\n  \"legacyFlag\": true,\n}\n",
        )
        .unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.external_path, PathBuf::from("/x"));
        assert!(config.import_extensions);

        store.save(&config).unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.extra.get("legacyFlag"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extensions.json");
        assert!(load_manifest(&path).unwrap().extensions.is_empty());

        let manifest = ExtensionManifest {
            extensions: vec!["pub.a".into(), "pub.b".into()],
        };
        save_manifest(&path, &manifest).unwrap();
        assert_eq!(load_manifest(&path).unwrap(), manifest);
    }

    #[test]
    fn test_resolve_prefers_explicit_dir() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::resolve(Some(dir.path().to_path_buf()));
        assert_eq!(store.dir(), dir.path());
        assert_eq!(store.local_settings_file(), dir.path().join("local-settings.json"));
    }
}
