//! Persisted sync configuration.
//!
//! Mirrors the `settings.json` file kept in the code-sync data directory.
//! Keys are camelCase on disk; unknown keys are carried through untouched.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::package::ExtensionLocation;
use super::sync::SyncArtifact;

/// Package ids excluded from reconciliation, per side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedPackages {
    /// Excluded from the installed → external flow.
    #[serde(default)]
    pub installed: BTreeSet<String>,
    /// Excluded from the external → installed flow.
    #[serde(default)]
    pub external: BTreeSet<String>,
}

impl ExcludedPackages {
    /// The exclusion set for one side.
    #[must_use]
    pub const fn for_location(&self, location: ExtensionLocation) -> &BTreeSet<String> {
        match location {
            ExtensionLocation::Installed => &self.installed,
            ExtensionLocation::External => &self.external,
        }
    }

    fn for_location_mut(&mut self, location: ExtensionLocation) -> &mut BTreeSet<String> {
        match location {
            ExtensionLocation::Installed => &mut self.installed,
            ExtensionLocation::External => &mut self.external,
        }
    }

    /// Whether `id` is excluded on `location`.
    #[must_use]
    pub fn contains(&self, location: ExtensionLocation, id: &str) -> bool {
        self.for_location(location).contains(id)
    }

    /// Exclude `id`; returns false if it already was.
    pub fn exclude(&mut self, location: ExtensionLocation, id: impl Into<String>) -> bool {
        self.for_location_mut(location).insert(id.into())
    }

    /// Stop excluding `id`; returns false if it was not excluded.
    pub fn include(&mut self, location: ExtensionLocation, id: &str) -> bool {
        self.for_location_mut(location).remove(id)
    }
}

/// Complete sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfiguration {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Root of the external sync folder.
    #[serde(default)]
    pub external_path: PathBuf,

    #[serde(default = "default_true")]
    pub auto_import: bool,

    #[serde(default = "default_true")]
    pub auto_export: bool,

    #[serde(default = "default_true")]
    pub import_settings: bool,

    #[serde(default = "default_true")]
    pub import_keybindings: bool,

    #[serde(default = "default_true")]
    pub import_snippets: bool,

    #[serde(default = "default_true")]
    pub import_extensions: bool,

    #[serde(default = "default_true")]
    pub show_status_bar_icon: bool,

    #[serde(default)]
    pub excluded: ExcludedPackages,

    /// Overrides the editor executable name; empty means auto-detect.
    #[serde(default)]
    pub executable_name: String,

    /// Overrides the editor settings folder; empty means the platform default.
    #[serde(default)]
    pub settings_path: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

const fn default_true() -> bool {
    true
}

impl Default for SyncConfiguration {
    fn default() -> Self {
        Self::with_external_path(PathBuf::new())
    }
}

impl SyncConfiguration {
    /// Fresh configuration pointing at `external_path`, everything enabled.
    #[must_use]
    pub fn with_external_path(external_path: impl Into<PathBuf>) -> Self {
        Self {
            schema: None,
            external_path: external_path.into(),
            auto_import: true,
            auto_export: true,
            import_settings: true,
            import_keybindings: true,
            import_snippets: true,
            import_extensions: true,
            show_status_bar_icon: true,
            excluded: ExcludedPackages::default(),
            executable_name: String::new(),
            settings_path: String::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Default external folder suggested on first run.
    #[must_use]
    pub fn default_external_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("OneDrive")
            .join("Apps")
            .join("code-sync")
    }

    /// Whether an artifact is enabled for sync.
    #[must_use]
    pub const fn is_enabled(&self, artifact: SyncArtifact) -> bool {
        match artifact {
            SyncArtifact::Settings => self.import_settings,
            SyncArtifact::Keybindings => self.import_keybindings,
            SyncArtifact::Snippets => self.import_snippets,
            SyncArtifact::Extensions => self.import_extensions,
        }
    }

    /// Path of an artifact inside the external folder.
    #[must_use]
    pub fn external_artifact_path(&self, artifact: SyncArtifact) -> PathBuf {
        self.external_path.join(artifact.file_name())
    }

    /// Folder holding archived extension metadata.
    #[must_use]
    pub fn archive_dir(&self) -> PathBuf {
        self.external_path.join(ARCHIVE_DIR)
    }

    /// Settings folder override, if one is configured.
    #[must_use]
    pub fn settings_path_override(&self) -> Option<PathBuf> {
        let trimmed = self.settings_path.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    /// Executable name override, if one is configured.
    #[must_use]
    pub fn executable_override(&self) -> Option<&str> {
        let trimmed = self.executable_name.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Archive subfolder of the external path.
pub const ARCHIVE_DIR: &str = "packages";

/// Boolean configuration keys that can be toggled from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncToggle {
    AutoImport,
    AutoExport,
    ImportSettings,
    ImportKeybindings,
    ImportSnippets,
    ImportExtensions,
    ShowStatusBarIcon,
}

impl SyncToggle {
    pub const ALL: [Self; 7] = [
        Self::AutoImport,
        Self::AutoExport,
        Self::ImportSettings,
        Self::ImportKeybindings,
        Self::ImportSnippets,
        Self::ImportExtensions,
        Self::ShowStatusBarIcon,
    ];

    /// Key as it appears in the configuration file.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::AutoImport => "autoImport",
            Self::AutoExport => "autoExport",
            Self::ImportSettings => "importSettings",
            Self::ImportKeybindings => "importKeybindings",
            Self::ImportSnippets => "importSnippets",
            Self::ImportExtensions => "importExtensions",
            Self::ShowStatusBarIcon => "showStatusBarIcon",
        }
    }

    #[must_use]
    pub const fn get(self, config: &SyncConfiguration) -> bool {
        match self {
            Self::AutoImport => config.auto_import,
            Self::AutoExport => config.auto_export,
            Self::ImportSettings => config.import_settings,
            Self::ImportKeybindings => config.import_keybindings,
            Self::ImportSnippets => config.import_snippets,
            Self::ImportExtensions => config.import_extensions,
            Self::ShowStatusBarIcon => config.show_status_bar_icon,
        }
    }

    pub fn set(self, config: &mut SyncConfiguration, value: bool) {
        let slot = match self {
            Self::AutoImport => &mut config.auto_import,
            Self::AutoExport => &mut config.auto_export,
            Self::ImportSettings => &mut config.import_settings,
            Self::ImportKeybindings => &mut config.import_keybindings,
            Self::ImportSnippets => &mut config.import_snippets,
            Self::ImportExtensions => &mut config.import_extensions,
            Self::ShowStatusBarIcon => &mut config.show_status_bar_icon,
        };
        *slot = value;
    }

    /// The artifact an import flag controls.
    #[must_use]
    pub const fn artifact(self) -> Option<SyncArtifact> {
        match self {
            Self::ImportSettings => Some(SyncArtifact::Settings),
            Self::ImportKeybindings => Some(SyncArtifact::Keybindings),
            Self::ImportSnippets => Some(SyncArtifact::Snippets),
            Self::ImportExtensions => Some(SyncArtifact::Extensions),
            Self::AutoImport | Self::AutoExport | Self::ShowStatusBarIcon => None,
        }
    }
}

impl fmt::Display for SyncToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for SyncToggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        Self::ALL
            .into_iter()
            .find(|t| t.key().to_lowercase() == normalized)
            .ok_or_else(|| {
                let keys: Vec<&str> = Self::ALL.iter().map(|t| t.key()).collect();
                format!("Unknown setting: {s}. Use one of: {}", keys.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfiguration::default();
        assert!(config.auto_import);
        assert!(config.auto_export);
        assert!(SyncArtifact::ALL.iter().all(|a| config.is_enabled(*a)));
        assert!(config.excluded.installed.is_empty());
        assert!(config.settings_path_override().is_none());
    }

    #[test]
    fn test_deserialize_uses_file_keys() {
        let config: SyncConfiguration = serde_json::from_str(
            r#"{
                "externalPath": "/sync",
                "autoExport": false,
                "importSnippets": false,
                "excluded": { "installed": ["a.b", "a.b"], "external": [] },
                "executableName": "codium",
                "customKey": 5
            }"#,
        )
        .unwrap();

        assert_eq!(config.external_path, PathBuf::from("/sync"));
        assert!(config.auto_import);
        assert!(!config.auto_export);
        assert!(!config.is_enabled(SyncArtifact::Snippets));
        assert_eq!(config.excluded.installed.len(), 1);
        assert_eq!(config.executable_override(), Some("codium"));
        assert_eq!(config.extra.get("customKey"), Some(&serde_json::json!(5)));

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["customKey"], 5);
        assert_eq!(value["excluded"]["installed"], serde_json::json!(["a.b"]));
    }

    #[test]
    fn test_exclusion_set_semantics() {
        let mut excluded = ExcludedPackages::default();
        assert!(excluded.exclude(ExtensionLocation::Installed, "pub.a"));
        assert!(!excluded.exclude(ExtensionLocation::Installed, "pub.a"));
        assert!(excluded.contains(ExtensionLocation::Installed, "pub.a"));
        assert!(!excluded.contains(ExtensionLocation::External, "pub.a"));
        assert!(excluded.include(ExtensionLocation::Installed, "pub.a"));
        assert!(!excluded.include(ExtensionLocation::Installed, "pub.a"));
    }

    #[test]
    fn test_toggle_accessors() {
        let mut config = SyncConfiguration::default();
        for toggle in SyncToggle::ALL {
            toggle.set(&mut config, false);
            assert!(!toggle.get(&config), "{toggle}");
        }
        assert_eq!("import-settings".parse::<SyncToggle>(), Ok(SyncToggle::ImportSettings));
        assert_eq!("autoExport".parse::<SyncToggle>(), Ok(SyncToggle::AutoExport));
        assert!("bogus".parse::<SyncToggle>().is_err());
        assert_eq!(SyncToggle::ImportSnippets.artifact(), Some(SyncArtifact::Snippets));
        assert_eq!(SyncToggle::AutoImport.artifact(), None);
    }
}
