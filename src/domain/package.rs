//! Domain models for editor extension packages.
//!
//! Packages come from two places: the editor's live extension directory
//! (installed) and the external sync folder (archived). Both are identified
//! by `publisher.name` and carry a dotted version string.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which side of the sync a package or exclusion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionLocation {
    /// The editor's live extension directory.
    Installed,
    /// The external sync folder.
    External,
}

impl fmt::Display for ExtensionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed => write!(f, "installed"),
            Self::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for ExtensionLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "installed" | "local" => Ok(Self::Installed),
            "external" | "remote" => Ok(Self::External),
            _ => Err(format!("Unknown location: {s}. Use: installed, external")),
        }
    }
}

/// Identifier parsed from an archive folder name of the form
/// `publisher.name-version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentifier {
    /// `publisher.name`, or the whole folder name when no version suffix was found.
    pub id: String,
    /// Version suffix, empty when the folder name carries none.
    pub version: String,
}

impl PackageIdentifier {
    /// Parses a folder name.
    ///
    /// The text after the last `-` is taken as the version only when its first
    /// and last characters are both ASCII digits. Nothing else about the
    /// suffix is validated, so `foo-1x1` still yields version `1x1`.
    #[must_use]
    pub fn parse(folder_name: &str) -> Self {
        let Some(dash) = folder_name.rfind('-') else {
            return Self::unversioned(folder_name);
        };

        let suffix = &folder_name[dash + 1..];
        let bounded_by_digits = suffix.chars().next().is_some_and(|c| c.is_ascii_digit())
            && suffix.chars().last().is_some_and(|c| c.is_ascii_digit());

        if bounded_by_digits {
            Self {
                id: folder_name[..dash].to_string(),
                version: suffix.to_string(),
            }
        } else {
            Self::unversioned(folder_name)
        }
    }

    fn unversioned(name: &str) -> Self {
        Self {
            id: name.to_string(),
            version: String::new(),
        }
    }

    /// Folder name for this identifier (`id-version`, or `id` alone).
    #[must_use]
    pub fn folder_name(&self) -> String {
        if self.version.is_empty() {
            self.id.clone()
        } else {
            format!("{}-{}", self.id, self.version)
        }
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.folder_name())
    }
}

/// Common view over installed and archived packages.
pub trait Package {
    /// `publisher.name`.
    fn id(&self) -> &str;
    /// Dotted version string.
    fn version(&self) -> &str;
    /// Human-readable name, falling back to the id.
    fn label(&self) -> &str;
}

/// A package present in the editor's live extension directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub id: String,
    pub version: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub is_theme: bool,
    /// Extension folder on disk, when known.
    pub path: Option<PathBuf>,
}

impl InstalledPackage {
    /// Create a package record with only id and version set.
    #[cfg(test)]
    #[must_use]
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            display_name: None,
            description: None,
            is_theme: false,
            path: None,
        }
    }

    /// Build from a parsed `package.json` found in `path`.
    #[must_use]
    pub fn from_manifest(manifest: &PackageJson, path: PathBuf) -> Self {
        Self {
            id: manifest.id(),
            version: manifest.version.clone(),
            display_name: manifest.display_name.clone(),
            description: manifest.description.clone(),
            is_theme: manifest.is_theme(),
            path: Some(path),
        }
    }

    /// Folder name this package is archived under.
    #[must_use]
    pub fn archive_folder_name(&self) -> String {
        PackageIdentifier {
            id: self.id.clone(),
            version: self.version.clone(),
        }
        .folder_name()
    }
}

impl Package for InstalledPackage {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// A package present in the external archive folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedPackage {
    pub id: String,
    pub version: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub is_theme: bool,
    /// Archive folder holding the package metadata.
    pub path: PathBuf,
}

impl ArchivedPackage {
    /// Build from a parsed `package.json` found in `path`.
    #[must_use]
    pub fn from_manifest(manifest: &PackageJson, path: PathBuf) -> Self {
        Self {
            id: manifest.id(),
            version: manifest.version.clone(),
            display_name: manifest.display_name.clone(),
            description: manifest.description.clone(),
            is_theme: manifest.is_theme(),
            path,
        }
    }
}

impl Package for ArchivedPackage {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// The subset of an extension's `package.json` that sync cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributes: Option<serde_json::Value>,
}

impl PackageJson {
    /// `publisher.name`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}.{}", self.publisher, self.name)
    }

    /// Whether the package contributes color themes.
    #[must_use]
    pub fn is_theme(&self) -> bool {
        self.contributes
            .as_ref()
            .and_then(|c| c.get("themes"))
            .is_some_and(|themes| !themes.is_null())
    }

    /// Synthesize a manifest for an installed package whose folder is unknown.
    #[must_use]
    pub fn for_installed(package: &InstalledPackage) -> Self {
        let (publisher, name) = package
            .id
            .split_once('.')
            .map_or((String::new(), package.id.clone()), |(p, n)| {
                (p.to_string(), n.to_string())
            });

        Self {
            name,
            publisher,
            version: package.version.clone(),
            display_name: package.display_name.clone(),
            description: package.description.clone(),
            contributes: None,
        }
    }
}

/// Why a package was reported by a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingReason {
    /// No package with the same id exists on the other side.
    Missing,
    /// A package with the same id exists, but with a different version.
    #[serde(rename = "version")]
    Outdated,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Outdated => write!(f, "outdated"),
        }
    }
}

/// A package reported by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPackage<P> {
    pub package: P,
    pub reason: MissingReason,
}

/// The external extension manifest (`extensions.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionManifest {
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versioned_folder() {
        let parsed = PackageIdentifier::parse("golf1052.test-1.0.0");
        assert_eq!(parsed.id, "golf1052.test");
        assert_eq!(parsed.version, "1.0.0");

        let parsed = PackageIdentifier::parse("golf1052.test-extension-0.0.1");
        assert_eq!(parsed.id, "golf1052.test-extension");
        assert_eq!(parsed.version, "0.0.1");
    }

    #[test]
    fn test_parse_unversioned_folder() {
        let parsed = PackageIdentifier::parse("test");
        assert_eq!(parsed.id, "test");
        assert_eq!(parsed.version, "");

        let parsed = PackageIdentifier::parse("golf1052.test-extension");
        assert_eq!(parsed.id, "golf1052.test-extension");
        assert_eq!(parsed.version, "");

        let parsed = PackageIdentifier::parse("");
        assert_eq!(parsed.id, "");
        assert_eq!(parsed.version, "");
    }

    #[test]
    fn test_parse_keeps_loose_heuristic() {
        let parsed = PackageIdentifier::parse("foo-1x1");
        assert_eq!(parsed.id, "foo");
        assert_eq!(parsed.version, "1x1");

        // Trailing dash: empty suffix is not a version
        let parsed = PackageIdentifier::parse("foo-");
        assert_eq!(parsed.id, "foo-");
        assert_eq!(parsed.version, "");

        let parsed = PackageIdentifier::parse("foo-1.0-beta");
        assert_eq!(parsed.id, "foo-1.0-beta");
        assert_eq!(parsed.version, "");
    }

    #[test]
    fn test_folder_name_reparses() {
        for name in ["golf1052.test-1.0.0", "test", "a-b-2", "pub.x-10.20.30"] {
            let parsed = PackageIdentifier::parse(name);
            assert_eq!(PackageIdentifier::parse(&parsed.folder_name()), parsed);
        }
    }

    #[test]
    fn test_package_json_theme_detection() {
        let manifest: PackageJson = serde_json::from_str(
            r#"{"name":"dark","publisher":"pub","version":"1.0.0",
                "contributes":{"themes":[{"label":"Dark"}]}}"#,
        )
        .unwrap();
        assert_eq!(manifest.id(), "pub.dark");
        assert!(manifest.is_theme());

        let manifest: PackageJson = serde_json::from_str(
            r#"{"name":"lint","publisher":"pub","version":"1.0.0","contributes":{"commands":[]}}"#,
        )
        .unwrap();
        assert!(!manifest.is_theme());
    }

    #[test]
    fn test_synthesized_manifest_splits_id() {
        let mut package = InstalledPackage::new("pub.tool", "2.1.0");
        package.display_name = Some("Tool".into());

        let manifest = PackageJson::for_installed(&package);
        assert_eq!(manifest.publisher, "pub");
        assert_eq!(manifest.name, "tool");
        assert_eq!(manifest.id(), "pub.tool");
        assert_eq!(package.label(), "Tool");
        assert_eq!(package.archive_folder_name(), "pub.tool-2.1.0");
    }
}
