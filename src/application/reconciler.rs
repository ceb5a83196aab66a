//! Extension reconciliation.
//!
//! Compares the installed extension set against the archive of extension
//! metadata kept in the external folder, and keeps that archive tidy: one
//! folder per id at the newest version, and nothing for extensions that are
//! no longer installed.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::domain::{
    is_newer, AppError, ArchivedPackage, ExcludedPackages, ExtensionLocation, InstalledPackage,
    MissingPackage, MissingReason, Package, PackageIdentifier, PackageJson, Result,
};
use crate::infrastructure::{fs_ops, jsonc, read_package_json};

/// Which side a diff reports as lacking packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileDirection {
    /// Installed packages not reflected in the archive.
    MissingFromExternal,
    /// Archived packages not reflected in the installed set.
    MissingFromInstalled,
}

impl ReconcileDirection {
    pub const ALL: [Self; 2] = [Self::MissingFromExternal, Self::MissingFromInstalled];

    /// The exclusion list consulted for this direction.
    #[must_use]
    pub const fn exclusion_location(self) -> ExtensionLocation {
        match self {
            Self::MissingFromExternal => ExtensionLocation::Installed,
            Self::MissingFromInstalled => ExtensionLocation::External,
        }
    }
}

impl fmt::Display for ReconcileDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFromExternal => write!(f, "missing from external"),
            Self::MissingFromInstalled => write!(f, "missing from installed"),
        }
    }
}

/// Report packages of `primary` that `reference` lacks or has at another version.
///
/// A reference entry with the same id and version is consumed by the first
/// primary package it matches. A version mismatch does not consume it, so
/// scanning continues and a later exact match still wins. Ids in `excluded`
/// are never reported.
#[must_use]
pub fn diff<P, R>(primary: &[P], reference: &[R], excluded: &BTreeSet<String>) -> Vec<MissingPackage<P>>
where
    P: Package + Clone,
    R: Package,
{
    let mut remaining: Vec<&R> = reference.iter().collect();
    let mut missing = Vec::new();

    for package in primary {
        let mut reason = Some(MissingReason::Missing);

        let matched = remaining.iter().position(|candidate| {
            if candidate.id() != package.id() {
                return false;
            }
            if candidate.version() == package.version() {
                return true;
            }
            reason = Some(MissingReason::Outdated);
            false
        });

        if let Some(index) = matched {
            remaining.remove(index);
            reason = None;
        }

        match reason {
            Some(reason) if !excluded.contains(package.id()) => missing.push(MissingPackage {
                package: package.clone(),
                reason,
            }),
            _ => {}
        }
    }

    missing
}

/// One line of a [`MissingReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingEntry {
    pub id: String,
    pub version: String,
    pub label: String,
    pub reason: MissingReason,
}

impl<P: Package> From<&MissingPackage<P>> for MissingEntry {
    fn from(missing: &MissingPackage<P>) -> Self {
        Self {
            id: missing.package.id().to_string(),
            version: missing.package.version().to_string(),
            label: missing.package.label().to_string(),
            reason: missing.reason,
        }
    }
}

/// Diff result for one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingReport {
    pub direction: ReconcileDirection,
    pub entries: Vec<MissingEntry>,
}

/// Run the diff for `direction` over one snapshot of both sides.
#[must_use]
pub fn missing_report(
    direction: ReconcileDirection,
    installed: &[InstalledPackage],
    archived: &[ArchivedPackage],
    excluded: &ExcludedPackages,
) -> MissingReport {
    let exclusions = excluded.for_location(direction.exclusion_location());
    let entries = match direction {
        ReconcileDirection::MissingFromExternal => diff(installed, archived, exclusions)
            .iter()
            .map(MissingEntry::from)
            .collect(),
        ReconcileDirection::MissingFromInstalled => diff(archived, installed, exclusions)
            .iter()
            .map(MissingEntry::from)
            .collect(),
    };

    MissingReport { direction, entries }
}

/// The archive folder inside the external path.
#[derive(Debug, Clone)]
pub struct PackageArchive {
    root: PathBuf,
}

impl PackageArchive {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Names of the package folders, sorted.
    ///
    /// # Errors
    /// Returns error if the archive exists but cannot be listed.
    pub fn folder_names(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| {
            AppError::io(format!("Failed to read archive {}", self.root.display()), e)
        })?;

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Keep only the newest folder per id. Returns the removed folder names.
    ///
    /// # Errors
    /// Returns error if the archive cannot be listed or a folder cannot be removed.
    pub fn collapse_duplicates(&self) -> Result<Vec<String>> {
        let mut newest: HashMap<String, PackageIdentifier> = HashMap::new();
        let mut removed = Vec::new();

        for name in self.folder_names()? {
            let parsed = PackageIdentifier::parse(&name);

            let loser = match newest.get(&parsed.id) {
                None => {
                    newest.insert(parsed.id.clone(), parsed);
                    continue;
                }
                Some(kept) if is_newer(&parsed.version, &kept.version) => {
                    let loser = kept.folder_name();
                    newest.insert(parsed.id.clone(), parsed);
                    loser
                }
                Some(_) => name,
            };

            fs_ops::remove_path(&self.root.join(&loser))?;
            tracing::info!(folder = %loser, "Removed duplicate archived extension");
            removed.push(loser);
        }

        Ok(removed)
    }

    /// Remove folders whose id is not installed. Returns the removed folder names.
    ///
    /// # Errors
    /// Returns error if the archive cannot be listed or a folder cannot be removed.
    pub fn remove_orphans(&self, installed: &[InstalledPackage]) -> Result<Vec<String>> {
        let installed_ids: HashSet<&str> = installed.iter().map(|p| p.id.as_str()).collect();
        let mut removed = Vec::new();

        for name in self.folder_names()? {
            let id = self
                .load(&name)
                .map_or_else(|| PackageIdentifier::parse(&name).id, |p| p.id);

            if !installed_ids.contains(id.as_str()) {
                fs_ops::remove_path(&self.root.join(&name))?;
                tracing::info!(folder = %name, id = %id, "Removed archived extension that is no longer installed");
                removed.push(name);
            }
        }

        Ok(removed)
    }

    /// Load one archived package. Malformed or incomplete entries yield `None`.
    #[must_use]
    pub fn load(&self, folder_name: &str) -> Option<ArchivedPackage> {
        let dir = self.root.join(folder_name);
        let manifest = read_package_json(&dir)?;
        Some(ArchivedPackage::from_manifest(&manifest, dir))
    }

    /// All loadable archived packages, without any cleanup.
    ///
    /// # Errors
    /// Returns error if the archive cannot be listed.
    pub fn list(&self) -> Result<Vec<ArchivedPackage>> {
        Ok(self
            .folder_names()?
            .iter()
            .filter_map(|name| self.load(name))
            .collect())
    }

    /// Clean the archive against `installed`, then list it.
    ///
    /// # Errors
    /// Returns error if the archive cannot be listed or cleaned.
    pub fn snapshot(&self, installed: &[InstalledPackage]) -> Result<Vec<ArchivedPackage>> {
        self.collapse_duplicates()?;
        self.remove_orphans(installed)?;
        self.list()
    }

    /// Archive an installed package as `<id>-<version>`.
    ///
    /// Themes are copied whole; anything else contributes only its
    /// `package.json`. Returns false when the same version is already archived.
    ///
    /// # Errors
    /// Returns error if the folder cannot be created or the copy fails.
    pub fn save(&self, package: &InstalledPackage) -> Result<bool> {
        let target = self.root.join(package.archive_folder_name());

        if let Some(existing) = read_package_json(&target) {
            if existing.version == package.version {
                tracing::debug!(id = %package.id, version = %package.version, "Already archived");
                return Ok(false);
            }
        }

        fs_ops::ensure_dir(&target)?;

        match package.path.as_deref() {
            Some(source) if package.is_theme => {
                fs_ops::copy_dir(source, &target, false)?;
            }
            Some(source) if source.join("package.json").is_file() => {
                fs_ops::copy_file(&source.join("package.json"), &target.join("package.json"))?;
            }
            _ => {
                let manifest = PackageJson::for_installed(package);
                let mut content = jsonc::to_pretty_string(&manifest)?;
                content.push('\n');
                fs_ops::write_file(&target.join("package.json"), &content)?;
            }
        }

        tracing::info!(id = %package.id, version = %package.version, theme = package.is_theme, "Archived extension");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn installed(id: &str, version: &str) -> InstalledPackage {
        InstalledPackage::new(id, version)
    }

    fn write_archived(root: &Path, folder: &str, publisher: &str, name: &str, version: &str) {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("package.json"),
            format!(r#"{{"name":"{name}","publisher":"{publisher}","version":"{version}"}}"#),
        )
        .unwrap();
    }

    fn excluded(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_diff_reports_missing_and_outdated() {
        let primary = vec![
            installed("pub.a", "1.0.0"),
            installed("pub.b", "2.0.0"),
            installed("pub.c", "1.0.0"),
        ];
        let reference = vec![installed("pub.a", "1.0.0"), installed("pub.b", "1.0.0")];

        let missing = diff(&primary, &reference, &BTreeSet::new());
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].package.id, "pub.b");
        assert_eq!(missing[0].reason, MissingReason::Outdated);
        assert_eq!(missing[1].package.id, "pub.c");
        assert_eq!(missing[1].reason, MissingReason::Missing);
    }

    #[test]
    fn test_diff_exact_match_consumes_reference() {
        let reference = vec![installed("pub.a", "2.0.0")];

        // Outdated match does not consume; the later exact match does
        let primary = vec![installed("pub.a", "1.0.0"), installed("pub.a", "2.0.0")];
        let missing = diff(&primary, &reference, &BTreeSet::new());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].package.version, "1.0.0");
        assert_eq!(missing[0].reason, MissingReason::Outdated);

        // An exact match is used up after the first primary package
        let primary = vec![installed("pub.a", "2.0.0"), installed("pub.a", "2.0.0")];
        let missing = diff(&primary, &reference, &BTreeSet::new());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].reason, MissingReason::Missing);
    }

    #[test]
    fn test_diff_skips_excluded_ids() {
        let primary = vec![installed("pub.a", "1.0.0"), installed("pub.b", "1.0.0")];
        let reference = vec![installed("pub.b", "0.9.0")];

        let missing = diff(&primary, &reference, &excluded(&["pub.a", "pub.b"]));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_exclusions_follow_direction() {
        let dir = tempdir().unwrap();
        write_archived(dir.path(), "pub.ext-1.0.0", "pub", "ext", "1.0.0");
        let archived = PackageArchive::new(dir.path()).list().unwrap();
        let installed_set = vec![installed("pub.local", "1.0.0")];

        let mut exclusions = ExcludedPackages::default();
        exclusions.exclude(ExtensionLocation::Installed, "pub.local");
        exclusions.exclude(ExtensionLocation::External, "pub.ext");

        for direction in ReconcileDirection::ALL {
            let report = missing_report(direction, &installed_set, &archived, &exclusions);
            assert!(report.entries.is_empty(), "{direction}");
        }
    }

    #[test]
    fn test_matched_pair_never_reported_in_either_direction() {
        let dir = tempdir().unwrap();
        write_archived(dir.path(), "pub.a-1.0.0", "pub", "a", "1.0.0");
        write_archived(dir.path(), "pub.b-1.0.0", "pub", "b", "1.0.0");
        let archived = PackageArchive::new(dir.path()).list().unwrap();
        let installed_set = vec![installed("pub.a", "1.0.0"), installed("pub.c", "3.0.0")];
        let none = ExcludedPackages::default();

        let to_external = missing_report(
            ReconcileDirection::MissingFromExternal,
            &installed_set,
            &archived,
            &none,
        );
        let to_installed = missing_report(
            ReconcileDirection::MissingFromInstalled,
            &installed_set,
            &archived,
            &none,
        );

        let ids = |r: &MissingReport| r.entries.iter().map(|e| e.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&to_external), ["pub.c"]);
        assert_eq!(ids(&to_installed), ["pub.b"]);
    }

    #[test]
    fn test_collapse_keeps_highest_version() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("golf1052.test-1.0.0")).unwrap();
        fs::create_dir(dir.path().join("golf1052.test-2.0.0")).unwrap();
        fs::create_dir(dir.path().join("other.pkg-0.1.0")).unwrap();

        let archive = PackageArchive::new(dir.path());
        let removed = archive.collapse_duplicates().unwrap();

        assert_eq!(removed, ["golf1052.test-1.0.0"]);
        assert_eq!(
            archive.folder_names().unwrap(),
            ["golf1052.test-2.0.0", "other.pkg-0.1.0"]
        );
    }

    #[test]
    fn test_collapse_removes_lower_and_equal_versions() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("pub.a-1.0")).unwrap();
        fs::create_dir(dir.path().join("pub.a-1.0.0")).unwrap();
        fs::create_dir(dir.path().join("pub.a-10.0.0")).unwrap();
        fs::create_dir(dir.path().join("pub.a-9.0.0")).unwrap();

        let archive = PackageArchive::new(dir.path());
        archive.collapse_duplicates().unwrap();
        assert_eq!(archive.folder_names().unwrap(), ["pub.a-10.0.0"]);
    }

    #[test]
    fn test_remove_orphans_uses_manifest_id_then_folder_name() {
        let dir = tempdir().unwrap();
        // Folder name disagrees with the manifest; the manifest wins
        write_archived(dir.path(), "renamed-1.0.0", "pub", "kept", "1.0.0");
        write_archived(dir.path(), "pub.gone-1.0.0", "pub", "gone", "1.0.0");
        // No manifest: the folder name decides
        fs::create_dir(dir.path().join("pub.bare-2.0.0")).unwrap();

        let archive = PackageArchive::new(dir.path());
        let removed = archive
            .remove_orphans(&[installed("pub.kept", "9.9.9"), installed("pub.bare", "1.0.0")])
            .unwrap();

        assert_eq!(removed, ["pub.gone-1.0.0"]);
        assert_eq!(archive.folder_names().unwrap(), ["pub.bare-2.0.0", "renamed-1.0.0"]);
    }

    #[test]
    fn test_malformed_entry_is_absent() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("pub.x-1.0.0");
        fs::create_dir(&broken).unwrap();
        fs::write(broken.join("package.json"), "{ nope").unwrap();
        fs::write(dir.path().join("stray.txt"), "not a folder").unwrap();

        let archive = PackageArchive::new(dir.path());
        assert!(archive.load("pub.x-1.0.0").is_none());
        assert!(archive.list().unwrap().is_empty());
        assert_eq!(archive.folder_names().unwrap(), ["pub.x-1.0.0"]);
    }

    #[test]
    fn test_save_theme_copies_folder() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let ext_dir = src.path().join("pub.dark-1.0.0");
        fs::create_dir_all(ext_dir.join("themes")).unwrap();
        fs::write(
            ext_dir.join("package.json"),
            r#"{"name":"dark","publisher":"pub","version":"1.0.0","contributes":{"themes":[]}}"#,
        )
        .unwrap();
        fs::write(ext_dir.join("themes").join("dark.json"), "{}").unwrap();

        let manifest = read_package_json(&ext_dir).unwrap();
        let package = InstalledPackage::from_manifest(&manifest, ext_dir);

        let archive = PackageArchive::new(dst.path());
        assert!(archive.save(&package).unwrap());
        assert!(dst
            .path()
            .join("pub.dark-1.0.0")
            .join("themes")
            .join("dark.json")
            .exists());
        assert!(!archive.save(&package).unwrap());
    }

    #[test]
    fn test_save_non_theme_copies_manifest_only() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let ext_dir = src.path().join("pub.tool-0.2.0");
        fs::create_dir_all(&ext_dir).unwrap();
        fs::write(
            ext_dir.join("package.json"),
            r#"{"name":"tool","publisher":"pub","version":"0.2.0"}"#,
        )
        .unwrap();
        fs::write(ext_dir.join("extension.js"), "module.exports = {}").unwrap();

        let manifest = read_package_json(&ext_dir).unwrap();
        let package = InstalledPackage::from_manifest(&manifest, ext_dir);

        let archive = PackageArchive::new(dst.path());
        archive.save(&package).unwrap();
        let target = dst.path().join("pub.tool-0.2.0");
        assert!(target.join("package.json").exists());
        assert!(!target.join("extension.js").exists());
    }

    #[test]
    fn test_save_synthesizes_manifest_without_source() {
        let dst = tempdir().unwrap();
        let archive = PackageArchive::new(dst.path());
        archive.save(&installed("pub.a", "1.0.0")).unwrap();

        let loaded = archive.load("pub.a-1.0.0").unwrap();
        assert_eq!(loaded.id, "pub.a");
        assert_eq!(loaded.version, "1.0.0");
    }
}
