//! Installed-extension scanner.
//!
//! Reads `package.json` from every folder of the editor's extensions
//! directory. Folders the editor has marked obsolete are skipped, and when
//! several versions of one extension remain on disk only the newest counts.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::domain::{
    compare_versions, AppError, InstalledPackage, InstalledPackageSource, PackageJson, Result,
};

use super::jsonc;

/// The editor's extensions directory.
#[derive(Debug, Clone)]
pub struct ExtensionsDirectory {
    root: PathBuf,
}

impl ExtensionsDirectory {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Folder names listed in `<root>/.obsolete`, pending removal by the editor.
    fn obsolete_folders(&self) -> HashSet<String> {
        let path = self.root.join(".obsolete");
        let Ok(content) = fs::read_to_string(&path) else {
            return HashSet::new();
        };

        match jsonc::from_str::<HashMap<String, Value>>(&content) {
            Ok(entries) => entries
                .into_iter()
                .filter(|(_, flag)| flag.as_bool() != Some(false))
                .map(|(folder, _)| folder)
                .collect(),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Malformed obsolete list");
                HashSet::new()
            }
        }
    }
}

/// Read `<dir>/package.json`. Unreadable or malformed manifests yield `None`.
#[must_use]
pub fn read_package_json(dir: &Path) -> Option<PackageJson> {
    let path = dir.join("package.json");
    let content = fs::read_to_string(&path).ok()?;

    match jsonc::from_str::<PackageJson>(&content) {
        Ok(manifest) if !manifest.name.is_empty() && !manifest.publisher.is_empty() => {
            Some(manifest)
        }
        Ok(_) => {
            tracing::debug!(path = %path.display(), "Manifest lacks publisher or name");
            None
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Malformed manifest");
            None
        }
    }
}

impl InstalledPackageSource for ExtensionsDirectory {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        if !self.root.exists() {
            tracing::info!(path = %self.root.display(), "Extensions directory does not exist");
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| {
            AppError::io(
                format!("Failed to read extensions directory {}", self.root.display()),
                e,
            )
        })?;

        let obsolete = self.obsolete_folders();

        let mut newest: BTreeMap<String, InstalledPackage> = BTreeMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if obsolete.contains(entry.file_name().to_string_lossy().as_ref()) {
                tracing::trace!(path = %path.display(), "Skipping obsolete extension");
                continue;
            }
            let Some(manifest) = read_package_json(&path) else {
                continue;
            };

            let package = InstalledPackage::from_manifest(&manifest, path);
            let keep = match newest.get(&package.id) {
                Some(kept) => {
                    let order =
                        compare_versions(Some(package.version.as_str()), Some(kept.version.as_str()));
                    order == Ordering::Greater
                }
                None => true,
            };
            if keep {
                newest.insert(package.id.clone(), package);
            }
        }

        let packages: Vec<InstalledPackage> = newest.into_values().collect();
        tracing::debug!(count = packages.len(), "Scanned installed extensions");

        Ok(packages)
    }
}
