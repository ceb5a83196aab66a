//! Sync orchestration.
//!
//! [`SyncOrchestrator`] owns the configuration and the collaborators for
//! one process and runs import/export cycles over the four artifacts.
//! Failures inside a cycle are logged and recorded in the report; they
//! never abort the remaining artifacts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::domain::{
    AppError, ExtensionLocation, InstalledPackageSource, OutcomeStatus, PackageManager, PickItem,
    Result, SyncArtifact, SyncConfiguration, SyncDirection, SyncPhase, SyncReport, SyncToggle,
    UserPrompt,
};
use crate::infrastructure::{
    fs_ops, load_manifest, save_manifest, ConfigStore, EditorPaths, WatchTarget,
};

use super::local_settings::LocalSettings;
use super::reconciler::{diff, missing_report, MissingReport, PackageArchive, ReconcileDirection};

/// Runs sync cycles with injected collaborators.
pub struct SyncOrchestrator {
    store: ConfigStore,
    paths: EditorPaths,
    installed: Box<dyn InstalledPackageSource>,
    manager: Box<dyn PackageManager>,
    prompt: Box<dyn UserPrompt>,
    config: Option<SyncConfiguration>,
    phase: SyncPhase,
    manager_reachable: Option<bool>,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        store: ConfigStore,
        paths: EditorPaths,
        installed: Box<dyn InstalledPackageSource>,
        manager: Box<dyn PackageManager>,
        prompt: Box<dyn UserPrompt>,
    ) -> Self {
        Self {
            store,
            paths,
            installed,
            manager,
            prompt,
            config: None,
            phase: SyncPhase::Idle,
            manager_reachable: None,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    #[must_use]
    pub const fn paths(&self) -> &EditorPaths {
        &self.paths
    }

    #[must_use]
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// The loaded configuration.
    ///
    /// # Errors
    /// Returns error if [`Self::check_configuration`] has not succeeded yet.
    pub fn config(&self) -> Result<&SyncConfiguration> {
        self.config.as_ref().ok_or_else(|| AppError::Config {
            message: "Configuration not loaded".to_string(),
        })
    }

    /// Load the configuration, creating it on first run.
    ///
    /// # Errors
    /// Returns error if the user cancels the first-run path prompt, or the
    /// configuration cannot be read or written.
    pub fn check_configuration(&mut self) -> Result<()> {
        self.phase = SyncPhase::CheckingConfiguration;
        let result = self.load_or_create();
        self.phase = SyncPhase::Idle;
        result
    }

    fn load_or_create(&mut self) -> Result<()> {
        let config = if self.store.exists() {
            self.store.load()?
        } else {
            tracing::info!(path = %self.store.settings_file().display(), "No configuration found, creating one");
            let default = SyncConfiguration::default_external_path();
            let answer = self
                .prompt
                .prompt_for_path(&default.display().to_string())
                .filter(|p| !p.trim().is_empty());

            let Some(path) = answer else {
                self.prompt
                    .warn("No external path given. Run `code-sync init` to configure one.");
                return Err(AppError::Config {
                    message: "No external path configured".to_string(),
                });
            };

            let config = SyncConfiguration::with_external_path(path.trim());
            self.store.save(&config)?;
            config
        };

        if config.external_path.as_os_str().is_empty() {
            return Err(AppError::Config {
                message: "externalPath is empty. Run `code-sync set-path` to configure one."
                    .to_string(),
            });
        }

        if let Some(dir) = config.settings_path_override() {
            self.paths.settings_dir = dir;
        }
        fs_ops::ensure_dir(&config.external_path)?;

        self.config = Some(config);
        Ok(())
    }

    fn ensure_loaded(&mut self) -> Result<SyncConfiguration> {
        if self.config.is_none() {
            self.check_configuration()?;
        }
        self.config().cloned()
    }

    fn save_config(&mut self, config: SyncConfiguration) -> Result<()> {
        self.store.save(&config)?;
        self.config = Some(config);
        Ok(())
    }

    /// Check configuration, then import everything if `autoImport` is on.
    ///
    /// # Errors
    /// Returns error if the configuration cannot be established.
    pub fn startup(&mut self) -> Result<Option<SyncReport>> {
        self.check_configuration()?;
        if self.config()?.auto_import {
            return self.import_all().map(Some);
        }
        Ok(None)
    }

    /// # Errors
    /// Returns error if the configuration cannot be established.
    pub fn import_all(&mut self) -> Result<SyncReport> {
        self.run(SyncDirection::Import, &SyncArtifact::ALL)
    }

    /// # Errors
    /// Returns error if the configuration cannot be established.
    pub fn export_all(&mut self) -> Result<SyncReport> {
        self.run(SyncDirection::Export, &SyncArtifact::ALL)
    }

    /// # Errors
    /// Returns error if the configuration cannot be established.
    pub fn import(&mut self, artifact: SyncArtifact) -> Result<SyncReport> {
        self.run(SyncDirection::Import, &[artifact])
    }

    /// # Errors
    /// Returns error if the configuration cannot be established.
    pub fn export(&mut self, artifact: SyncArtifact) -> Result<SyncReport> {
        self.run(SyncDirection::Export, &[artifact])
    }

    /// Run one cycle over `artifacts` in order.
    ///
    /// # Errors
    /// Returns error only if the configuration cannot be established;
    /// per-artifact failures are recorded in the report.
    pub fn run(&mut self, direction: SyncDirection, artifacts: &[SyncArtifact]) -> Result<SyncReport> {
        let config = self.ensure_loaded()?;
        let mut report = SyncReport::start(direction);

        for &artifact in artifacts {
            self.phase = SyncPhase::working(direction, artifact);
            tracing::debug!(phase = %self.phase, "Sync step started");

            let status = if !config.is_enabled(artifact) {
                OutcomeStatus::Disabled
            } else if artifact == SyncArtifact::Extensions && !self.manager_available() {
                OutcomeStatus::Unavailable
            } else {
                match self.sync_artifact(&config, direction, artifact, &mut report) {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::error!(%artifact, %direction, error = %e, "Sync step failed");
                        self.prompt
                            .warn(&format!("Failed to {direction} {artifact}: {e}"));
                        OutcomeStatus::Failed {
                            message: e.to_string(),
                        }
                    }
                }
            };

            tracing::info!(%artifact, %direction, outcome = %status, "Sync step finished");
            report.record(artifact, status);
        }

        self.phase = SyncPhase::Idle;
        Ok(report.finish())
    }

    fn manager_available(&mut self) -> bool {
        *self
            .manager_reachable
            .get_or_insert_with(|| self.manager.is_reachable())
    }

    fn sync_artifact(
        &mut self,
        config: &SyncConfiguration,
        direction: SyncDirection,
        artifact: SyncArtifact,
        report: &mut SyncReport,
    ) -> Result<OutcomeStatus> {
        let external = config.external_artifact_path(artifact);

        match (artifact, direction) {
            (SyncArtifact::Extensions, SyncDirection::Import) => {
                self.import_extensions(config, &external, report)
            }
            (SyncArtifact::Extensions, SyncDirection::Export) => {
                self.export_extensions(config, &external)
            }
            (SyncArtifact::Snippets, SyncDirection::Import) => {
                copy_snippets(&external, &self.paths.snippets_dir())
            }
            (SyncArtifact::Snippets, SyncDirection::Export) => {
                copy_snippets(&self.paths.snippets_dir(), &external)
            }
            (SyncArtifact::Settings, SyncDirection::Import) => {
                let internal = self.paths.user_settings_file();
                guarded(&external, || self.local_settings().import(&external, &internal))
            }
            (SyncArtifact::Settings, SyncDirection::Export) => {
                let internal = self.paths.user_settings_file();
                guarded(&internal, || self.local_settings().export(&internal, &external))
            }
            (SyncArtifact::Keybindings, SyncDirection::Import) => {
                let internal = self.paths.keybindings_file();
                guarded(&external, || fs_ops::copy_file(&external, &internal))
            }
            (SyncArtifact::Keybindings, SyncDirection::Export) => {
                let internal = self.paths.keybindings_file();
                guarded(&internal, || fs_ops::copy_file(&internal, &external))
            }
        }
    }

    fn local_settings(&self) -> LocalSettings {
        LocalSettings::new(self.store.local_settings_file())
    }

    fn import_extensions(
        &mut self,
        config: &SyncConfiguration,
        manifest_path: &Path,
        report: &mut SyncReport,
    ) -> Result<OutcomeStatus> {
        if !manifest_path.exists() {
            return Ok(OutcomeStatus::SourceMissing);
        }
        if fs_ops::is_blank_file(manifest_path) {
            return Ok(OutcomeStatus::EmptySource);
        }

        let manifest = load_manifest(manifest_path)?;
        let installed = self.installed.list_installed()?;
        let installed_ids: HashSet<&str> = installed.iter().map(|p| p.id.as_str()).collect();

        let mut changed = 0;
        for id in &manifest.extensions {
            if installed_ids.contains(id.as_str())
                || config.excluded.contains(ExtensionLocation::External, id)
            {
                continue;
            }
            if self.manager.install(id) {
                changed += 1;
            }
        }

        if changed > 0 {
            report.restart_required = true;
            self.prompt.notify("Restart required");
        }

        Ok(OutcomeStatus::synced(format!("{changed} installed")))
    }

    fn export_extensions(
        &mut self,
        config: &SyncConfiguration,
        manifest_path: &Path,
    ) -> Result<OutcomeStatus> {
        let installed = self.installed.list_installed()?;

        let excluded = &config.excluded.installed;
        let mut manifest = load_manifest(manifest_path).unwrap_or_default();
        manifest.extensions = installed
            .iter()
            .filter(|p| !excluded.contains(&p.id))
            .map(|p| p.id.clone())
            .collect();
        save_manifest(manifest_path, &manifest)?;

        let archive = PackageArchive::new(config.archive_dir());
        let archived = archive.snapshot(&installed)?;

        let mut saved = 0;
        for missing in diff(&installed, &archived, excluded) {
            if archive.save(&missing.package)? {
                saved += 1;
            }
        }
        archive.collapse_duplicates()?;
        archive.remove_orphans(&installed)?;

        Ok(OutcomeStatus::synced(format!(
            "{} listed, {saved} archived",
            manifest.extensions.len()
        )))
    }

    /// Diff the installed set against the archive for `direction`.
    ///
    /// Cleans the archive first (duplicates and orphans are removed).
    ///
    /// # Errors
    /// Returns error if either side cannot be listed or the archive cannot be cleaned.
    pub fn missing_packages(&mut self, direction: ReconcileDirection) -> Result<MissingReport> {
        let config = self.ensure_loaded()?;
        let installed = self.installed.list_installed()?;
        let archived = PackageArchive::new(config.archive_dir()).snapshot(&installed)?;
        Ok(missing_report(direction, &installed, &archived, &config.excluded))
    }

    /// Change the external folder.
    ///
    /// Uses `explicit` when given, otherwise prompts. Returns false when the
    /// answer is empty or cancelled; nothing is changed in that case.
    ///
    /// # Errors
    /// Returns error if the configuration cannot be read or written or the
    /// directory cannot be created.
    pub fn set_external_path(&mut self, explicit: Option<String>) -> Result<bool> {
        let mut config = if self.store.exists() {
            self.store.load()?
        } else {
            SyncConfiguration::default()
        };

        let current = if config.external_path.as_os_str().is_empty() {
            SyncConfiguration::default_external_path()
        } else {
            config.external_path.clone()
        };

        let answer = explicit.or_else(|| self.prompt.prompt_for_path(&current.display().to_string()));
        let Some(path) = answer.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) else {
            self.prompt.warn("No path given. External path unchanged.");
            return Ok(false);
        };

        config.external_path = PathBuf::from(&path);
        fs_ops::ensure_dir(&config.external_path)?;
        if let Some(dir) = config.settings_path_override() {
            self.paths.settings_dir = dir;
        }
        self.save_config(config)?;

        self.prompt.notify(&format!("External path set to {path}"));
        Ok(true)
    }

    /// Exclude a package on `location`, picking from candidates when `id` is `None`.
    ///
    /// # Errors
    /// Returns error if the configuration or package lists cannot be read or saved.
    pub fn add_exclusion(&mut self, location: ExtensionLocation, id: Option<String>) -> Result<bool> {
        let mut config = self.ensure_loaded()?;

        let id = match id {
            Some(id) => id,
            None => {
                let candidates = self.exclusion_candidates(&config, location)?;
                if candidates.is_empty() {
                    self.prompt
                        .notify(&format!("There are no {location} extensions."));
                    return Ok(false);
                }

                let items: Vec<PickItem> = candidates
                    .into_iter()
                    .filter(|item| !config.excluded.contains(location, &item.label))
                    .collect();
                if items.is_empty() {
                    self.prompt
                        .notify(&format!("All {location} extensions excluded."));
                    return Ok(false);
                }

                let title = format!("Exclude which {location} extension?");
                let picked = self.prompt.pick_one(&title, &items);
                let Some(item) = picked.and_then(|i| items.get(i)) else {
                    return Ok(false);
                };
                item.label.clone()
            }
        };

        if !config.excluded.exclude(location, id.clone()) {
            self.prompt.notify(&format!("Package {id} is already excluded."));
            return Ok(false);
        }

        self.save_config(config)?;
        self.prompt
            .notify(&format!("Successfully excluded package {id}"));
        Ok(true)
    }

    fn exclusion_candidates(
        &self,
        config: &SyncConfiguration,
        location: ExtensionLocation,
    ) -> Result<Vec<PickItem>> {
        match location {
            ExtensionLocation::Installed => Ok(self
                .installed
                .list_installed()?
                .into_iter()
                .map(|p| PickItem::new(p.id, p.description))
                .collect()),
            ExtensionLocation::External => {
                let manifest =
                    load_manifest(&config.external_artifact_path(SyncArtifact::Extensions))?;
                Ok(manifest
                    .extensions
                    .into_iter()
                    .map(|id| PickItem::new(id, None))
                    .collect())
            }
        }
    }

    /// Stop excluding a package on `location`, picking when `id` is `None`.
    ///
    /// # Errors
    /// Returns error if the configuration cannot be read or saved.
    pub fn remove_exclusion(
        &mut self,
        location: ExtensionLocation,
        id: Option<String>,
    ) -> Result<bool> {
        let mut config = self.ensure_loaded()?;

        if config.excluded.for_location(location).is_empty() {
            self.prompt
                .notify(&format!("No {location} extensions excluded."));
            return Ok(false);
        }

        let id = match id {
            Some(id) => id,
            None => {
                let items: Vec<PickItem> = config
                    .excluded
                    .for_location(location)
                    .iter()
                    .map(|id| PickItem::new(id.clone(), None))
                    .collect();
                let title = format!("Include which {location} extension again?");
                let picked = self.prompt.pick_one(&title, &items);
                let Some(item) = picked.and_then(|i| items.get(i)) else {
                    return Ok(false);
                };
                item.label.clone()
            }
        };

        if !config.excluded.include(location, &id) {
            self.prompt.notify(&format!("Package {id} is not excluded."));
            return Ok(false);
        }

        self.save_config(config)?;
        self.prompt
            .notify(&format!("Successfully included package {id}"));
        Ok(true)
    }

    /// Excluded ids on `location`, sorted.
    ///
    /// # Errors
    /// Returns error if the configuration cannot be loaded.
    pub fn exclusions(&mut self, location: ExtensionLocation) -> Result<Vec<String>> {
        let config = self.ensure_loaded()?;
        Ok(config.excluded.for_location(location).iter().cloned().collect())
    }

    /// Set a boolean option, prompting On/Off when `value` is `None`.
    ///
    /// Turning an artifact's flag off deletes that artifact from the
    /// external folder. Returns the new value, or `None` if cancelled.
    ///
    /// # Errors
    /// Returns error if the configuration cannot be saved or the artifact
    /// cannot be removed.
    pub fn toggle(&mut self, setting: SyncToggle, value: Option<bool>) -> Result<Option<bool>> {
        let mut config = self.ensure_loaded()?;

        let value = match value {
            Some(value) => value,
            None => {
                let current = setting.get(&config);
                let marker = |on: bool| (on == current).then(|| "Current setting".to_string());
                let items = [PickItem::new("On", marker(true)), PickItem::new("Off", marker(false))];
                let Some(index) = self.prompt.pick_one(&format!("Turn {setting} on or off"), &items) else {
                    return Ok(None);
                };
                index == 0
            }
        };

        setting.set(&mut config, value);
        if !value {
            if let Some(artifact) = setting.artifact() {
                let path = config.external_artifact_path(artifact);
                fs_ops::remove_path(&path)?;
                tracing::info!(%artifact, path = %path.display(), "Removed external artifact");
            }
        }

        self.save_config(config)?;
        Ok(Some(value))
    }

    /// React to a batch of settled changes: export each artifact the paths
    /// belong to, once, when `autoExport` is on.
    ///
    /// # Errors
    /// Returns error if the configuration cannot be reloaded.
    pub fn handle_changes(&mut self, paths: &[PathBuf]) -> Result<Option<SyncReport>> {
        if self.store.exists() {
            self.config = Some(self.store.load()?);
        }
        let config = self.ensure_loaded()?;

        if !config.auto_export {
            tracing::debug!(changes = paths.len(), "autoExport is off, ignoring changes");
            return Ok(None);
        }

        let mut artifacts: Vec<SyncArtifact> = Vec::new();
        for path in paths {
            match self.paths.artifact_for(path) {
                Some(artifact) if !artifacts.contains(&artifact) => artifacts.push(artifact),
                Some(_) => {}
                None => tracing::trace!(path = %path.display(), "Change outside synced files"),
            }
        }

        if artifacts.is_empty() {
            return Ok(None);
        }

        self.run(SyncDirection::Export, &artifacts).map(Some)
    }

    /// Directories the watcher observes.
    #[must_use]
    pub fn watch_targets(&self) -> Vec<WatchTarget> {
        vec![
            WatchTarget::new(self.paths.settings_dir.clone(), false),
            WatchTarget::new(self.paths.snippets_dir(), true),
        ]
    }

    /// Install an extension, re-exporting the extension list when `autoExport` is on.
    ///
    /// # Errors
    /// Returns error if the configuration cannot be loaded.
    pub fn install_extension(&mut self, id: &str) -> Result<bool> {
        self.change_extension(id, true)
    }

    /// Uninstall an extension, re-exporting the extension list when `autoExport` is on.
    ///
    /// # Errors
    /// Returns error if the configuration cannot be loaded.
    pub fn uninstall_extension(&mut self, id: &str) -> Result<bool> {
        self.change_extension(id, false)
    }

    fn change_extension(&mut self, id: &str, install: bool) -> Result<bool> {
        let config = self.ensure_loaded()?;

        if !self.manager_available() {
            return Err(AppError::PackageManager {
                message: "Editor executable is not reachable".to_string(),
            });
        }

        let changed = if install {
            self.manager.install(id)
        } else {
            self.manager.uninstall(id)
        };

        let verb = if install { "installed" } else { "uninstalled" };
        if changed {
            self.prompt.notify(&format!("Package {id} {verb}. Restart required"));
            if config.auto_export {
                self.export(SyncArtifact::Extensions)?;
            }
        } else {
            self.prompt.warn(&format!("Package {id} was not {verb}"));
        }

        Ok(changed)
    }
}

/// Run `copy` unless `source` is missing or blank.
fn guarded(source: &Path, copy: impl FnOnce() -> Result<()>) -> Result<OutcomeStatus> {
    if !source.exists() {
        return Ok(OutcomeStatus::SourceMissing);
    }
    if fs_ops::is_blank_file(source) {
        tracing::warn!(path = %source.display(), "Source is empty, leaving destination untouched");
        return Ok(OutcomeStatus::EmptySource);
    }
    copy()?;
    Ok(OutcomeStatus::synced(""))
}

fn copy_snippets(source: &Path, target: &Path) -> Result<OutcomeStatus> {
    if !source.is_dir() {
        return Ok(OutcomeStatus::SourceMissing);
    }
    if !fs_ops::has_content(source) {
        return Ok(OutcomeStatus::EmptySource);
    }
    let copied = fs_ops::copy_dir(source, target, true)?;
    Ok(OutcomeStatus::synced(format!("{copied} files")))
}
