//! Editor installation path discovery.
//!
//! Locates the user settings folder, the extensions folder and the
//! command-line executable for the stable and insiders builds.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::domain::{AppError, Result, SyncArtifact};

/// Which editor build to sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorFlavor {
    #[default]
    Stable,
    Insiders,
}

impl EditorFlavor {
    /// Product folder under the platform config directory.
    #[must_use]
    pub const fn product_dir(self) -> &'static str {
        match self {
            Self::Stable => "Code",
            Self::Insiders => "Code - Insiders",
        }
    }

    /// Dot folder in the home directory holding extensions.
    #[must_use]
    pub const fn home_dir_name(self) -> &'static str {
        match self {
            Self::Stable => ".vscode",
            Self::Insiders => ".vscode-insiders",
        }
    }

    /// Default executable name.
    #[must_use]
    pub const fn executable_name(self) -> &'static str {
        match self {
            Self::Stable => "code",
            Self::Insiders => "code-insiders",
        }
    }
}

/// Resolved editor locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorPaths {
    pub settings_dir: PathBuf,
    pub extensions_dir: PathBuf,
}

impl EditorPaths {
    #[must_use]
    pub fn new(settings_dir: impl Into<PathBuf>, extensions_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings_dir: settings_dir.into(),
            extensions_dir: extensions_dir.into(),
        }
    }

    /// Platform defaults for `flavor`, with an optional settings folder override.
    ///
    /// # Errors
    /// Returns error if the home or config directory cannot be determined.
    pub fn detect(flavor: EditorFlavor, settings_override: Option<PathBuf>) -> Result<Self> {
        let settings_dir = match settings_override {
            Some(dir) => dir,
            None => default_settings_dir(flavor).ok_or_else(|| AppError::Config {
                message: "Could not determine the platform config directory".to_string(),
            })?,
        };

        let extensions_dir = default_extensions_dir(flavor).ok_or_else(|| AppError::Config {
            message: "Could not determine the home directory".to_string(),
        })?;

        tracing::debug!(
            settings = %settings_dir.display(),
            extensions = %extensions_dir.display(),
            "Resolved editor paths"
        );

        Ok(Self::new(settings_dir, extensions_dir))
    }

    #[must_use]
    pub fn user_settings_file(&self) -> PathBuf {
        self.settings_dir.join(SyncArtifact::Settings.file_name())
    }

    #[must_use]
    pub fn keybindings_file(&self) -> PathBuf {
        self.settings_dir.join(SyncArtifact::Keybindings.file_name())
    }

    #[must_use]
    pub fn snippets_dir(&self) -> PathBuf {
        self.settings_dir.join(SyncArtifact::Snippets.file_name())
    }

    /// Location of a file-based artifact in the profile. Extensions have none.
    #[must_use]
    pub fn artifact_path(&self, artifact: SyncArtifact) -> Option<PathBuf> {
        match artifact {
            SyncArtifact::Settings => Some(self.user_settings_file()),
            SyncArtifact::Keybindings => Some(self.keybindings_file()),
            SyncArtifact::Snippets => Some(self.snippets_dir()),
            SyncArtifact::Extensions => None,
        }
    }

    /// The file-based artifact a changed path belongs to.
    #[must_use]
    pub fn artifact_for(&self, changed: &Path) -> Option<SyncArtifact> {
        if changed == self.user_settings_file() {
            Some(SyncArtifact::Settings)
        } else if changed == self.keybindings_file() {
            Some(SyncArtifact::Keybindings)
        } else if changed.starts_with(self.snippets_dir()) {
            Some(SyncArtifact::Snippets)
        } else {
            None
        }
    }
}

/// `<config dir>/<product>/User`.
#[must_use]
pub fn default_settings_dir(flavor: EditorFlavor) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(flavor.product_dir()).join("User"))
}

/// `~/.vscode/extensions` or the insiders equivalent.
#[must_use]
pub fn default_extensions_dir(flavor: EditorFlavor) -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(flavor.home_dir_name()).join("extensions"))
}

/// Executable to invoke for package management.
#[must_use]
pub fn executable(flavor: EditorFlavor, name_override: Option<&str>) -> PathBuf {
    let snap = if cfg!(target_os = "linux") {
        std::env::var_os("SNAP")
    } else {
        None
    };
    resolve_executable(flavor, name_override, snap)
}

fn resolve_executable(
    flavor: EditorFlavor,
    name_override: Option<&str>,
    snap: Option<OsString>,
) -> PathBuf {
    let name = name_override.unwrap_or_else(|| flavor.executable_name());

    match snap.filter(|s| !s.is_empty()) {
        Some(root) => PathBuf::from(root)
            .join("usr")
            .join("share")
            .join("code")
            .join("bin")
            .join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_names() {
        assert_eq!(EditorFlavor::Stable.product_dir(), "Code");
        assert_eq!(EditorFlavor::Insiders.product_dir(), "Code - Insiders");
        assert_eq!(EditorFlavor::Insiders.home_dir_name(), ".vscode-insiders");
        assert_eq!(EditorFlavor::Stable.executable_name(), "code");
    }

    #[test]
    fn test_settings_override() {
        let paths = EditorPaths::detect(EditorFlavor::Stable, Some(PathBuf::from("/custom/User")));
        // Home may be unavailable in sandboxed test runs
        if let Ok(paths) = paths {
            assert_eq!(paths.user_settings_file(), PathBuf::from("/custom/User/settings.json"));
            assert_eq!(paths.snippets_dir(), PathBuf::from("/custom/User/snippets"));
            assert!(paths.extensions_dir.ends_with(".vscode/extensions"));
        }
    }

    #[test]
    fn test_artifact_for_changed_path() {
        let paths = EditorPaths::new("/u", "/e");
        assert_eq!(
            paths.artifact_for(Path::new("/u/settings.json")),
            Some(SyncArtifact::Settings)
        );
        assert_eq!(
            paths.artifact_for(Path::new("/u/keybindings.json")),
            Some(SyncArtifact::Keybindings)
        );
        assert_eq!(
            paths.artifact_for(Path::new("/u/snippets/nested/rust.json")),
            Some(SyncArtifact::Snippets)
        );
        assert_eq!(paths.artifact_for(Path::new("/u/tasks.json")), None);
        assert_eq!(paths.artifact_path(SyncArtifact::Extensions), None);
    }

    #[test]
    fn test_executable_resolution() {
        assert_eq!(
            resolve_executable(EditorFlavor::Insiders, None, None),
            PathBuf::from("code-insiders")
        );
        assert_eq!(
            resolve_executable(EditorFlavor::Stable, Some("codium"), None),
            PathBuf::from("codium")
        );
        assert_eq!(
            resolve_executable(EditorFlavor::Stable, None, Some(OsString::from("/snap/code/1"))),
            PathBuf::from("/snap/code/1/usr/share/code/bin/code")
        );
    }
}
