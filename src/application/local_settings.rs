//! Machine-local settings overlay.
//!
//! Keys listed in `local-settings.json` stay on this machine: they are
//! stripped from the settings written to the external folder and layered
//! back on top of the portable settings on import.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::domain::{AppError, Result};
use crate::infrastructure::{fs_ops, jsonc, JsoncDocument};

/// The local overrides file and the import/export steps that honour it.
#[derive(Debug, Clone)]
pub struct LocalSettings {
    path: PathBuf,
}

impl LocalSettings {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the overrides. A missing or blank file means no overrides.
    ///
    /// # Errors
    /// Returns error if the file exists but is not a JSON object.
    pub fn overrides(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs_ops::read_file(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match jsonc::parse_value(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::InvalidData {
                message: format!("{} must contain a JSON object", self.path.display()),
            }),
        }
    }

    /// Copy portable settings from `external` to `internal`, overlaying local keys.
    ///
    /// # Errors
    /// Returns error if either settings file cannot be read, parsed or written.
    pub fn import(&self, external: &Path, internal: &Path) -> Result<()> {
        let mut settings = JsoncDocument::parse(&fs_ops::read_file(external)?)?;

        let overrides = self.overrides()?;
        for (key, value) in &overrides {
            settings.set(key, value)?;
        }

        fs_ops::write_file(internal, &settings.render())?;
        tracing::info!(
            from = %external.display(),
            to = %internal.display(),
            overrides = overrides.len(),
            "Settings imported"
        );
        Ok(())
    }

    /// Copy settings from `internal` to `external`, leaving out local keys.
    ///
    /// Creates an empty overrides file on first export.
    ///
    /// # Errors
    /// Returns error if either settings file cannot be read, parsed or written.
    pub fn export(&self, internal: &Path, external: &Path) -> Result<()> {
        let mut settings = JsoncDocument::parse(&fs_ops::read_file(internal)?)?;

        if !self.path.exists() {
            fs_ops::write_file(&self.path, "{}\n")?;
            tracing::info!(path = %self.path.display(), "Created empty local settings");
        }

        let overrides = self.overrides()?;
        let stripped = overrides.keys().filter(|key| settings.remove(key)).count();

        fs_ops::write_file(external, &settings.render())?;
        tracing::info!(
            from = %internal.display(),
            to = %external.display(),
            stripped,
            "Settings exported"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        local: LocalSettings,
        internal: PathBuf,
        external: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let local = LocalSettings::new(dir.path().join("data").join("local-settings.json"));
        let internal = dir.path().join("User").join("settings.json");
        let external = dir.path().join("sync").join("settings.json");
        Fixture {
            local,
            internal,
            external,
            _dir: dir,
        }
    }

    fn read_json(path: &Path) -> Value {
        jsonc::parse_value(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip_without_overrides_is_unchanged() {
        let f = fixture();
        let original = "{\n    // theme\n    \"workbench.colorTheme\": \"Dark\",\n    \"editor.tabSize\": 4\n}\n";
        fs_ops::write_file(&f.internal, original).unwrap();

        f.local.export(&f.internal, &f.external).unwrap();
        assert!(f.local.path().exists());
        assert_eq!(fs::read_to_string(&f.external).unwrap(), original);

        f.local.import(&f.external, &f.internal).unwrap();
        assert_eq!(fs::read_to_string(&f.internal).unwrap(), original);
    }

    #[test]
    fn test_local_value_wins_on_import() {
        let f = fixture();
        fs_ops::write_file(f.local.path(), "{ \"X\": true }").unwrap();
        fs_ops::write_file(&f.internal, "{\n    \"X\": true,\n    \"Y\": 1\n}\n").unwrap();

        f.local.export(&f.internal, &f.external).unwrap();
        let exported = read_json(&f.external);
        assert_eq!(exported, json!({"Y": 1}));

        // Another machine pushed a different value for the local key
        fs_ops::write_file(&f.external, "{\n    \"X\": false,\n    \"Y\": 2\n}\n").unwrap();
        f.local.import(&f.external, &f.internal).unwrap();
        assert_eq!(read_json(&f.internal), json!({"X": true, "Y": 2}));

        // And when it is absent from the portable file entirely
        fs_ops::write_file(&f.external, "{\n    \"Y\": 3\n}\n").unwrap();
        f.local.import(&f.external, &f.internal).unwrap();
        assert_eq!(read_json(&f.internal), json!({"X": true, "Y": 3}));
    }

    #[test]
    fn test_export_keeps_comments_of_remaining_keys() {
        let f = fixture();
        fs_ops::write_file(f.local.path(), "{\n    // this machine only\n    \"window.zoomLevel\": 2\n}").unwrap();
        fs_ops::write_file(
            &f.internal,
            "{\n    // fonts\n    \"editor.fontSize\": 13,\n    \"window.zoomLevel\": 2\n}\n",
        )
        .unwrap();

        f.local.export(&f.internal, &f.external).unwrap();
        assert_eq!(
            fs::read_to_string(&f.external).unwrap(),
            "{\n    // fonts\n    \"editor.fontSize\": 13\n}\n"
        );
    }

    #[test]
    fn test_blank_overrides_file_means_none() {
        let f = fixture();
        fs_ops::write_file(f.local.path(), "  \n").unwrap();
        assert!(f.local.overrides().unwrap().is_empty());

        fs_ops::write_file(f.local.path(), "[1]").unwrap();
        assert!(f.local.overrides().is_err());
    }
}
