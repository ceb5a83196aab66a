//! Interfaces to the collaborators the sync core depends on.
//!
//! The orchestrator receives these as trait objects so it can be driven by
//! the real editor executable and terminal in the binary, and by fakes in
//! tests.

use super::error::Result;
use super::package::InstalledPackage;

/// Lists the packages present in the editor's extension directory.
pub trait InstalledPackageSource {
    /// # Errors
    ///
    /// Returns an error if the extension directory cannot be read.
    fn list_installed(&self) -> Result<Vec<InstalledPackage>>;
}

/// Installs and removes extensions through the editor executable.
///
/// Every call blocks until the executable exits. Failures are logged by
/// the implementation and reported as "no change".
pub trait PackageManager {
    /// Returns true if the install changed the installed set.
    fn install(&self, id: &str) -> bool;

    /// Returns true if the uninstall changed the installed set.
    fn uninstall(&self, id: &str) -> bool;

    /// Whether the executable can be invoked at all.
    fn is_reachable(&self) -> bool;
}

/// One entry offered by [`UserPrompt::pick_one`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickItem {
    pub label: String,
    pub description: Option<String>,
}

impl PickItem {
    #[must_use]
    pub fn new(label: impl Into<String>, description: Option<String>) -> Self {
        Self {
            label: label.into(),
            description,
        }
    }
}

/// Interaction with the user.
pub trait UserPrompt {
    /// Ask for a directory; `None` means the user cancelled.
    fn prompt_for_path(&mut self, default: &str) -> Option<String>;

    /// Informational message.
    fn notify(&mut self, message: &str);

    /// Non-blocking warning.
    fn warn(&mut self, message: &str);

    /// Let the user choose one item; returns its index, or `None` if cancelled.
    fn pick_one(&mut self, title: &str, items: &[PickItem]) -> Option<usize>;
}
