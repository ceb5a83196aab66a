//! Domain layer - core sync types and rules.
//!
//! This layer contains pure domain models, version rules and the
//! collaborator interfaces, without touching the file system.

pub mod config;
pub mod error;
pub mod package;
pub mod ports;
pub mod sync;
pub mod version;

pub use config::{ExcludedPackages, SyncConfiguration, SyncToggle};
pub use error::{AppError, Result};
pub use package::{
    ArchivedPackage, ExtensionLocation, ExtensionManifest, InstalledPackage, MissingPackage,
    MissingReason, Package, PackageIdentifier, PackageJson,
};
pub use ports::{InstalledPackageSource, PackageManager, PickItem, UserPrompt};
pub use sync::{OutcomeStatus, SyncArtifact, SyncDirection, SyncPhase, SyncReport};
pub use version::{compare_versions, is_newer};
