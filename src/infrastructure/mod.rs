//! Infrastructure layer - external adapters (filesystem, editor, terminal).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod editor_cli;
pub mod editor_paths;
pub mod extensions_dir;
pub mod fs_ops;
pub mod jsonc;
pub mod prompt;
pub mod watcher;

pub use config::{load_manifest, save_manifest, ConfigStore};
pub use editor_cli::{EditorCli, DEFAULT_TIMEOUT};
pub use editor_paths::{executable, EditorFlavor, EditorPaths};
pub use extensions_dir::{read_package_json, ExtensionsDirectory};
pub use jsonc::JsoncDocument;
pub use prompt::TerminalPrompt;
pub use watcher::{ChangeWatcher, WatchTarget, DEFAULT_STABILITY_WINDOW};
