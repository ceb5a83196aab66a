//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;
use crate::domain::{ExtensionLocation, SyncArtifact, SyncToggle};

/// code-sync - Keep editor settings, keybindings, snippets and extensions
/// in sync through a shared folder.
///
/// Typical use: code-sync init ~/Dropbox/code-sync | export | import | watch
#[derive(Parser, Debug)]
#[command(name = "code-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format: table or json.
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Directory holding code-sync's own configuration.
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Target the Insiders build of the editor.
    #[arg(long, global = true)]
    pub insiders: bool,

    /// Never prompt; use defaults and cancel picks.
    #[arg(short = 'y', long, global = true)]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the configuration (prompts for the external folder if PATH is omitted).
    Init {
        /// External folder to sync through.
        path: Option<String>,
    },

    /// Change the external folder.
    SetPath {
        /// New external folder (prompted if omitted).
        path: Option<String>,
    },

    /// Copy artifacts from the external folder into the editor.
    Import {
        /// settings, keybindings, snippets or extensions (all if omitted).
        artifact: Option<SyncArtifact>,
    },

    /// Copy artifacts from the editor into the external folder.
    Export {
        /// settings, keybindings, snippets or extensions (all if omitted).
        artifact: Option<SyncArtifact>,
    },

    /// Show packages missing on either side.
    Status,

    /// Manage packages excluded from sync.
    Exclude {
        #[command(subcommand)]
        action: ExcludeAction,
    },

    /// Turn a boolean option on or off (prompts if STATE is omitted).
    Toggle {
        /// autoImport, autoExport, importSettings, importKeybindings,
        /// importSnippets, importExtensions or showStatusBarIcon.
        setting: SyncToggle,

        /// on or off.
        #[arg(value_parser = parse_switch)]
        state: Option<bool>,
    },

    /// Show the current configuration.
    Config,

    /// Show where each artifact lives.
    Paths,

    /// Import on start, then export whenever a synced file settles.
    Watch {
        /// Quiet period before a change is exported, in milliseconds [default: 2000].
        #[arg(long)]
        stability_ms: Option<u64>,
    },

    /// Install or uninstall an extension through the editor.
    Extension {
        #[command(subcommand)]
        action: ExtensionAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ExcludeAction {
    /// Exclude a package (picked from a list if ID is omitted).
    Add {
        /// installed or external.
        location: ExtensionLocation,
        id: Option<String>,
    },

    /// Stop excluding a package (picked from a list if ID is omitted).
    Remove {
        /// installed or external.
        location: ExtensionLocation,
        id: Option<String>,
    },

    /// List excluded packages (both locations if omitted).
    List { location: Option<ExtensionLocation> },
}

#[derive(Subcommand, Debug)]
pub enum ExtensionAction {
    /// Install an extension by id.
    Install { id: String },

    /// Uninstall an extension by id.
    Uninstall { id: String },
}

impl Cli {
    /// Parse the output format argument.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("Unknown state: {s}. Use: on, off")),
    }
}
