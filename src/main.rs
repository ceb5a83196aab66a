//! code-sync - Keep an editor's user configuration in sync across machines.
//!
//! Settings, keybindings, snippets and the installed extension list are
//! mirrored to an external folder (typically one a cloud-storage client
//! already syncs). Machine-local settings stay out of the shared copy.
//!
//! QUICK START:
//!   code-sync init ~/OneDrive/Apps/code-sync   # Configure the external folder
//!   code-sync export                           # Push this machine's state
//!   code-sync import                           # Pull the shared state
//!   code-sync watch                            # Export on every change
//!   code-sync status                           # Packages missing on either side

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_config, format_exclusions, format_missing_json, format_missing_table, format_paths,
    format_report_json, format_report_table, OutputFormat, ReconcileDirection, SyncOrchestrator,
};
use cli::{Cli, Commands, ExcludeAction, ExtensionAction};
use domain::{ExtensionLocation, SyncConfiguration, SyncReport};
use infrastructure::{
    executable, ChangeWatcher, ConfigStore, EditorCli, EditorFlavor, EditorPaths,
    ExtensionsDirectory, TerminalPrompt, DEFAULT_STABILITY_WINDOW, DEFAULT_TIMEOUT,
};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let format = cli
        .output_format()
        .map_err(|e| domain::AppError::Config { message: e })?;

    let flavor = if cli.insiders {
        EditorFlavor::Insiders
    } else {
        EditorFlavor::Stable
    };
    let store = ConfigStore::resolve(cli.data_dir.clone());
    let mut sync = build_orchestrator(store, flavor, !cli.non_interactive)?;

    match cli.command {
        Commands::Init { path } => {
            cmd_init(&mut sync, path)?;
        }
        Commands::SetPath { path } => {
            sync.set_external_path(path)?;
        }
        Commands::Import { artifact } => {
            let report = match artifact {
                Some(artifact) => sync.import(artifact)?,
                None => sync.import_all()?,
            };
            print_report(&report, format)?;
        }
        Commands::Export { artifact } => {
            let report = match artifact {
                Some(artifact) => sync.export(artifact)?,
                None => sync.export_all()?,
            };
            print_report(&report, format)?;
        }
        Commands::Status => {
            cmd_status(&mut sync, format)?;
        }
        Commands::Exclude { action } => {
            cmd_exclude(&mut sync, action)?;
        }
        Commands::Toggle { setting, state } => match sync.toggle(setting, state)? {
            Some(value) => println!(
                "{} {} is now {}",
                "✓".green().bold(),
                setting,
                if value { "on".green() } else { "off".yellow() }
            ),
            None => println!("{} unchanged", setting),
        },
        Commands::Config => {
            cmd_config(&mut sync, format)?;
        }
        Commands::Paths => {
            sync.check_configuration()?;
            println!("{}", "📂 code-sync paths".bold());
            println!("{}", format_paths(sync.paths(), sync.config()?));
        }
        Commands::Watch { stability_ms } => {
            let stability = stability_ms.map_or(DEFAULT_STABILITY_WINDOW, Duration::from_millis);
            cmd_watch(&mut sync, stability, format)?;
        }
        Commands::Extension { action } => match action {
            ExtensionAction::Install { id } => {
                sync.install_extension(&id)?;
            }
            ExtensionAction::Uninstall { id } => {
                sync.uninstall_extension(&id)?;
            }
        },
    }

    Ok(())
}

/// Wire the orchestrator to the real editor, filesystem and terminal.
fn build_orchestrator(
    store: ConfigStore,
    flavor: EditorFlavor,
    interactive: bool,
) -> domain::Result<SyncOrchestrator> {
    // Overrides are read up front; a missing file is created later by check_configuration
    let config = if store.exists() {
        store.load()?
    } else {
        SyncConfiguration::default()
    };

    let paths = EditorPaths::detect(flavor, config.settings_path_override())?;
    let installed = ExtensionsDirectory::new(paths.extensions_dir.clone());
    let manager = EditorCli::new(
        executable(flavor, config.executable_override()),
        DEFAULT_TIMEOUT,
    );

    Ok(SyncOrchestrator::new(
        store,
        paths,
        Box::new(installed),
        Box::new(manager),
        Box::new(TerminalPrompt::stdin(interactive)),
    ))
}

/// Create or re-point the configuration.
fn cmd_init(sync: &mut SyncOrchestrator, path: Option<String>) -> domain::Result<()> {
    match path {
        Some(path) => {
            sync.set_external_path(Some(path))?;
        }
        None if sync.store().exists() => {
            sync.check_configuration()?;
            println!(
                "{} Already configured; use `code-sync set-path` to change the external folder",
                "ℹ".blue().bold()
            );
        }
        None => {
            sync.check_configuration()?;
        }
    }

    let config = sync.config()?;
    println!(
        "{} Syncing through {}",
        "✓".green().bold(),
        config.external_path.display().to_string().cyan()
    );
    println!(
        "  Configuration: {}",
        sync.store().settings_file().display().to_string().dimmed()
    );
    Ok(())
}

/// Show packages missing on either side.
fn cmd_status(sync: &mut SyncOrchestrator, format: OutputFormat) -> domain::Result<()> {
    let mut reports = Vec::new();
    for direction in ReconcileDirection::ALL {
        reports.push(sync.missing_packages(direction)?);
    }

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                format_missing_json(&reports).map_err(domain::AppError::json_parse)?
            );
        }
        OutputFormat::Table => {
            for report in &reports {
                println!("{}", format_missing_table(report));
                println!();
            }
        }
    }
    Ok(())
}

/// Exclusion management command.
fn cmd_exclude(sync: &mut SyncOrchestrator, action: ExcludeAction) -> domain::Result<()> {
    match action {
        ExcludeAction::Add { location, id } => {
            sync.add_exclusion(location, id)?;
        }
        ExcludeAction::Remove { location, id } => {
            sync.remove_exclusion(location, id)?;
        }
        ExcludeAction::List { location } => {
            let locations = match location {
                Some(location) => vec![location],
                None => vec![ExtensionLocation::Installed, ExtensionLocation::External],
            };
            for location in locations {
                let ids = sync.exclusions(location)?;
                println!("{}", format_exclusions(location, &ids));
            }
        }
    }
    Ok(())
}

/// Show configuration command.
fn cmd_config(sync: &mut SyncOrchestrator, format: OutputFormat) -> domain::Result<()> {
    sync.check_configuration()?;
    let config = sync.config()?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(config).map_err(domain::AppError::json_parse)?
        ),
        OutputFormat::Table => {
            println!("{}", format_config(config, &sync.store().settings_file()));
        }
    }
    Ok(())
}

/// Import on start, then export settled changes until interrupted.
fn cmd_watch(
    sync: &mut SyncOrchestrator,
    stability: Duration,
    format: OutputFormat,
) -> domain::Result<()> {
    if let Some(report) = sync.startup()? {
        print_report(&report, format)?;
    }

    let mut watcher = ChangeWatcher::new(&sync.watch_targets(), stability)?;
    for path in watcher.watched_paths() {
        println!("{} Watching {}", "👀".bold(), path.display());
    }

    watcher.run(|paths| match sync.handle_changes(paths) {
        Ok(Some(report)) => {
            if let Err(e) = print_report(&report, format) {
                tracing::error!(error = %e, "Failed to print report");
            }
        }
        Ok(None) => {}
        Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
    })
}

fn print_report(report: &SyncReport, format: OutputFormat) -> domain::Result<()> {
    match format {
        OutputFormat::Json => println!(
            "{}",
            format_report_json(report).map_err(domain::AppError::json_parse)?
        ),
        OutputFormat::Table => println!("{}", format_report_table(report)),
    }
    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
