//! Output formatting for sync reports, package diffs and configuration.
//!
//! Supports two output formats: table view and JSON.

use std::path::Path;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{
    ExtensionLocation, MissingReason, OutcomeStatus, SyncArtifact, SyncConfiguration, SyncReport,
    SyncToggle,
};
use crate::infrastructure::EditorPaths;

use super::reconciler::MissingReport;

/// Output format options.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

fn colored_status(status: &OutcomeStatus) -> String {
    let text = status.to_string();
    match status {
        OutcomeStatus::Synced { .. } => text.green().to_string(),
        OutcomeStatus::Failed { .. } => text.red().to_string(),
        OutcomeStatus::EmptySource | OutcomeStatus::Unavailable => text.yellow().to_string(),
        OutcomeStatus::Disabled | OutcomeStatus::SourceMissing => text.dimmed().to_string(),
    }
}

/// Formats a sync report as a table with a summary line.
pub fn format_report_table(report: &SyncReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Artifact", "Outcome"]);

    for outcome in &report.outcomes {
        table.add_row(vec![outcome.artifact.to_string(), colored_status(&outcome.status)]);
    }

    let mut out = table.to_string();

    let synced = report.outcomes.iter().filter(|o| o.status.is_synced()).count();
    let failed = report.failure_count();
    out.push_str(&format!(
        "\n{} {} synced, {} failed",
        format!("{}:", capitalize(&report.direction.to_string())).bold(),
        synced.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    ));

    if let Some(finished) = report.finished_at {
        let elapsed = finished - report.started_at;
        out.push_str(&format!(" in {}ms", elapsed.num_milliseconds()));
    }

    if report.restart_required {
        out.push_str(&format!("\n{}", "Restart required".yellow().bold()));
    }

    out
}

/// Formats a sync report as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_report_json(report: &SyncReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Formats a package diff as a table.
pub fn format_missing_table(report: &MissingReport) -> String {
    if report.entries.is_empty() {
        return format!(
            "{} Nothing {}.",
            "✓".green().bold(),
            report.direction
        );
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Package", "Version", "Reason", "Name"]);

    for entry in &report.entries {
        let reason = match entry.reason {
            MissingReason::Missing => entry.reason.to_string().red().to_string(),
            MissingReason::Outdated => entry.reason.to_string().yellow().to_string(),
        };
        table.add_row(vec![
            entry.id.clone(),
            entry.version.clone(),
            reason,
            truncate(&entry.label, 35),
        ]);
    }

    format!(
        "{}\n{}",
        format!("{} packages {}", report.entries.len(), report.direction).bold(),
        table
    )
}

/// Formats package diffs as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_missing_json(reports: &[MissingReport]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(reports)
}

/// Formats the exclusion list for one location.
pub fn format_exclusions(location: ExtensionLocation, ids: &[String]) -> String {
    if ids.is_empty() {
        return format!("No excluded {location} packages.");
    }

    let mut out = format!("{}", format!("Excluded {location} packages:").bold());
    for id in ids {
        out.push_str(&format!("\n  - {id}"));
    }
    out
}

/// Formats the configuration as a key/value table.
pub fn format_config(config: &SyncConfiguration, config_file: &Path) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Key", "Value"]);

    table.add_row(vec![
        "externalPath".to_string(),
        config.external_path.display().to_string(),
    ]);
    for toggle in SyncToggle::ALL {
        let value = if toggle.get(config) {
            "on".green().to_string()
        } else {
            "off".dimmed().to_string()
        };
        table.add_row(vec![toggle.key().to_string(), value]);
    }
    table.add_row(vec![
        "excluded.installed".to_string(),
        config.excluded.installed.len().to_string(),
    ]);
    table.add_row(vec![
        "excluded.external".to_string(),
        config.excluded.external.len().to_string(),
    ]);
    if let Some(name) = config.executable_override() {
        table.add_row(vec!["executableName".to_string(), name.to_string()]);
    }
    if let Some(dir) = config.settings_path_override() {
        table.add_row(vec!["settingsPath".to_string(), dir.display().to_string()]);
    }

    format!(
        "{} {}\n{}",
        "⚙ Configuration".bold(),
        config_file.display().to_string().dimmed(),
        table
    )
}

/// Formats where each artifact lives on both sides.
pub fn format_paths(paths: &EditorPaths, config: &SyncConfiguration) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Artifact", "Editor", "External"]);

    for artifact in SyncArtifact::ALL {
        let local = paths.artifact_path(artifact).map_or_else(
            || paths.extensions_dir.display().to_string(),
            |p| p.display().to_string(),
        );
        let external = config.external_artifact_path(artifact);
        let external = if external.exists() {
            external.display().to_string()
        } else {
            external.display().to_string().dimmed().to_string()
        };
        table.add_row(vec![artifact.to_string(), local, external]);
    }
    table.add_row(vec![
        "archive".to_string(),
        "-".to_string(),
        config.archive_dir().display().to_string(),
    ]);

    table.to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reconciler::{MissingEntry, ReconcileDirection};
    use crate::domain::SyncDirection;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("ünïcödé théme", 8), "ünïcö...");
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_exclusions() {
        assert_eq!(
            format_exclusions(ExtensionLocation::Installed, &[]),
            "No excluded installed packages."
        );
        colored::control::set_override(false);
        assert_eq!(
            format_exclusions(ExtensionLocation::External, &["pub.a".to_string()]),
            "Excluded external packages:\n  - pub.a"
        );
    }

    #[test]
    fn test_report_table_lists_every_outcome() {
        let mut report = SyncReport::start(SyncDirection::Import);
        report.record(SyncArtifact::Settings, OutcomeStatus::synced(""));
        report.record(
            SyncArtifact::Keybindings,
            OutcomeStatus::Failed {
                message: "boom".into(),
            },
        );
        report.restart_required = true;

        let report = report.finish();
        let out = format_report_table(&report);
        assert!(out.contains("settings"));
        assert!(out.contains("failed: boom"));
        assert!(out.contains("Restart required"));

        let json = format_report_json(&report).unwrap();
        assert!(json.contains("\"restart_required\": true"));
    }

    #[test]
    fn test_missing_table() {
        let empty = MissingReport {
            direction: ReconcileDirection::MissingFromInstalled,
            entries: Vec::new(),
        };
        assert!(format_missing_table(&empty).contains("Nothing missing from installed."));

        let report = MissingReport {
            direction: ReconcileDirection::MissingFromExternal,
            entries: vec![MissingEntry {
                id: "pub.a".into(),
                version: "1.0.0".into(),
                label: "Package A".into(),
                reason: MissingReason::Outdated,
            }],
        };
        let out = format_missing_table(&report);
        assert!(out.contains("pub.a"));
        assert!(out.contains("outdated"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("import"), "Import");
        assert_eq!(capitalize(""), "");
    }
}
