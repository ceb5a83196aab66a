//! Sync cycle models.
//!
//! Contains the artifact kinds that are synced, the phases a sync cycle
//! moves through, and the report produced at the end of a cycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One kind of editor configuration that is synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncArtifact {
    Settings,
    Keybindings,
    Snippets,
    Extensions,
}

impl SyncArtifact {
    /// All artifacts, in the order a full sync processes them.
    pub const ALL: [Self; 4] = [
        Self::Settings,
        Self::Keybindings,
        Self::Snippets,
        Self::Extensions,
    ];

    /// File (or folder) name inside the external folder.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Settings => "settings.json",
            Self::Keybindings => "keybindings.json",
            Self::Snippets => "snippets",
            Self::Extensions => "extensions.json",
        }
    }
}

impl fmt::Display for SyncArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings => write!(f, "settings"),
            Self::Keybindings => write!(f, "keybindings"),
            Self::Snippets => write!(f, "snippets"),
            Self::Extensions => write!(f, "extensions"),
        }
    }
}

impl std::str::FromStr for SyncArtifact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "settings" => Ok(Self::Settings),
            "keybindings" | "keys" => Ok(Self::Keybindings),
            "snippets" => Ok(Self::Snippets),
            "extensions" | "packages" => Ok(Self::Extensions),
            _ => Err(format!(
                "Unknown artifact: {s}. Use: settings, keybindings, snippets, extensions"
            )),
        }
    }
}

/// Direction of a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// External folder → editor profile.
    Import,
    /// Editor profile → external folder.
    Export,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Import => write!(f, "import"),
            Self::Export => write!(f, "export"),
        }
    }
}

/// Where the orchestrator currently is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    CheckingConfiguration,
    Importing(SyncArtifact),
    Exporting(SyncArtifact),
}

impl SyncPhase {
    /// Phase for working on `artifact` in `direction`.
    #[must_use]
    pub const fn working(direction: SyncDirection, artifact: SyncArtifact) -> Self {
        match direction {
            SyncDirection::Import => Self::Importing(artifact),
            SyncDirection::Export => Self::Exporting(artifact),
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CheckingConfiguration => write!(f, "checking configuration"),
            Self::Importing(a) => write!(f, "importing {a}"),
            Self::Exporting(a) => write!(f, "exporting {a}"),
        }
    }
}

/// Result of syncing a single artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The artifact was copied; `detail` summarizes what changed.
    Synced { detail: String },
    /// The artifact's enable flag is off.
    Disabled,
    /// The source path does not exist.
    SourceMissing,
    /// The source exists but is empty or whitespace only.
    EmptySource,
    /// The editor executable could not be reached.
    Unavailable,
    /// The operation failed; the destination may be unchanged.
    Failed { message: String },
}

impl OutcomeStatus {
    #[must_use]
    pub fn synced(detail: impl Into<String>) -> Self {
        Self::Synced {
            detail: detail.into(),
        }
    }

    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced { detail } if detail.is_empty() => write!(f, "synced"),
            Self::Synced { detail } => write!(f, "synced ({detail})"),
            Self::Disabled => write!(f, "disabled"),
            Self::SourceMissing => write!(f, "source missing"),
            Self::EmptySource => write!(f, "source empty, skipped"),
            Self::Unavailable => write!(f, "editor executable unavailable"),
            Self::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

/// Outcome for one artifact within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactOutcome {
    pub artifact: SyncArtifact,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Summary of one import or export cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<ArtifactOutcome>,
    /// Extensions changed and the editor needs a restart to pick them up.
    pub restart_required: bool,
}

impl SyncReport {
    /// Start a report for a new cycle.
    #[must_use]
    pub fn start(direction: SyncDirection) -> Self {
        Self {
            direction,
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            restart_required: false,
        }
    }

    /// Record an artifact outcome.
    pub fn record(&mut self, artifact: SyncArtifact, status: OutcomeStatus) {
        self.outcomes.push(ArtifactOutcome { artifact, status });
    }

    /// Mark the report as finished.
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Outcome recorded for `artifact`, if any.
    #[cfg(test)]
    #[must_use]
    pub fn outcome(&self, artifact: SyncArtifact) -> Option<&OutcomeStatus> {
        self.outcomes
            .iter()
            .find(|o| o.artifact == artifact)
            .map(|o| &o.status)
    }

    /// Number of artifacts that failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_order_and_names() {
        let names: Vec<&str> = SyncArtifact::ALL.iter().map(|a| a.file_name()).collect();
        assert_eq!(
            names,
            ["settings.json", "keybindings.json", "snippets", "extensions.json"]
        );
        assert_eq!("Keybindings".parse::<SyncArtifact>(), Ok(SyncArtifact::Keybindings));
        assert!("themes".parse::<SyncArtifact>().is_err());
    }

    #[test]
    fn test_report_lifecycle() {
        let mut report = SyncReport::start(SyncDirection::Export);
        report.record(SyncArtifact::Settings, OutcomeStatus::synced(""));
        report.record(
            SyncArtifact::Snippets,
            OutcomeStatus::Failed {
                message: "boom".into(),
            },
        );
        let report = report.finish();

        assert!(report.finished_at.is_some());
        assert_eq!(report.failure_count(), 1);
        assert!(report
            .outcome(SyncArtifact::Settings)
            .is_some_and(OutcomeStatus::is_synced));
        assert_eq!(report.outcome(SyncArtifact::Extensions), None);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(
            SyncPhase::working(SyncDirection::Import, SyncArtifact::Snippets).to_string(),
            "importing snippets"
        );
        assert_eq!(SyncPhase::Idle.to_string(), "idle");
    }
}
