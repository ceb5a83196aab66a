//! Application layer - use cases and orchestration.
//!
//! This layer sequences the sync cycles, reconciles installed and
//! archived packages, and formats results for the terminal.

pub mod formatter;
pub mod local_settings;
pub mod orchestrator;
pub mod reconciler;

pub use formatter::{
    format_config, format_exclusions, format_missing_json, format_missing_table, format_paths,
    format_report_json, format_report_table, OutputFormat,
};
pub use orchestrator::SyncOrchestrator;
pub use reconciler::ReconcileDirection;
