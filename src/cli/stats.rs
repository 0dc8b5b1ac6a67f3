//! Stats command.
//!
//! Shows entry counts, counter totals, and cycle counts for a history.

use serde::{Deserialize, Serialize};

use crate::core::PlaybookStats;
use crate::storage::{CycleSummary, HistoryStore};

/// Options for the stats command.
#[derive(Debug, Clone, Default)]
pub struct StatsOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the stats command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsOutput {
    /// Whether the command succeeded.
    pub success: bool,
    pub history_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PlaybookStats>,
    pub cycles_completed: u32,
    pub cycles_aborted: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<CycleSummary>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatsOutput {
    /// Create a failed output.
    pub fn failure(history_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            history_id: history_id.to_string(),
            stats: None,
            cycles_completed: 0,
            cycles_aborted: 0,
            last_cycle: None,
            error: Some(error.into()),
        }
    }
}

/// The stats command implementation.
pub struct StatsCommand<S: HistoryStore> {
    store: S,
}

impl<S: HistoryStore> StatsCommand<S> {
    /// Create a new stats command.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Run the stats command.
    pub fn run(&self, history_id: &str, _options: &StatsOptions) -> StatsOutput {
        match super::require_history(&self.store, history_id) {
            Ok(history) => StatsOutput {
                success: true,
                stats: Some(history.playbook.stats()),
                cycles_completed: history.cycles_completed,
                cycles_aborted: history.cycles_aborted,
                last_cycle: history.last_cycle,
                history_id: history.id,
                error: None,
            },
            Err(e) => StatsOutput::failure(history_id, e.to_string()),
        }
    }

    /// Format the output based on options.
    pub fn format_output(&self, output: &StatsOutput, options: &StatsOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return super::to_json(output);
        }

        self.format_human_readable(output)
    }

    fn format_human_readable(&self, output: &StatsOutput) -> String {
        if let Some(error) = &output.error {
            return format!("Error: {}", error);
        }

        let mut lines = vec![format!("History: {}", output.history_id)];
        if let Some(stats) = &output.stats {
            lines.push(format!("Playbook: {}", stats));
        }
        lines.push(format!(
            "Cycles: {} completed, {} aborted",
            output.cycles_completed, output.cycles_aborted
        ));

        if let Some(last) = &output.last_cycle {
            lines.push(String::new());
            lines.push(format!(
                "Last cycle ({}, {}): {}",
                last.state,
                last.finished_at.format("%Y-%m-%d %H:%M"),
                last.question
            ));
            if let Some(failure) = &last.failure {
                lines.push(format!("  Failure: {}", failure));
            }
            lines.push(format!(
                "  Tags: {} applied, {} skipped",
                last.tags_applied, last.tags_skipped
            ));
            lines.push(format!(
                "  Edits: {} applied, {} skipped",
                last.edits_applied, last.edits_skipped
            ));
        }

        lines.join("\n")
    }
}
