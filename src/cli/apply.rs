//! Apply command.
//!
//! Applies an edit batch file (`{"reasoning", "operations"}`) to a history's
//! playbook outside of a cycle.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::{apply_with_limit, ApplyReport, EditBatch};
use crate::error::Result;
use crate::pipeline::{parse_stage_output, Stage};
use crate::storage::{HistoryRecord, HistoryStore};
use crate::util::read_to_string_limited;

/// Options for the apply command.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Report what would change without saving.
    pub dry_run: bool,
}

/// Output format for the apply command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutput {
    /// Whether the command succeeded.
    pub success: bool,
    pub history_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ApplyReport>,
    /// Entries after the batch.
    pub entries: usize,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyOutput {
    /// Create a failed output.
    pub fn failure(history_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            history_id: history_id.to_string(),
            report: None,
            entries: 0,
            dry_run: false,
            error: Some(error.into()),
        }
    }
}

/// The apply command implementation.
pub struct ApplyCommand<S: HistoryStore> {
    store: S,
    config: Config,
}

impl<S: HistoryStore> ApplyCommand<S> {
    /// Create a new apply command.
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    /// Apply the batch in `batch_path` to `history_id`.
    ///
    /// A missing history is created, so a batch of ADDs can seed one.
    pub fn run(&self, history_id: &str, batch_path: &Path, options: &ApplyOptions) -> ApplyOutput {
        match self.apply(history_id, batch_path, options) {
            Ok((history, report)) => ApplyOutput {
                success: true,
                history_id: history.id,
                report: Some(report),
                entries: history.playbook.len(),
                dry_run: options.dry_run,
                error: None,
            },
            Err(e) => ApplyOutput::failure(history_id, e.to_string()),
        }
    }

    fn apply(
        &self,
        history_id: &str,
        batch_path: &Path,
        options: &ApplyOptions,
    ) -> Result<(HistoryRecord, ApplyReport)> {
        let text = read_to_string_limited(batch_path)?;
        let batch: EditBatch = parse_stage_output(Stage::Reconcile, &text)?;

        let mut history = match self.store.get(history_id)? {
            Some(history) => history,
            None => HistoryRecord::new(history_id),
        };

        let report = apply_with_limit(
            &mut history.playbook,
            &batch,
            self.config.pipeline.max_operations,
        );

        if !options.dry_run {
            history.touch();
            self.store.put(&history)?;
        }

        Ok((history, report))
    }

    /// Format the output based on options.
    pub fn format_output(&self, output: &ApplyOutput, options: &ApplyOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return super::to_json(output);
        }

        if let Some(error) = &output.error {
            return format!("Error: {}", error);
        }

        let mut lines = Vec::new();
        if let Some(report) = &output.report {
            lines.push(format!(
                "{}{} applied, {} skipped",
                if output.dry_run { "Dry run: " } else { "" },
                report.applied_count(),
                report.skipped_count()
            ));
            lines.extend(report.summary_lines());
        }
        lines.push(format!(
            "Playbook {} has {} entries.",
            output.history_id, output.entries
        ));
        lines.join("\n")
    }
}
