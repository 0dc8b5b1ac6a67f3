//! Export and import commands.
//!
//! Moves a history's playbook in and out as a snapshot
//! (`{"entries", "sections", "next_id"}`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Playbook;
use crate::error::Result;
use crate::storage::{HistoryRecord, HistoryStore};
use crate::util::{read_to_string_limited, write_atomic};

/// Options for the export command.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the export command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutput {
    /// Whether the command succeeded.
    pub success: bool,
    pub history_id: String,
    /// File the snapshot was written to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// The snapshot, when not written to a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Playbook>,
    pub entries: usize,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportOutput {
    /// Create a failed output.
    pub fn failure(history_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            history_id: history_id.to_string(),
            path: None,
            snapshot: None,
            entries: 0,
            error: Some(error.into()),
        }
    }
}

/// The export command implementation.
pub struct ExportCommand<S: HistoryStore> {
    store: S,
}

impl<S: HistoryStore> ExportCommand<S> {
    /// Create a new export command.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Export the playbook of `history_id`, to `output` or inline.
    pub fn run(&self, history_id: &str, output: Option<&Path>, _options: &ExportOptions) -> ExportOutput {
        match self.export(history_id, output) {
            Ok(result) => result,
            Err(e) => ExportOutput::failure(history_id, e.to_string()),
        }
    }

    fn export(&self, history_id: &str, output: Option<&Path>) -> Result<ExportOutput> {
        let history = super::require_history(&self.store, history_id)?;
        let entries = history.playbook.len();

        let (path, snapshot) = match output {
            Some(path) => {
                write_atomic(path, &history.playbook.dumps()?)?;
                (Some(path.display().to_string()), None)
            }
            None => (None, Some(history.playbook)),
        };

        Ok(ExportOutput {
            success: true,
            history_id: history.id,
            path,
            snapshot,
            entries,
            error: None,
        })
    }

    /// Format the output based on options.
    pub fn format_output(&self, output: &ExportOutput, options: &ExportOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return super::to_json(output);
        }

        if let Some(error) = &output.error {
            return format!("Error: {}", error);
        }

        match (&output.path, &output.snapshot) {
            (Some(path), _) => format!("Exported {} entries to {}", output.entries, path),
            (None, Some(snapshot)) => snapshot.dumps().unwrap_or_else(|_| "{}".to_string()),
            (None, None) => String::new(),
        }
    }
}

/// Options for the import command.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the import command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutput {
    /// Whether the command succeeded.
    pub success: bool,
    pub history_id: String,
    pub entries: usize,
    /// Whether a new history was created.
    pub created: bool,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportOutput {
    /// Create a failed output.
    pub fn failure(history_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            history_id: history_id.to_string(),
            entries: 0,
            created: false,
            error: Some(error.into()),
        }
    }
}

/// The import command implementation.
pub struct ImportCommand<S: HistoryStore> {
    store: S,
}

impl<S: HistoryStore> ImportCommand<S> {
    /// Create a new import command.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Replace the playbook of `history_id` with the snapshot in `input`.
    ///
    /// Cycle counts of an existing history are kept. Inconsistent snapshots
    /// are rejected before anything is written.
    pub fn run(&self, history_id: &str, input: &Path, _options: &ImportOptions) -> ImportOutput {
        match self.import(history_id, input) {
            Ok(result) => result,
            Err(e) => ImportOutput::failure(history_id, e.to_string()),
        }
    }

    fn import(&self, history_id: &str, input: &Path) -> Result<ImportOutput> {
        let playbook = Playbook::loads(&read_to_string_limited(input)?)?;

        let (history, created) = match self.store.get(history_id)? {
            Some(mut history) => {
                history.playbook = playbook;
                history.touch();
                (history, false)
            }
            None => (HistoryRecord::with_playbook(history_id, playbook), true),
        };
        self.store.put(&history)?;

        Ok(ImportOutput {
            success: true,
            entries: history.playbook.len(),
            history_id: history.id,
            created,
            error: None,
        })
    }

    /// Format the output based on options.
    pub fn format_output(&self, output: &ImportOutput, options: &ImportOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return super::to_json(output);
        }

        if let Some(error) = &output.error {
            return format!("Error: {}", error);
        }

        format!(
            "Imported {} entries into {} history {}",
            output.entries,
            if output.created { "new" } else { "existing" },
            output.history_id
        )
    }
}
