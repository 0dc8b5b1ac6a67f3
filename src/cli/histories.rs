//! Histories command.
//!
//! Lists stored histories, most recently updated first.

use serde::{Deserialize, Serialize};

use crate::storage::{HistoryRecord, HistoryStore};

/// Options for the histories command.
#[derive(Debug, Clone, Default)]
pub struct HistoriesOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Maximum number of histories to show.
    pub limit: usize,
}

/// Summary of a single history for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub id: String,
    pub entries: usize,
    pub cycles_completed: u32,
    pub cycles_aborted: u32,
    /// Last updated timestamp (ISO 8601).
    pub updated_at: String,
    /// Question of the most recent cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_question: Option<String>,
}

impl From<&HistoryRecord> for HistorySummary {
    fn from(history: &HistoryRecord) -> Self {
        Self {
            id: history.id.clone(),
            entries: history.playbook.len(),
            cycles_completed: history.cycles_completed,
            cycles_aborted: history.cycles_aborted,
            updated_at: history.updated_at.to_rfc3339(),
            last_question: history.last_cycle.as_ref().map(|c| c.question.clone()),
        }
    }
}

/// Output format for the histories command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoriesOutput {
    /// Whether the command was successful.
    pub success: bool,
    pub histories: Vec<HistorySummary>,
    /// Total count of histories returned.
    pub count: usize,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoriesOutput {
    /// Create a successful output.
    pub fn success(histories: Vec<HistorySummary>) -> Self {
        let count = histories.len();
        Self {
            success: true,
            histories,
            count,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            histories: vec![],
            count: 0,
            error: Some(error.into()),
        }
    }

    /// Format as human-readable text.
    pub fn format_text(&self) -> String {
        if !self.success {
            return format!(
                "Histories failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            );
        }

        if self.histories.is_empty() {
            return "No histories found.".to_string();
        }

        let mut lines = vec![format!("Histories ({} found):", self.count)];
        lines.push(String::new());

        lines.push(format!(
            "{:<32}  {:>7}  {:>9}  {:>7}  {:<20}  {}",
            "ID", "ENTRIES", "COMPLETED", "ABORTED", "UPDATED", "LAST QUESTION"
        ));
        lines.push("-".repeat(110));

        for history in &self.histories {
            // YYYY-MM-DDTHH:MM:SS
            let updated: String = history.updated_at.chars().take(19).collect();
            let question: String = history
                .last_question
                .as_deref()
                .unwrap_or("-")
                .chars()
                .take(40)
                .collect();
            lines.push(format!(
                "{:<32}  {:>7}  {:>9}  {:>7}  {:<20}  {}",
                history.id,
                history.entries,
                history.cycles_completed,
                history.cycles_aborted,
                updated,
                question
            ));
        }

        lines.join("\n")
    }
}

/// The histories command implementation.
pub struct HistoriesCommand<S: HistoryStore> {
    store: S,
}

impl<S: HistoryStore> HistoriesCommand<S> {
    /// Create a new histories command.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Run the histories command.
    pub fn run(&self, options: &HistoriesOptions) -> HistoriesOutput {
        match self.store.list(options.limit) {
            Ok(histories) => {
                HistoriesOutput::success(histories.iter().map(HistorySummary::from).collect())
            }
            Err(e) => HistoriesOutput::failure(format!("Failed to list histories: {}", e)),
        }
    }

    /// Format the output based on options.
    pub fn format_output(&self, output: &HistoriesOutput, options: &HistoriesOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return super::to_json(output);
        }

        output.format_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryHistoryStore;
    use std::sync::Arc;

    fn create_test_store() -> Arc<MemoryHistoryStore> {
        Arc::new(MemoryHistoryStore::new())
    }

    #[test]
    fn test_histories_empty() {
        let cmd = HistoriesCommand::new(create_test_store());
        let options = HistoriesOptions {
            limit: 10,
            ..Default::default()
        };

        let output = cmd.run(&options);
        assert!(output.success);
        assert_eq!(output.count, 0);
        assert_eq!(output.format_text(), "No histories found.");
    }

    #[test]
    fn test_histories_with_data() {
        let store = create_test_store();
        let mut history = HistoryRecord::new("math");
        history.playbook.add_entry("general", "Check units", None);
        history.cycles_completed = 2;
        store.put(&history).unwrap();
        store.put(&HistoryRecord::new("style")).unwrap();

        let cmd = HistoriesCommand::new(store);
        let options = HistoriesOptions {
            limit: 10,
            ..Default::default()
        };

        let output = cmd.run(&options);
        assert!(output.success);
        assert_eq!(output.count, 2);

        let math = output.histories.iter().find(|h| h.id == "math").unwrap();
        assert_eq!(math.entries, 1);
        assert_eq!(math.cycles_completed, 2);

        let text = output.format_text();
        assert!(text.contains("Histories (2 found):"));
        assert!(text.contains("math"));
    }

    #[test]
    fn test_histories_limit() {
        let store = create_test_store();
        for i in 0..5 {
            store.put(&HistoryRecord::new(format!("h-{}", i))).unwrap();
        }

        let cmd = HistoriesCommand::new(store);
        let output = cmd.run(&HistoriesOptions {
            limit: 3,
            ..Default::default()
        });
        assert_eq!(output.count, 3);
    }

    #[test]
    fn test_histories_json_and_quiet() {
        let cmd = HistoriesCommand::new(create_test_store());
        let output = HistoriesOutput::failure("disk on fire");

        let quiet = HistoriesOptions {
            quiet: true,
            ..Default::default()
        };
        assert!(cmd.format_output(&output, &quiet).is_empty());

        let json = HistoriesOptions {
            json: true,
            ..Default::default()
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&cmd.format_output(&output, &json)).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["error"], "disk on fire");
        assert_eq!(output.format_text(), "Histories failed: disk on fire");
    }
}
