//! Show command.
//!
//! Renders a history's playbook as it is presented to the produce stage.

use serde::{Deserialize, Serialize};

use crate::core::Playbook;
use crate::storage::HistoryStore;

/// Options for the show command.
#[derive(Debug, Clone, Default)]
pub struct ShowOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Restrict the rendering to these entry ids.
    pub ids: Vec<String>,
}

/// Output format for the show command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowOutput {
    /// Whether the command succeeded.
    pub success: bool,
    pub history_id: String,
    /// Prompt rendering of the playbook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
    /// Full snapshot (JSON output only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playbook: Option<Playbook>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShowOutput {
    /// Create a failed output.
    pub fn failure(history_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            history_id: history_id.to_string(),
            rendered: None,
            playbook: None,
            error: Some(error.into()),
        }
    }
}

/// The show command implementation.
pub struct ShowCommand<S: HistoryStore> {
    store: S,
}

impl<S: HistoryStore> ShowCommand<S> {
    /// Create a new show command.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Run the show command.
    pub fn run(&self, history_id: &str, options: &ShowOptions) -> ShowOutput {
        let history = match super::require_history(&self.store, history_id) {
            Ok(history) => history,
            Err(e) => return ShowOutput::failure(history_id, e.to_string()),
        };

        let rendered = if options.ids.is_empty() {
            history.playbook.render()
        } else {
            history.playbook.render_excerpt(&options.ids)
        };

        ShowOutput {
            success: true,
            history_id: history.id,
            rendered: Some(rendered),
            playbook: Some(history.playbook),
            error: None,
        }
    }

    /// Format the output based on options.
    pub fn format_output(&self, output: &ShowOutput, options: &ShowOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return super::to_json(output);
        }

        match (&output.rendered, &output.error) {
            (Some(rendered), _) => rendered.clone(),
            (None, Some(error)) => format!("Error: {}", error),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EMPTY_PLAYBOOK;
    use crate::storage::{HistoryRecord, MemoryHistoryStore};
    use std::sync::Arc;

    fn store_with_history() -> Arc<MemoryHistoryStore> {
        let store = Arc::new(MemoryHistoryStore::new());
        let mut history = HistoryRecord::new("h");
        history.playbook.add_entry("math", "Check units", None);
        history.playbook.add_entry("style", "Be brief", None);
        store.put(&history).unwrap();
        store
    }

    #[test]
    fn test_show_renders_playbook() {
        let cmd = ShowCommand::new(store_with_history());
        let options = ShowOptions::default();

        let output = cmd.run("h", &options);
        assert!(output.success);

        let text = cmd.format_output(&output, &options);
        assert!(text.contains("Check units"));
        assert!(text.contains("Be brief"));
    }

    #[test]
    fn test_show_excerpt() {
        let cmd = ShowCommand::new(store_with_history());
        let options = ShowOptions {
            ids: vec!["math-00001".to_string()],
            ..Default::default()
        };

        let text = cmd.format_output(&cmd.run("h", &options), &options);
        assert!(text.contains("Check units"));
        assert!(!text.contains("Be brief"));
    }

    #[test]
    fn test_show_empty_history() {
        let store = Arc::new(MemoryHistoryStore::new());
        store.put(&HistoryRecord::new("empty")).unwrap();
        let cmd = ShowCommand::new(store);
        let options = ShowOptions::default();

        let output = cmd.run("empty", &options);
        assert_eq!(cmd.format_output(&output, &options), EMPTY_PLAYBOOK);
    }

    #[test]
    fn test_show_missing_history() {
        let cmd = ShowCommand::new(Arc::new(MemoryHistoryStore::new()));
        let output = cmd.run("nope", &ShowOptions::default());

        assert!(!output.success);
        assert!(output.error.unwrap().contains("nope"));
    }

    #[test]
    fn test_show_json_includes_snapshot() {
        let cmd = ShowCommand::new(store_with_history());
        let options = ShowOptions {
            json: true,
            ..Default::default()
        };

        let json = cmd.format_output(&cmd.run("h", &options), &options);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["success"], true);
        assert!(parsed["playbook"]["entries"]["math-00001"].is_object());
    }
}
