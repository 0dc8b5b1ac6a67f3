//! Tag command.
//!
//! Applies a file of outcome tags to a history's playbook. The file is
//! either a bare list `[{"id": ..., "tag": ...}]` or an object carrying a
//! `bullet_tags` list, as a critique response does.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::{apply_tags_with_limit, OutcomeTag, TagReport};
use crate::error::{PlaybookError, Result};
use crate::storage::{HistoryRecord, HistoryStore};
use crate::util::read_to_string_limited;

#[derive(Deserialize)]
#[serde(untagged)]
enum TagFile {
    List(Vec<OutcomeTag>),
    Wrapped {
        #[serde(alias = "entry_tags")]
        bullet_tags: Vec<OutcomeTag>,
    },
}

impl TagFile {
    fn into_tags(self) -> Vec<OutcomeTag> {
        match self {
            TagFile::List(tags) | TagFile::Wrapped { bullet_tags: tags } => tags,
        }
    }
}

/// Options for the tag command.
#[derive(Debug, Clone, Default)]
pub struct TagOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the tag command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagOutput {
    /// Whether the command succeeded.
    pub success: bool,
    pub history_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TagReport>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TagOutput {
    /// Create a failed output.
    pub fn failure(history_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            history_id: history_id.to_string(),
            report: None,
            error: Some(error.into()),
        }
    }
}

/// The tag command implementation.
pub struct TagCommand<S: HistoryStore> {
    store: S,
    config: Config,
}

impl<S: HistoryStore> TagCommand<S> {
    /// Create a new tag command.
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    /// Apply the tags in `tags_path` to an existing history.
    pub fn run(&self, history_id: &str, tags_path: &Path, _options: &TagOptions) -> TagOutput {
        match self.tag(history_id, tags_path) {
            Ok((history, report)) => TagOutput {
                success: true,
                history_id: history.id,
                report: Some(report),
                error: None,
            },
            Err(e) => TagOutput::failure(history_id, e.to_string()),
        }
    }

    fn tag(&self, history_id: &str, tags_path: &Path) -> Result<(HistoryRecord, TagReport)> {
        let text = read_to_string_limited(tags_path)?;
        let tags = serde_json::from_str::<TagFile>(&text)
            .map_err(|e| {
                PlaybookError::serde(format!("invalid tag file {}: {}", tags_path.display(), e))
            })?
            .into_tags();

        let mut history = super::require_history(&self.store, history_id)?;
        let report = apply_tags_with_limit(&mut history.playbook, &tags, self.config.pipeline.max_tags);

        history.touch();
        self.store.put(&history)?;
        Ok((history, report))
    }

    /// Format the output based on options.
    pub fn format_output(&self, output: &TagOutput, options: &TagOptions) -> String {
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
                "{} applied, {} skipped",
                report.applied_count(),
                report.skipped_count()
            ));
            lines.extend(report.summary_lines());
        }
        lines.join("\n")
    }
}
