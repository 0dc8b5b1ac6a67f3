//! Cycle command.
//!
//! Runs one Produce → Critique → Reconcile cycle for a history, answering
//! stage prompts from a scripted responses file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::exit_codes;
use crate::pipeline::{CycleRunner, CycleState, ScriptedCollaborator, TaskInput};
use crate::storage::HistoryStore;

/// Options for the cycle command.
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the cycle command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleOutput {
    /// Whether the cycle ran (it may still have aborted).
    pub success: bool,
    pub history_id: String,
    /// `done` or `aborted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CycleState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Entries in the playbook after the cycle.
    pub entries: usize,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleOutput {
    /// Create a failed output.
    pub fn failure(history_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            history_id: history_id.to_string(),
            state: None,
            failure: None,
            final_answer: None,
            summary: None,
            entries: 0,
            error: Some(error.into()),
        }
    }

    /// Process exit code: aborted cycles are distinguished from errors.
    pub fn exit_code(&self) -> i32 {
        match (self.success, self.state) {
            (false, _) => exit_codes::ERROR,
            (true, Some(CycleState::Aborted)) => exit_codes::ABORTED,
            (true, _) => exit_codes::SUCCESS,
        }
    }
}

/// The cycle command implementation.
pub struct CycleCommand<S: HistoryStore> {
    store: S,
    config: Config,
}

impl<S: HistoryStore> CycleCommand<S> {
    /// Create a new cycle command.
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    /// Run one cycle.
    pub fn run(
        &self,
        history_id: &str,
        task: TaskInput,
        responses: &Path,
        _options: &CycleOptions,
    ) -> CycleOutput {
        let collaborator = match ScriptedCollaborator::from_file(responses) {
            Ok(collaborator) => collaborator,
            Err(e) => {
                return CycleOutput::failure(
                    history_id,
                    format!("Failed to load responses: {}", e),
                )
            }
        };

        let runner = CycleRunner::new(&self.store, &collaborator, &self.config);
        match runner.run(history_id, task) {
            Ok(run) => CycleOutput {
                success: true,
                history_id: run.history.id.clone(),
                state: Some(run.outcome.state),
                failure: run.outcome.failure.as_ref().map(ToString::to_string),
                final_answer: run
                    .outcome
                    .outputs
                    .produce
                    .as_ref()
                    .map(|p| p.final_answer.clone()),
                summary: run.outcome.summary.clone(),
                entries: run.history.playbook.len(),
                error: None,
            },
            Err(e) => CycleOutput::failure(history_id, e.to_string()),
        }
    }

    /// Format the output based on options.
    pub fn format_output(&self, output: &CycleOutput, options: &CycleOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return super::to_json(output);
        }

        if !output.success {
            return format!(
                "Cycle failed: {}",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = Vec::new();
        match (output.state, &output.failure) {
            (Some(CycleState::Aborted), Some(failure)) => {
                lines.push(format!("Cycle aborted for {}: {}", output.history_id, failure));
            }
            _ => lines.push(format!("Cycle complete for {}", output.history_id)),
        }
        if let Some(answer) = &output.final_answer {
            lines.push(format!("Answer: {}", answer));
        }
        if let Some(summary) = &output.summary {
            lines.push(summary.clone());
        }
        lines.push(format!("Playbook now has {} entries.", output.entries));
        lines.join("\n")
    }
}
