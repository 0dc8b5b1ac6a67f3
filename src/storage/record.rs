//! Persisted history of cycles for one task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::playbook::Playbook;
use crate::error::{PlaybookError, Result};
use crate::pipeline::context::Progress;
use crate::pipeline::orchestrator::{CycleOutcome, CycleState};

/// Longest accepted history id.
pub const MAX_HISTORY_ID_LEN: usize = 128;

/// A playbook and the cycles that shaped it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    /// Unique history identifier, also the storage key.
    pub id: String,
    /// Playbook as of the last cycle.
    pub playbook: Playbook,
    #[serde(default)]
    pub cycles_completed: u32,
    #[serde(default)]
    pub cycles_aborted: u32,
    /// When the history was created.
    pub created_at: DateTime<Utc>,
    /// When the history was last updated.
    pub updated_at: DateTime<Utc>,
    /// Summary of the most recent cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<CycleSummary>,
}

impl HistoryRecord {
    /// Create an empty history.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            playbook: Playbook::new(),
            cycles_completed: 0,
            cycles_aborted: 0,
            created_at: now,
            updated_at: now,
            last_cycle: None,
        }
    }

    /// Create a history around an existing playbook.
    pub fn with_playbook(id: impl Into<String>, playbook: Playbook) -> Self {
        Self {
            playbook,
            ..Self::new(id)
        }
    }

    /// Cycle counts, as shown to the reconcile stage.
    pub fn progress(&self) -> Progress {
        Progress {
            cycles_completed: self.cycles_completed,
            cycles_aborted: self.cycles_aborted,
        }
    }

    /// Fold a finished cycle into the history.
    ///
    /// The outcome's playbook replaces the stored one whether or not the
    /// cycle completed.
    pub fn record_cycle(&mut self, question: &str, outcome: &CycleOutcome) {
        let summary = CycleSummary::from_outcome(question, outcome);
        if outcome.is_completed() {
            self.cycles_completed += 1;
        } else {
            self.cycles_aborted += 1;
        }
        self.playbook = outcome.playbook.clone();
        self.last_cycle = Some(summary);
        self.touch();
    }

    /// Update the history's updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// What happened in one cycle, kept alongside the playbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleSummary {
    pub question: String,
    /// `done` or `aborted`.
    pub state: CycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    pub tags_applied: usize,
    pub tags_skipped: usize,
    pub edits_applied: usize,
    pub edits_skipped: usize,
    pub finished_at: DateTime<Utc>,
}

impl CycleSummary {
    /// Condense a cycle outcome.
    pub fn from_outcome(question: &str, outcome: &CycleOutcome) -> Self {
        Self {
            question: question.to_string(),
            state: outcome.state,
            failure: outcome.failure.as_ref().map(ToString::to_string),
            final_answer: outcome
                .outputs
                .produce
                .as_ref()
                .map(|p| p.final_answer.clone()),
            tags_applied: outcome.tag_report.as_ref().map_or(0, |r| r.applied_count()),
            tags_skipped: outcome.tag_report.as_ref().map_or(0, |r| r.skipped_count()),
            edits_applied: outcome.apply_report.as_ref().map_or(0, |r| r.applied_count()),
            edits_skipped: outcome.apply_report.as_ref().map_or(0, |r| r.skipped_count()),
            finished_at: Utc::now(),
        }
    }
}

/// Reject ids that cannot safely name a history file.
pub fn validate_history_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(PlaybookError::invalid_history_id(id, "empty"));
    }
    if id.len() > MAX_HISTORY_ID_LEN {
        return Err(PlaybookError::invalid_history_id(
            id,
            format!("longer than {} characters", MAX_HISTORY_ID_LEN),
        ));
    }
    if id.starts_with('.') {
        return Err(PlaybookError::invalid_history_id(id, "starts with '.'"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(PlaybookError::invalid_history_id(
            id,
            "only ASCII letters, digits, '-', '_' and '.' are allowed",
        ));
    }
    Ok(())
}
