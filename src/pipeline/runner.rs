//! Runs a cycle against a stored history and persists the result.

use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::collaborator::Collaborator;
use crate::pipeline::context::TaskInput;
use crate::pipeline::orchestrator::{CycleOutcome, Orchestrator};
use crate::storage::{validate_history_id, HistoryRecord, HistoryStore};

/// A history after one more cycle, with that cycle's outcome.
#[derive(Debug, Clone)]
pub struct CycleRun {
    pub history: HistoryRecord,
    pub outcome: CycleOutcome,
}

/// Loads a history, runs one cycle, and stores the history again.
///
/// The history is written back whether the cycle completed or aborted, so
/// tags and edits from completed stages are never lost.
pub struct CycleRunner<'a, S: HistoryStore + ?Sized, C: Collaborator + ?Sized> {
    store: &'a S,
    collaborator: &'a C,
    config: &'a Config,
}

impl<'a, S: HistoryStore + ?Sized, C: Collaborator + ?Sized> CycleRunner<'a, S, C> {
    /// Create a runner.
    pub fn new(store: &'a S, collaborator: &'a C, config: &'a Config) -> Self {
        Self {
            store,
            collaborator,
            config,
        }
    }

    /// Run one cycle of `task` for the history `history_id`.
    ///
    /// A missing history is created. Only storage errors are returned as
    /// `Err`; stage failures are reported in the outcome.
    pub fn run(&self, history_id: &str, task: TaskInput) -> Result<CycleRun> {
        validate_history_id(history_id)?;

        let (mut history, playbook) = match self.store.get(history_id)? {
            Some(mut history) => {
                let playbook = std::mem::take(&mut history.playbook);
                (history, Some(playbook))
            }
            None => {
                debug!("Creating history {}", history_id);
                (HistoryRecord::new(history_id), None)
            }
        };

        let question = task.question.clone();
        let outcome = Orchestrator::new(self.collaborator, self.config).run_cycle(
            task,
            playbook,
            history.progress(),
        );

        history.record_cycle(&question, &outcome);
        self.store.put(&history)?;
        info!(
            "History {} saved: {} entries, {} completed, {} aborted",
            history.id,
            history.playbook.len(),
            history.cycles_completed,
            history.cycles_aborted
        );

        Ok(CycleRun { history, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybookError;
    use crate::pipeline::collaborator::ScriptedCollaborator;
    use crate::pipeline::orchestrator::CycleState;
    use crate::pipeline::stage::Stage;
    use crate::storage::MemoryHistoryStore;

    const PRODUCE: &str =
        r#"{"reasoning": "r", "bullet_ids": ["general-00001"], "final_answer": "42"}"#;
    const CRITIQUE: &str = r#"{"reasoning": "r", "error_identification": "none",
        "root_cause_analysis": "none", "correct_approach": "same", "key_insight": "fine",
        "bullet_tags": [{"id": "general-00001", "tag": "helpful"}]}"#;

    #[test]
    fn test_new_history_is_created_and_saved() {
        let store = MemoryHistoryStore::new();
        let collaborator = ScriptedCollaborator::new()
            .with_response(Stage::Produce, PRODUCE)
            .with_response(Stage::Critique, CRITIQUE)
            .with_response(
                Stage::Reconcile,
                r#"{"reasoning": "seed", "operations": [{"type": "ADD", "content": "Check units"}]}"#,
            );
        let config = Config::default();

        let run = CycleRunner::new(&store, &collaborator, &config)
            .run("math", TaskInput::new("q"))
            .unwrap();

        assert_eq!(run.outcome.state, CycleState::Done);
        let saved = store.get("math").unwrap().unwrap();
        assert_eq!(saved.cycles_completed, 1);
        assert!(saved.playbook.contains("general-00001"));
        assert_eq!(saved.last_cycle.unwrap().final_answer.as_deref(), Some("42"));
    }

    #[test]
    fn test_aborted_cycle_still_persists_tags() {
        let store = MemoryHistoryStore::new();
        let mut history = HistoryRecord::new("math");
        history.playbook.add_entry("general", "Check units", None);
        history.cycles_completed = 1;
        store.put(&history).unwrap();

        let collaborator = ScriptedCollaborator::new()
            .with_response(Stage::Produce, PRODUCE)
            .with_response(Stage::Critique, CRITIQUE)
            .with_response(Stage::Reconcile, "{}");
        let config = Config::default();

        let run = CycleRunner::new(&store, &collaborator, &config)
            .run("math", TaskInput::new("q"))
            .unwrap();

        assert_eq!(run.outcome.state, CycleState::Aborted);
        let saved = store.get("math").unwrap().unwrap();
        assert_eq!(saved.cycles_completed, 1);
        assert_eq!(saved.cycles_aborted, 1);
        assert_eq!(saved.playbook.get("general-00001").unwrap().helpful, 1);
        assert!(collaborator.requests()[2]
            .prompt
            .contains("cycle 2 (1 completed, 0 aborted)"));
    }

    #[test]
    fn test_invalid_history_id() {
        let store = MemoryHistoryStore::new();
        let collaborator = ScriptedCollaborator::new();
        let config = Config::default();

        let err = CycleRunner::new(&store, &collaborator, &config)
            .run("../x", TaskInput::new("q"))
            .unwrap_err();

        assert!(matches!(err, PlaybookError::InvalidHistoryId { .. }));
        assert!(collaborator.requests().is_empty());
    }
}
