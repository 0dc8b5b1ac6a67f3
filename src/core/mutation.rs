//! Mutation engine: applies an edit batch to a playbook.
//!
//! Operations run strictly in batch order, so a later UPDATE sees the effect
//! of an earlier ADD in the same batch. Each operation stands alone: one that
//! cannot apply is skipped and never rolls back the ones before it. Edits
//! come from a language model and may name entries that do not exist; those
//! are expected, so skips are logged at `warn` and reported per operation
//! rather than returned as errors.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::delta::{EditBatch, EditOperation};
use crate::core::playbook::Playbook;

/// Why an operation was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// UPDATE or REMOVE named an id that is not in the playbook.
    UnknownId,
    /// UPDATE carried no content.
    EmptyContent,
    /// The batch exceeded the configured operation limit.
    OverLimit,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnknownId => write!(f, "unknown id"),
            SkipReason::EmptyContent => write!(f, "empty content"),
            SkipReason::OverLimit => write!(f, "over operation limit"),
        }
    }
}

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationStatus {
    /// The operation changed the playbook; `id` is the affected entry.
    Applied { id: String },
    /// The operation was skipped.
    Skipped { reason: SkipReason },
}

/// An operation paired with what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation: EditOperation,
    #[serde(flatten)]
    pub status: OperationStatus,
}

impl OperationOutcome {
    /// Whether the operation changed the playbook.
    pub fn is_applied(&self) -> bool {
        matches!(self.status, OperationStatus::Applied { .. })
    }
}

/// Per-operation outcomes for one batch, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub outcomes: Vec<OperationOutcome>,
}

impl ApplyReport {
    /// Number of operations that changed the playbook.
    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    /// Number of operations that were skipped.
    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.applied_count()
    }

    /// One line per operation, for trace output.
    pub fn summary_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|outcome| match &outcome.status {
                OperationStatus::Applied { .. } => format!("- {}", outcome.operation),
                OperationStatus::Skipped { reason } => {
                    format!("- {} (skipped: {})", outcome.operation, reason)
                }
            })
            .collect()
    }
}

/// Apply every operation of a batch.
pub fn apply(playbook: &mut Playbook, batch: &EditBatch) -> ApplyReport {
    apply_with_limit(playbook, batch, 0)
}

/// Apply at most `max_operations` operations of a batch (0 = no limit).
///
/// Operations past the limit are reported as skipped with
/// [`SkipReason::OverLimit`].
pub fn apply_with_limit(
    playbook: &mut Playbook,
    batch: &EditBatch,
    max_operations: usize,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for (index, operation) in batch.operations.iter().enumerate() {
        let status = if max_operations > 0 && index >= max_operations {
            OperationStatus::Skipped {
                reason: SkipReason::OverLimit,
            }
        } else {
            apply_operation(playbook, operation)
        };

        match &status {
            OperationStatus::Applied { id } => {
                debug!("{} applied to {}", operation.kind(), id);
            }
            OperationStatus::Skipped { reason } => {
                warn!(
                    "{} {} skipped: {}",
                    operation.kind(),
                    operation.target_id().unwrap_or("(new)"),
                    reason
                );
            }
        }

        report.outcomes.push(OperationOutcome {
            operation: operation.clone(),
            status,
        });
    }

    report
}

/// Apply a single operation.
pub fn apply_operation(playbook: &mut Playbook, operation: &EditOperation) -> OperationStatus {
    match operation {
        EditOperation::Add {
            section,
            content,
            id,
        } => {
            let entry = playbook.add_entry(section, content, id.as_deref());
            OperationStatus::Applied {
                id: entry.id.clone(),
            }
        }
        EditOperation::Update { id, content } => {
            if content.is_empty() {
                return OperationStatus::Skipped {
                    reason: SkipReason::EmptyContent,
                };
            }
            match playbook.update_entry(id, content) {
                Some(entry) => OperationStatus::Applied {
                    id: entry.id.clone(),
                },
                None => OperationStatus::Skipped {
                    reason: SkipReason::UnknownId,
                },
            }
        }
        EditOperation::Remove { id } => match playbook.remove_entry(id) {
            Some(entry) => OperationStatus::Applied { id: entry.id },
            None => OperationStatus::Skipped {
                reason: SkipReason::UnknownId,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(operations: Vec<EditOperation>) -> EditBatch {
        EditBatch::new("test", operations)
    }

    #[test]
    fn test_add_to_empty_playbook() {
        let mut playbook = Playbook::new();
        let report = apply(
            &mut playbook,
            &batch(vec![EditOperation::add("general", "Always check units")]),
        );

        let entry = playbook.get("general-00001").unwrap();
        assert_eq!(entry.content, "Always check units");
        assert_eq!((entry.helpful, entry.harmful, entry.neutral), (0, 0, 0));
        assert_eq!(report.applied_count(), 1);
        assert_eq!(
            report.outcomes[0].status,
            OperationStatus::Applied {
                id: "general-00001".to_string()
            }
        );
    }

    #[test]
    fn test_update_sees_add_from_same_batch() {
        let mut playbook = Playbook::new();
        apply(
            &mut playbook,
            &batch(vec![
                EditOperation::add("general", "draft"),
                EditOperation::update("general-00001", "final"),
            ]),
        );

        assert_eq!(playbook.get("general-00001").unwrap().content, "final");
    }

    #[test]
    fn test_update_existing_changes_content_and_timestamp() {
        let mut playbook = Playbook::new();
        playbook.add_entry("general", "Always check units", None);
        let before = playbook.get("general-00001").unwrap().clone();

        std::thread::sleep(std::time::Duration::from_millis(5));
        apply(
            &mut playbook,
            &batch(vec![EditOperation::update("general-00001", "X")]),
        );

        let after = playbook.get("general-00001").unwrap();
        assert_eq!(after.content, "X");
        assert_eq!(after.id, before.id);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn test_remove_drops_empty_section() {
        let mut playbook = Playbook::new();
        playbook.add_entry("a", "one", Some("a-00001"));
        playbook.add_entry("b", "two", Some("b-00001"));

        apply(&mut playbook, &batch(vec![EditOperation::remove("a-00001")]));

        assert!(!playbook.sections().contains_key("a"));
        assert_eq!(
            playbook.sections().get("b"),
            Some(&vec!["b-00001".to_string()])
        );
    }

    #[test]
    fn test_unknown_ids_are_tolerated() {
        let mut playbook = Playbook::new();
        playbook.add_entry("a", "keep me", None);
        let untouched = playbook.clone();

        let report = apply(
            &mut playbook,
            &batch(vec![
                EditOperation::update("ghost", "x"),
                EditOperation::remove("phantom"),
            ]),
        );

        assert_eq!(playbook, untouched);
        assert_eq!(report.applied_count(), 0);
        assert_eq!(report.skipped_count(), 2);
        assert!(report.outcomes.iter().all(|o| o.status
            == OperationStatus::Skipped {
                reason: SkipReason::UnknownId
            }));
    }

    #[test]
    fn test_skip_does_not_roll_back_earlier_operations() {
        let mut playbook = Playbook::new();
        let report = apply(
            &mut playbook,
            &batch(vec![
                EditOperation::add("general", "kept"),
                EditOperation::remove("ghost"),
                EditOperation::add("general", "also kept"),
            ]),
        );

        assert_eq!(playbook.len(), 2);
        assert_eq!(report.applied_count(), 2);
        assert_eq!(report.skipped_count(), 1);
    }

    #[test]
    fn test_update_with_empty_content_is_skipped() {
        let mut playbook = Playbook::new();
        playbook.add_entry("a", "original", None);

        let report = apply(&mut playbook, &batch(vec![EditOperation::update("a-00001", "")]));

        assert_eq!(playbook.get("a-00001").unwrap().content, "original");
        assert_eq!(
            report.outcomes[0].status,
            OperationStatus::Skipped {
                reason: SkipReason::EmptyContent
            }
        );
    }

    #[test]
    fn test_add_then_remove_in_same_batch() {
        let mut playbook = Playbook::new();
        apply(
            &mut playbook,
            &batch(vec![
                EditOperation::add("tmp", "short lived"),
                EditOperation::remove("tmp-00001"),
            ]),
        );

        assert!(playbook.is_empty());
        assert!(playbook.sections().is_empty());
        assert_eq!(playbook.next_id(), 1);
    }

    #[test]
    fn test_operation_limit() {
        let mut playbook = Playbook::new();
        let report = apply_with_limit(
            &mut playbook,
            &batch(vec![
                EditOperation::add("s", "1"),
                EditOperation::add("s", "2"),
                EditOperation::add("s", "3"),
            ]),
            2,
        );

        assert_eq!(playbook.len(), 2);
        assert_eq!(
            report.outcomes[2].status,
            OperationStatus::Skipped {
                reason: SkipReason::OverLimit
            }
        );
    }

    #[test]
    fn test_summary_lines() {
        let mut playbook = Playbook::new();
        let report = apply(
            &mut playbook,
            &batch(vec![
                EditOperation::add("general", "tip"),
                EditOperation::remove("ghost"),
            ]),
        );

        let lines = report.summary_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("- ADD"));
        assert!(lines[1].ends_with("(skipped: unknown id)"));
    }

    #[test]
    fn test_report_serialization() {
        let mut playbook = Playbook::new();
        let report = apply(&mut playbook, &batch(vec![EditOperation::remove("ghost")]));

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["outcomes"][0]["status"], "skipped");
        assert_eq!(value["outcomes"][0]["reason"], "unknown_id");
        assert_eq!(value["outcomes"][0]["operation"]["type"], "REMOVE");
    }
}
