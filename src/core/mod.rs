//! Core playbook types and engines.
//!
//! This module contains the entry store, the edit batch types, and the two
//! engines that mutate the store: the mutation engine (ADD/UPDATE/REMOVE)
//! and the outcome tagging engine (helpful/harmful/neutral counters).

pub mod delta;
pub mod entry;
pub mod mutation;
pub mod playbook;
pub mod tagging;

pub use delta::{EditBatch, EditOperation, OperationError, RawOperation};
pub use entry::{Entry, Outcome, OutcomeTag, DEFAULT_SECTION};
pub use mutation::{apply, apply_with_limit, ApplyReport, OperationOutcome, OperationStatus, SkipReason};
pub use playbook::{Playbook, PlaybookStats, TagTotals, EMPTY_PLAYBOOK};
pub use tagging::{apply_tags, apply_tags_with_limit, TagReport};
