//! Playbook - evolving strategy playbook
//!
//! A playbook is a sectioned store of short strategy entries, each with
//! helpful/harmful/neutral counters. A cycle asks a collaborator to answer a
//! task using the playbook (produce), to judge which entries mattered
//! (critique), and to propose edits (reconcile). Tags and edits are applied
//! as each stage validates, and the playbook is saved per history.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod util;

pub use config::Config;
pub use core::{
    apply, apply_tags, ApplyReport, EditBatch, EditOperation, Entry, Outcome, OutcomeTag,
    Playbook, PlaybookStats, TagReport,
};
pub use error::{PlaybookError, Result};
pub use pipeline::{
    Collaborator, CycleOutcome, CycleRunner, CycleState, Orchestrator, ScriptedCollaborator,
    Stage, TaskInput,
};
pub use storage::{FileHistoryStore, HistoryRecord, HistoryStore, MemoryHistoryStore};

// CLI commands
pub use cli::{
    ApplyCommand, CycleCommand, ExportCommand, HistoriesCommand, ImportCommand, ShowCommand,
    StatsCommand, TagCommand,
};
