//! The learning cycle: Produce, Critique, Reconcile.
//!
//! Each cycle asks a collaborator to answer a task with the playbook, to
//! critique that answer, and to propose playbook edits. Tags and edits are
//! applied as each stage's result validates.

pub mod collaborator;
pub mod context;
pub mod orchestrator;
pub mod prompt;
pub mod runner;
pub mod stage;

pub use collaborator::{Collaborator, ScriptedCollaborator, StageRequest};
pub use context::{CycleContext, EventType, Progress, StageOutputs, TaskInput, TraceEvent};
pub use orchestrator::{render_summary, CycleOutcome, CycleState, Orchestrator, StageFailure};
pub use runner::{CycleRun, CycleRunner};
pub use stage::{parse_stage_output, strip_code_fence, CritiqueResult, ProduceResult, Stage};
