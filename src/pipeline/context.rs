//! Shared state threaded through one cycle.
//!
//! The context is passed explicitly from stage to stage. Each stage reads
//! what earlier stages stored and records its own typed result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::delta::EditBatch;
use crate::core::mutation::ApplyReport;
use crate::core::playbook::Playbook;
use crate::core::tagging::TagReport;
use crate::pipeline::stage::{CritiqueResult, ProduceResult, Stage};

/// The task a cycle works on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInput {
    /// The question or instruction to answer.
    pub question: String,
    /// Extra context supplied with the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Known correct answer, shown to the critique stage when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
}

impl TaskInput {
    /// Create a task from a question.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: None,
            ground_truth: None,
        }
    }

    /// Attach extra context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach the known correct answer.
    pub fn with_ground_truth(mut self, ground_truth: impl Into<String>) -> Self {
        self.ground_truth = Some(ground_truth.into());
        self
    }
}

/// How far a history has come, shown to the reconcile stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub cycles_completed: u32,
    pub cycles_aborted: u32,
}

impl Progress {
    /// 1-based number of the cycle about to run.
    pub fn current_cycle(&self) -> u32 {
        self.cycles_completed + self.cycles_aborted + 1
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cycle {} ({} completed, {} aborted)",
            self.current_cycle(),
            self.cycles_completed,
            self.cycles_aborted
        )
    }
}

/// Typed results recorded by completed stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produce: Option<ProduceResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<CritiqueResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconcile: Option<EditBatch>,
}

impl StageOutputs {
    /// Stages that have recorded a result, in execution order.
    pub fn completed(&self) -> Vec<Stage> {
        Stage::all()
            .into_iter()
            .filter(|stage| match stage {
                Stage::Produce => self.produce.is_some(),
                Stage::Critique => self.critique.is_some(),
                Stage::Reconcile => self.reconcile.is_some(),
            })
            .collect()
    }
}

/// A timestamped record of something that happened during a cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEvent {
    /// Type of event.
    pub event_type: EventType,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Optional details.
    pub details: Option<String>,
}

impl TraceEvent {
    /// Create a new trace event.
    pub fn new(event_type: EventType, details: Option<String>) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            details,
        }
    }
}

/// Event type enum for trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CycleStarted,
    PlaybookSeeded,
    StageCompleted,
    TagsApplied,
    EditsApplied,
    StageFailed,
    CycleSummary,
    CycleAborted,
}

/// Everything one cycle reads and writes.
#[derive(Debug, Clone)]
pub struct CycleContext {
    /// The task being worked on.
    pub task: TaskInput,
    /// The playbook, owned by the cycle until it finishes.
    pub playbook: Option<Playbook>,
    /// Results of completed stages.
    pub outputs: StageOutputs,
    /// Tags applied by the critique stage.
    pub tag_report: Option<TagReport>,
    /// Edits applied by the reconcile stage.
    pub apply_report: Option<ApplyReport>,
    /// Progress of the history this cycle belongs to.
    pub progress: Progress,
    /// Trace events for this cycle.
    pub trace: Vec<TraceEvent>,
}

impl CycleContext {
    /// Create a context for a task. The playbook is attached separately.
    pub fn new(task: TaskInput, progress: Progress) -> Self {
        Self {
            task,
            playbook: None,
            outputs: StageOutputs::default(),
            tag_report: None,
            apply_report: None,
            progress,
            trace: Vec::new(),
        }
    }

    /// Attach an existing playbook.
    pub fn with_playbook(mut self, playbook: Playbook) -> Self {
        self.playbook = Some(playbook);
        self
    }

    /// Add a trace event.
    pub fn add_trace(&mut self, event_type: EventType, details: Option<String>) {
        self.trace.push(TraceEvent::new(event_type, details));
    }
}
