//! Cycle state machine.
//!
//! A cycle moves strictly forward through
//! `Init → Produce → Critique → Reconcile → Done`. Any stage failure moves it
//! to `Aborted` instead. There are no retries and no backward transitions.
//! Critique applies outcome tags and Reconcile applies edits as soon as their
//! results validate, so an abort keeps whatever earlier stages changed.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::delta::EditBatch;
use crate::core::mutation::{apply_with_limit, ApplyReport};
use crate::core::playbook::Playbook;
use crate::core::tagging::{apply_tags_with_limit, TagReport};
use crate::error::PlaybookError;
use crate::pipeline::collaborator::{Collaborator, StageRequest};
use crate::pipeline::context::{
    CycleContext, EventType, Progress, StageOutputs, TaskInput, TraceEvent,
};
use crate::pipeline::prompt::{critique_prompt, produce_prompt, reconcile_prompt};
use crate::pipeline::stage::{
    parse_stage_output, CritiqueResult, ProduceResult, Stage, StageOutput,
};

/// Position of a cycle in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    /// Context not yet seeded.
    #[default]
    Init,
    /// Waiting for an answer.
    Produce,
    /// Waiting for a critique of the answer.
    Critique,
    /// Waiting for playbook edits.
    Reconcile,
    /// All stages completed.
    Done,
    /// A stage failed; later stages did not run.
    Aborted,
}

impl CycleState {
    /// Check if the cycle has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleState::Done | CycleState::Aborted)
    }

    fn name(&self) -> &'static str {
        match self {
            CycleState::Init => "init",
            CycleState::Produce => "produce",
            CycleState::Critique => "critique",
            CycleState::Reconcile => "reconcile",
            CycleState::Done => "done",
            CycleState::Aborted => "aborted",
        }
    }
}

impl From<Stage> for CycleState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Produce => CycleState::Produce,
            Stage::Critique => CycleState::Critique,
            Stage::Reconcile => CycleState::Reconcile,
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a cycle stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageFailure {
    /// The collaborator call itself failed.
    Collaborator { stage: Stage, message: String },
    /// The collaborator answered, but not in the required shape.
    Schema { stage: Stage, message: String },
    /// State an earlier stage should have provided was absent.
    MissingState { state: CycleState, what: String },
}

impl StageFailure {
    /// State in which the failure happened.
    pub fn state(&self) -> CycleState {
        match self {
            StageFailure::Collaborator { stage, .. } | StageFailure::Schema { stage, .. } => {
                CycleState::from(*stage)
            }
            StageFailure::MissingState { state, .. } => *state,
        }
    }

    fn missing(stage: Stage, what: &str) -> Self {
        Self::from_error(stage, PlaybookError::missing_state(what))
    }

    fn from_error(stage: Stage, err: PlaybookError) -> Self {
        if err.is_contract_violation() {
            let what = match err {
                PlaybookError::MissingState { what } => what,
                other => other.to_string(),
            };
            return StageFailure::MissingState {
                state: CycleState::from(stage),
                what,
            };
        }

        match err {
            PlaybookError::Schema { message, .. } => StageFailure::Schema { stage, message },
            other => StageFailure::Collaborator {
                stage,
                message: other.to_string(),
            },
        }
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageFailure::Collaborator { stage, message } => {
                write!(f, "{} collaborator failed: {}", stage, message)
            }
            StageFailure::Schema { stage, message } => {
                write!(f, "{} output rejected: {}", stage, message)
            }
            StageFailure::MissingState { state, what } => {
                write!(f, "{} state is missing {}", state, what)
            }
        }
    }
}

/// Everything a finished cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    /// `Done` or `Aborted`.
    pub state: CycleState,
    /// Set when the cycle aborted.
    pub failure: Option<StageFailure>,
    /// The playbook after every mutation that happened.
    pub playbook: Playbook,
    /// Results of the stages that completed.
    pub outputs: StageOutputs,
    pub tag_report: Option<TagReport>,
    pub apply_report: Option<ApplyReport>,
    /// Human-readable summary of tags and edits, set when the cycle completed.
    pub summary: Option<String>,
    pub trace: Vec<TraceEvent>,
}

impl CycleOutcome {
    /// Whether every stage completed.
    pub fn is_completed(&self) -> bool {
        self.state == CycleState::Done
    }
}

/// Runs cycles against a collaborator.
///
/// The orchestrator holds no cycle state of its own; each cycle's state
/// lives in its [`CycleContext`].
#[derive(Debug)]
pub struct Orchestrator<'a, C: Collaborator + ?Sized> {
    collaborator: &'a C,
    config: &'a Config,
}

impl<'a, C: Collaborator + ?Sized> Orchestrator<'a, C> {
    /// Create an orchestrator.
    pub fn new(collaborator: &'a C, config: &'a Config) -> Self {
        Self {
            collaborator,
            config,
        }
    }

    /// Run one cycle for a task.
    ///
    /// `playbook` is `None` for a fresh history; Init seeds an empty one.
    pub fn run_cycle(
        &self,
        task: TaskInput,
        playbook: Option<Playbook>,
        progress: Progress,
    ) -> CycleOutcome {
        let mut ctx = CycleContext::new(task, progress);
        ctx.playbook = playbook;
        self.run(ctx)
    }

    /// Drive a prepared context from `Init` to a terminal state.
    pub fn run(&self, mut ctx: CycleContext) -> CycleOutcome {
        info!(
            "Starting {} with {}",
            ctx.progress,
            self.collaborator.name()
        );

        let mut state = CycleState::Init;
        let mut failure = None;
        while !state.is_terminal() {
            match self.step(state, &mut ctx) {
                Ok(next) => state = next,
                Err(stage_failure) => {
                    self.record_failure(&mut ctx, &stage_failure);
                    failure = Some(stage_failure);
                    state = CycleState::Aborted;
                }
            }
        }

        let summary = if state == CycleState::Done {
            Some(self.finish(&mut ctx))
        } else {
            None
        };

        CycleOutcome {
            state,
            failure,
            playbook: ctx.playbook.unwrap_or_default(),
            outputs: ctx.outputs,
            tag_report: ctx.tag_report,
            apply_report: ctx.apply_report,
            summary,
            trace: ctx.trace,
        }
    }

    /// Run the work for `state` and return the next state.
    ///
    /// Terminal states are returned unchanged.
    pub fn step(
        &self,
        state: CycleState,
        ctx: &mut CycleContext,
    ) -> Result<CycleState, StageFailure> {
        match state {
            CycleState::Init => {
                self.init(ctx);
                Ok(CycleState::Produce)
            }
            CycleState::Produce => {
                self.produce(ctx)?;
                Ok(CycleState::Critique)
            }
            CycleState::Critique => {
                self.critique(ctx)?;
                Ok(CycleState::Reconcile)
            }
            CycleState::Reconcile => {
                self.reconcile(ctx)?;
                Ok(CycleState::Done)
            }
            CycleState::Done | CycleState::Aborted => Ok(state),
        }
    }

    // =========================================================================
    // Stages
    // =========================================================================

    fn init(&self, ctx: &mut CycleContext) {
        let question = ctx.task.question.clone();
        ctx.add_trace(EventType::CycleStarted, Some(question));

        if ctx.playbook.is_none() {
            debug!("No playbook for this history, seeding an empty one");
            ctx.playbook = Some(Playbook::new());
            ctx.add_trace(EventType::PlaybookSeeded, None);
        }
    }

    fn produce(&self, ctx: &mut CycleContext) -> Result<(), StageFailure> {
        let playbook = ctx
            .playbook
            .as_ref()
            .ok_or_else(|| StageFailure::missing(Stage::Produce, "playbook"))?;

        let prompt = produce_prompt(playbook, &ctx.task);
        let result: ProduceResult = self.call(Stage::Produce, prompt)?;

        ctx.add_trace(
            EventType::StageCompleted,
            Some(format!(
                "produce: answer cites {} entr{}",
                result.referenced_entry_ids.len(),
                if result.referenced_entry_ids.len() == 1 { "y" } else { "ies" }
            )),
        );
        ctx.outputs.produce = Some(result);
        Ok(())
    }

    fn critique(&self, ctx: &mut CycleContext) -> Result<(), StageFailure> {
        let prompt = {
            let playbook = ctx
                .playbook
                .as_ref()
                .ok_or_else(|| StageFailure::missing(Stage::Critique, "playbook"))?;
            let produce = ctx
                .outputs
                .produce
                .as_ref()
                .ok_or_else(|| StageFailure::missing(Stage::Critique, "produce result"))?;
            critique_prompt(playbook, &ctx.task, produce)
        };

        let result: CritiqueResult = self.call(Stage::Critique, prompt)?;

        let playbook = ctx
            .playbook
            .as_mut()
            .ok_or_else(|| StageFailure::missing(Stage::Critique, "playbook"))?;
        let report =
            apply_tags_with_limit(playbook, &result.entry_tags, self.config.pipeline.max_tags);

        ctx.add_trace(
            EventType::TagsApplied,
            Some(format!(
                "{} applied, {} skipped",
                report.applied_count(),
                report.skipped_count()
            )),
        );
        ctx.outputs.critique = Some(result);
        ctx.tag_report = Some(report);
        Ok(())
    }

    fn reconcile(&self, ctx: &mut CycleContext) -> Result<(), StageFailure> {
        let prompt = {
            let playbook = ctx
                .playbook
                .as_ref()
                .ok_or_else(|| StageFailure::missing(Stage::Reconcile, "playbook"))?;
            let produce = ctx
                .outputs
                .produce
                .as_ref()
                .ok_or_else(|| StageFailure::missing(Stage::Reconcile, "produce result"))?;
            let critique = ctx
                .outputs
                .critique
                .as_ref()
                .ok_or_else(|| StageFailure::missing(Stage::Reconcile, "critique result"))?;
            reconcile_prompt(
                playbook,
                &ctx.task,
                produce,
                critique,
                ctx.progress,
                self.config.pipeline.max_operations,
            )
        };

        let batch: EditBatch = self.call(Stage::Reconcile, prompt)?;

        let playbook = ctx
            .playbook
            .as_mut()
            .ok_or_else(|| StageFailure::missing(Stage::Reconcile, "playbook"))?;
        let report = apply_with_limit(playbook, &batch, self.config.pipeline.max_operations);

        ctx.add_trace(
            EventType::EditsApplied,
            Some(format!(
                "{} applied, {} skipped",
                report.applied_count(),
                report.skipped_count()
            )),
        );
        ctx.outputs.reconcile = Some(batch);
        ctx.apply_report = Some(report);
        Ok(())
    }

    fn finish(&self, ctx: &mut CycleContext) -> String {
        let summary = render_summary(ctx.tag_report.as_ref(), ctx.apply_report.as_ref());
        info!("Cycle complete\n{}", summary);
        ctx.add_trace(EventType::CycleSummary, Some(summary.clone()));
        summary
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn model_for(&self, stage: Stage) -> &str {
        match stage {
            Stage::Produce => &self.config.models.generator,
            Stage::Critique => &self.config.models.reflector,
            Stage::Reconcile => &self.config.models.curator,
        }
    }

    fn call<T: StageOutput>(&self, stage: Stage, prompt: String) -> Result<T, StageFailure> {
        let request = StageRequest {
            stage,
            model: self.model_for(stage).to_string(),
            prompt,
        };
        debug!("Calling {} for {} ({})", self.collaborator.name(), stage, request.model);

        let text = self
            .collaborator
            .respond(&request)
            .map_err(|e| StageFailure::from_error(stage, e))?;
        parse_stage_output(stage, &text).map_err(|e| StageFailure::from_error(stage, e))
    }

    fn record_failure(&self, ctx: &mut CycleContext, failure: &StageFailure) {
        match failure {
            StageFailure::MissingState { .. } => error!("Cycle aborted: {}", failure),
            _ => warn!("Cycle aborted: {}", failure),
        }
        ctx.add_trace(EventType::StageFailed, Some(failure.to_string()));
        ctx.add_trace(EventType::CycleAborted, Some(failure.state().to_string()));
    }
}

/// Summary of the tags and edits a cycle applied.
pub fn render_summary(tags: Option<&TagReport>, edits: Option<&ApplyReport>) -> String {
    let mut lines = vec!["[critique] Entry tagging results:".to_string()];
    match tags.map(TagReport::summary_lines) {
        Some(tag_lines) if !tag_lines.is_empty() => lines.extend(tag_lines),
        _ => lines.push("- (none)".to_string()),
    }

    lines.push("[reconcile] Playbook changes:".to_string());
    match edits.map(ApplyReport::summary_lines) {
        Some(edit_lines) if !edit_lines.is_empty() => lines.extend(edit_lines),
        _ => lines.push("- (none)".to_string()),
    }

    lines.join("\n")
}
