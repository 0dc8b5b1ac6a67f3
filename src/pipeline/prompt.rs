//! Prompt builders for each stage.
//!
//! Every prompt ends with the exact JSON shape the stage parser accepts.

use crate::core::playbook::Playbook;
use crate::pipeline::context::{Progress, TaskInput};
use crate::pipeline::stage::{CritiqueResult, ProduceResult};

const PRODUCE_FORMAT: &str = r#"{
  "reasoning": ["<step>", "<step>"],
  "bullet_ids": ["<id of each playbook entry you used>"],
  "final_answer": "<your answer>",
  "tools_used": []
}"#;

const CRITIQUE_FORMAT: &str = r#"{
  "reasoning": "<how you judged the answer>",
  "error_identification": "<what went wrong, or 'none'>",
  "root_cause_analysis": "<why it went wrong>",
  "correct_approach": "<what should have been done>",
  "key_insight": "<the reusable lesson>",
  "bullet_tags": [{"id": "<entry id>", "tag": "helpful|harmful|neutral"}]
}"#;

const RECONCILE_FORMAT: &str = r#"{
  "reasoning": "<why these changes>",
  "operations": [
    {"type": "ADD", "section": "<section>", "content": "<new entry>"},
    {"type": "UPDATE", "bullet_id": "<existing id>", "content": "<improved entry>"},
    {"type": "REMOVE", "bullet_id": "<existing id>"}
  ]
}"#;

fn task_block(task: &TaskInput) -> String {
    match &task.context {
        Some(context) => format!("Task:\n{}\n\nContext:\n{}", task.question, context),
        None => format!("Task:\n{}", task.question),
    }
}

/// Prompt asking for an answer that cites the playbook entries it used.
pub fn produce_prompt(playbook: &Playbook, task: &TaskInput) -> String {
    format!(
        "You answer tasks using a playbook of accumulated strategies.\n\
         Cite the id of every playbook entry you relied on.\n\
         \n\
         Playbook:\n{}\n\
         \n\
         {}\n\
         \n\
         Respond with a single JSON object and nothing else:\n{}\n",
        playbook.render(),
        task_block(task),
        PRODUCE_FORMAT
    )
}

/// Prompt asking for a diagnosis of the answer and a verdict per cited entry.
pub fn critique_prompt(playbook: &Playbook, task: &TaskInput, produce: &ProduceResult) -> String {
    let ground_truth = task.ground_truth.as_deref().unwrap_or("(not available)");
    format!(
        "You review an answer and the playbook entries behind it.\n\
         Tag each cited entry helpful, harmful or neutral for this task.\n\
         \n\
         {}\n\
         \n\
         Reasoning:\n{}\n\
         \n\
         Answer: {}\n\
         Ground truth: {}\n\
         \n\
         Cited entries:\n{}\n\
         \n\
         Respond with a single JSON object and nothing else:\n{}\n",
        task_block(task),
        produce.reasoning.join("\n"),
        produce.final_answer,
        ground_truth,
        playbook.render_excerpt(&produce.referenced_entry_ids),
        CRITIQUE_FORMAT
    )
}

/// Prompt asking for a small set of playbook edits.
///
/// `max_operations` of 0 leaves the batch size unconstrained.
pub fn reconcile_prompt(
    playbook: &Playbook,
    task: &TaskInput,
    produce: &ProduceResult,
    critique: &CritiqueResult,
    progress: Progress,
    max_operations: usize,
) -> String {
    let limit = if max_operations > 0 {
        format!("Propose at most {} operations.\n", max_operations)
    } else {
        String::new()
    };
    format!(
        "You curate the playbook. Add only material that is missing, \
         improve entries that are wrong, and remove duplicates.\n\
         Never rewrite the whole playbook.\n\
         {}\
         \n\
         Progress: {}\n\
         Playbook stats: {}\n\
         \n\
         Critique:\n\
         - error: {}\n\
         - root cause: {}\n\
         - correct approach: {}\n\
         - key insight: {}\n\
         \n\
         Current playbook:\n{}\n\
         \n\
         {}\n\
         Answer given: {}\n\
         \n\
         Respond with a single JSON object and nothing else. \
         Use an empty operations list when nothing should change:\n{}\n",
        limit,
        progress,
        playbook.stats(),
        critique.error_analysis,
        critique.root_cause,
        critique.correct_approach,
        critique.key_insight,
        playbook.render(),
        task_block(task),
        produce.final_answer,
        RECONCILE_FORMAT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::playbook::EMPTY_PLAYBOOK;

    fn produce() -> ProduceResult {
        ProduceResult {
            reasoning: vec!["convert".to_string(), "multiply".to_string()],
            referenced_entry_ids: vec!["a-00001".to_string()],
            final_answer: "42 m".to_string(),
            tools_used: vec![],
        }
    }

    fn critique() -> CritiqueResult {
        CritiqueResult {
            reasoning: "r".to_string(),
            error_analysis: "wrong unit".to_string(),
            root_cause: "skipped conversion".to_string(),
            correct_approach: "convert first".to_string(),
            key_insight: "check units".to_string(),
            entry_tags: vec![],
        }
    }

    #[test]
    fn test_produce_prompt_includes_playbook_and_task() {
        let mut playbook = Playbook::new();
        playbook.add_entry("a", "Always check units", None);
        let task = TaskInput::new("How far?").with_context("metric only");

        let prompt = produce_prompt(&playbook, &task);

        assert!(prompt.contains("[a-00001] Always check units"));
        assert!(prompt.contains("How far?"));
        assert!(prompt.contains("metric only"));
        assert!(prompt.contains("\"bullet_ids\""));
    }

    #[test]
    fn test_produce_prompt_empty_playbook() {
        let prompt = produce_prompt(&Playbook::new(), &TaskInput::new("q"));
        assert!(prompt.contains(EMPTY_PLAYBOOK));
    }

    #[test]
    fn test_critique_prompt_excerpt_and_ground_truth() {
        let mut playbook = Playbook::new();
        playbook.add_entry("a", "Always check units", None);
        playbook.add_entry("b", "Unrelated", None);

        let with_truth = critique_prompt(
            &playbook,
            &TaskInput::new("q").with_ground_truth("42 km"),
            &produce(),
        );
        assert!(with_truth.contains("Ground truth: 42 km"));
        assert!(with_truth.contains("Always check units"));
        assert!(!with_truth.contains("Unrelated"));
        assert!(with_truth.contains("convert\nmultiply"));

        let without = critique_prompt(&playbook, &TaskInput::new("q"), &produce());
        assert!(without.contains("Ground truth: (not available)"));
    }

    #[test]
    fn test_reconcile_prompt_limit_and_progress() {
        let playbook = Playbook::new();
        let progress = Progress {
            cycles_completed: 1,
            cycles_aborted: 0,
        };

        let limited = reconcile_prompt(
            &playbook,
            &TaskInput::new("q"),
            &produce(),
            &critique(),
            progress,
            3,
        );
        assert!(limited.contains("at most 3 operations"));
        assert!(limited.contains("cycle 2 (1 completed, 0 aborted)"));
        assert!(limited.contains("key insight: check units"));

        let unlimited = reconcile_prompt(
            &playbook,
            &TaskInput::new("q"),
            &produce(),
            &critique(),
            progress,
            0,
        );
        assert!(!unlimited.contains("at most"));
    }
}
