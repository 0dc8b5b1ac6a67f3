//! Stage names and the structured results each stage must return.
//!
//! Collaborator output is untrusted text. It becomes a typed result only
//! through [`parse_stage_output`], which strips a Markdown code fence,
//! deserializes, and runs the per-result `validate` check. Anything that
//! fails is a schema violation for that stage.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::delta::EditBatch;
use crate::core::entry::OutcomeTag;
use crate::error::{PlaybookError, Result};

/// A collaborator-backed stage of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Answer the task using the playbook.
    Produce,
    /// Judge the answer and tag the entries it used.
    Critique,
    /// Propose playbook edits from the critique.
    Reconcile,
}

impl Stage {
    /// All stages in execution order.
    pub fn all() -> [Stage; 3] {
        [Stage::Produce, Stage::Critique, Stage::Reconcile]
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Produce => "produce",
            Stage::Critique => "critique",
            Stage::Reconcile => "reconcile",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = PlaybookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "produce" | "generator" => Ok(Stage::Produce),
            "critique" | "reflector" => Ok(Stage::Critique),
            "reconcile" | "curator" => Ok(Stage::Reconcile),
            other => Err(PlaybookError::config(format!("unknown stage '{}'", other))),
        }
    }
}

/// Result of the produce stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceResult {
    /// Reasoning steps. A single string on the wire becomes one step.
    #[serde(deserialize_with = "string_or_steps")]
    pub reasoning: Vec<String>,
    /// Ids of the entries the answer relied on.
    #[serde(default, rename = "bullet_ids", alias = "referenced_entry_ids")]
    pub referenced_entry_ids: Vec<String>,
    /// The answer itself.
    pub final_answer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,
}

/// Result of the critique stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CritiqueResult {
    pub reasoning: String,
    #[serde(rename = "error_identification", alias = "error_analysis")]
    pub error_analysis: String,
    #[serde(rename = "root_cause_analysis", alias = "root_cause")]
    pub root_cause: String,
    pub correct_approach: String,
    pub key_insight: String,
    /// Verdicts for entries the produce stage referenced.
    #[serde(default, rename = "bullet_tags", alias = "entry_tags")]
    pub entry_tags: Vec<OutcomeTag>,
}

/// Checks a deserialized result beyond what its shape guarantees.
pub trait StageOutput: DeserializeOwned {
    /// Reject results that deserialize but cannot drive the next stage.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl StageOutput for ProduceResult {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.final_answer.trim().is_empty() {
            return Err("final_answer is empty".to_string());
        }
        Ok(())
    }
}

impl StageOutput for CritiqueResult {}

impl StageOutput for EditBatch {}

#[derive(Deserialize)]
#[serde(untagged)]
enum Steps {
    One(String),
    Many(Vec<String>),
}

fn string_or_steps<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Steps::deserialize(deserializer)? {
        Steps::One(step) => vec![step],
        Steps::Many(steps) => steps,
    })
}

/// Remove a surrounding Markdown code fence, if any.
///
/// Handles both bare fences and fences with a language tag (```json).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse and validate raw collaborator text as the result for `stage`.
pub fn parse_stage_output<T: StageOutput>(stage: Stage, text: &str) -> Result<T> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(PlaybookError::schema(stage.as_str(), "empty response"));
    }

    let parsed: T = serde_json::from_str(body)
        .map_err(|e| PlaybookError::schema(stage.as_str(), e.to_string()))?;
    parsed
        .validate()
        .map_err(|message| PlaybookError::schema(stage.as_str(), message))?;
    Ok(parsed)
}
