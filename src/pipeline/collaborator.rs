//! The reasoning collaborator boundary.
//!
//! A collaborator turns a rendered prompt into raw text. The pipeline never
//! trusts that text: it is validated per stage in
//! [`crate::pipeline::stage::parse_stage_output`].

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{PlaybookError, Result};
use crate::pipeline::stage::Stage;
use crate::util::read_to_string_with_limit;

/// Largest scripted responses file accepted (1 MB).
const MAX_SCRIPT_SIZE: u64 = 1024 * 1024;

/// One request sent to a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRequest {
    /// Stage issuing the request.
    pub stage: Stage,
    /// Model configured for the stage.
    pub model: String,
    /// Fully rendered prompt.
    pub prompt: String,
}

/// Trait for anything that can answer stage prompts.
///
/// Calls are synchronous. Implementations must be thread-safe so one
/// collaborator can serve several histories.
pub trait Collaborator: Send + Sync {
    /// Answer a stage request with raw text.
    fn respond(&self, request: &StageRequest) -> Result<String>;

    /// Collaborator name for logging.
    fn name(&self) -> &'static str;
}

/// Blanket implementation for boxed trait objects.
impl Collaborator for Box<dyn Collaborator> {
    fn respond(&self, request: &StageRequest) -> Result<String> {
        (**self).respond(request)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Replays canned responses per stage, in order.
///
/// Each stage has its own queue. A stage whose queue is empty fails with a
/// collaborator error. Every request is recorded for inspection.
#[derive(Debug, Default)]
pub struct ScriptedCollaborator {
    responses: Mutex<HashMap<Stage, VecDeque<String>>>,
    requests: Mutex<Vec<StageRequest>>,
}

impl ScriptedCollaborator {
    /// Create a collaborator with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a stage.
    pub fn with_response(self, stage: Stage, response: impl Into<String>) -> Self {
        self.push(stage, response);
        self
    }

    /// Queue a response for a stage.
    pub fn push(&self, stage: Stage, response: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.entry(stage).or_default().push_back(response.into());
        }
    }

    /// Build from a JSON object keyed by stage name.
    ///
    /// A string value is replayed verbatim; an array queues each element;
    /// any other value is replayed as its JSON text.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(PlaybookError::serde(
                "scripted responses must be a JSON object keyed by stage",
            ));
        };

        let collaborator = Self::new();
        for (key, value) in map {
            let stage: Stage = key.parse()?;
            let items = match value {
                serde_json::Value::Array(items) => items,
                other => vec![other],
            };
            for item in items {
                let text = match item {
                    serde_json::Value::String(text) => text,
                    other => serde_json::to_string(&other)?,
                };
                collaborator.push(stage, text);
            }
        }
        Ok(collaborator)
    }

    /// Load scripted responses from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = read_to_string_with_limit(path, MAX_SCRIPT_SIZE)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        Self::from_json(value)
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<StageRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Responses still queued for a stage.
    pub fn remaining(&self, stage: Stage) -> usize {
        self.responses
            .lock()
            .map(|responses| responses.get(&stage).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }
}

impl Collaborator for ScriptedCollaborator {
    fn respond(&self, request: &StageRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| PlaybookError::collaborator("scripted responses lock poisoned"))?;
        responses
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                PlaybookError::collaborator(format!(
                    "no scripted response left for {} stage",
                    request.stage
                ))
            })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn request(stage: Stage) -> StageRequest {
        StageRequest {
            stage,
            model: "test-model".to_string(),
            prompt: "prompt".to_string(),
        }
    }

    #[test]
    fn test_replays_in_order_per_stage() {
        let collaborator = ScriptedCollaborator::new()
            .with_response(Stage::Produce, "first")
            .with_response(Stage::Produce, "second")
            .with_response(Stage::Critique, "critique");

        assert_eq!(collaborator.respond(&request(Stage::Produce)).unwrap(), "first");
        assert_eq!(collaborator.respond(&request(Stage::Critique)).unwrap(), "critique");
        assert_eq!(collaborator.respond(&request(Stage::Produce)).unwrap(), "second");
        assert_eq!(collaborator.remaining(Stage::Produce), 0);
        assert_eq!(collaborator.requests().len(), 3);
    }

    #[test]
    fn test_exhausted_stage_is_collaborator_error() {
        let collaborator = ScriptedCollaborator::new();
        let err = collaborator.respond(&request(Stage::Reconcile)).unwrap_err();
        assert!(matches!(err, PlaybookError::Collaborator { .. }));
        assert!(err.to_string().contains("reconcile"));
    }

    #[test]
    fn test_from_json_value_kinds() {
        let collaborator = ScriptedCollaborator::from_json(serde_json::json!({
            "produce": {"reasoning": "r", "final_answer": "a"},
            "critique": "raw text",
            "curator": [{"reasoning": "one"}, {"reasoning": "two"}]
        }))
        .unwrap();

        let produce = collaborator.respond(&request(Stage::Produce)).unwrap();
        assert!(produce.contains("\"final_answer\":\"a\""));
        assert_eq!(collaborator.respond(&request(Stage::Critique)).unwrap(), "raw text");
        assert_eq!(collaborator.remaining(Stage::Reconcile), 2);
    }

    #[test]
    fn test_from_json_rejects_unknown_stage() {
        assert!(ScriptedCollaborator::from_json(serde_json::json!({"judge": "x"})).is_err());
        assert!(ScriptedCollaborator::from_json(serde_json::json!(["x"])).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("responses.json");
        fs::write(&path, r#"{"reconcile": {"reasoning": "nothing", "operations": []}}"#).unwrap();

        let collaborator = ScriptedCollaborator::from_file(&path).unwrap();
        assert_eq!(collaborator.remaining(Stage::Reconcile), 1);
        assert_eq!(collaborator.name(), "scripted");
    }
}
