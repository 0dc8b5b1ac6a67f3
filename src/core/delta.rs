//! Edit operations and batches proposed by the reconcile stage.
//!
//! The wire shape is loose (`{type, section?, content?, bullet_id?}`), the
//! in-memory shape is a typed enum. Conversion happens through serde's
//! `try_from`, so a batch that deserializes is already well-formed.

use serde::{Deserialize, Serialize};

use crate::core::entry::DEFAULT_SECTION;

/// A single proposed change to the playbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOperation", into = "RawOperation")]
pub enum EditOperation {
    /// Add a new entry; `id` is minted when absent.
    Add {
        section: String,
        content: String,
        id: Option<String>,
    },
    /// Replace the content of an existing entry.
    Update { id: String, content: String },
    /// Remove an existing entry.
    Remove { id: String },
}

impl EditOperation {
    /// Create an ADD operation with a minted id.
    pub fn add(section: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Add {
            section: section.into(),
            content: content.into(),
            id: None,
        }
    }

    /// Create an ADD operation with a caller-supplied id.
    pub fn add_with_id(
        section: impl Into<String>,
        content: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::Add {
            section: section.into(),
            content: content.into(),
            id: Some(id.into()),
        }
    }

    /// Create an UPDATE operation.
    pub fn update(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Update {
            id: id.into(),
            content: content.into(),
        }
    }

    /// Create a REMOVE operation.
    pub fn remove(id: impl Into<String>) -> Self {
        Self::Remove { id: id.into() }
    }

    /// Wire name of the operation type.
    pub fn kind(&self) -> &'static str {
        match self {
            EditOperation::Add { .. } => "ADD",
            EditOperation::Update { .. } => "UPDATE",
            EditOperation::Remove { .. } => "REMOVE",
        }
    }

    /// Target entry id, if the operation names one.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            EditOperation::Add { id, .. } => id.as_deref(),
            EditOperation::Update { id, .. } | EditOperation::Remove { id } => Some(id),
        }
    }
}

impl std::fmt::Display for EditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = self
            .target_id()
            .map(|id| format!("[{}]", id))
            .unwrap_or_default();
        match self {
            EditOperation::Add {
                section, content, ..
            } => write!(f, "{:6} {:12} {:15} {}", self.kind(), section, target, content),
            EditOperation::Update { content, .. } => {
                write!(f, "{:6} {:12} {:15} {}", self.kind(), "", target, content)
            }
            EditOperation::Remove { .. } => {
                write!(f, "{:6} {:12} {:15} (no content)", self.kind(), "", target)
            }
        }
    }
}

/// Loose wire representation of an edit operation.
///
/// Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOperation {
    /// ADD, UPDATE or REMOVE (case-insensitive).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, alias = "entry_id", skip_serializing_if = "Option::is_none")]
    pub bullet_id: Option<String>,
}

/// Why a wire operation could not be turned into an [`EditOperation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// `type` is not ADD, UPDATE or REMOVE.
    UnknownType(String),
    /// UPDATE or REMOVE without a `bullet_id`.
    MissingTarget(&'static str),
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationError::UnknownType(kind) => {
                write!(f, "unknown operation type '{}'", kind)
            }
            OperationError::MissingTarget(kind) => {
                write!(f, "{} operation requires bullet_id", kind)
            }
        }
    }
}

impl std::error::Error for OperationError {}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<RawOperation> for EditOperation {
    type Error = OperationError;

    fn try_from(raw: RawOperation) -> Result<Self, Self::Error> {
        match raw.kind.trim().to_ascii_uppercase().as_str() {
            "ADD" => Ok(EditOperation::Add {
                section: non_blank(raw.section).unwrap_or_else(|| DEFAULT_SECTION.to_string()),
                content: raw.content.unwrap_or_default(),
                id: non_blank(raw.bullet_id),
            }),
            "UPDATE" => Ok(EditOperation::Update {
                id: non_blank(raw.bullet_id).ok_or(OperationError::MissingTarget("UPDATE"))?,
                content: raw.content.unwrap_or_default(),
            }),
            "REMOVE" => Ok(EditOperation::Remove {
                id: non_blank(raw.bullet_id).ok_or(OperationError::MissingTarget("REMOVE"))?,
            }),
            _ => Err(OperationError::UnknownType(raw.kind)),
        }
    }
}

impl From<EditOperation> for RawOperation {
    fn from(op: EditOperation) -> Self {
        let kind = op.kind().to_string();
        match op {
            EditOperation::Add {
                section,
                content,
                id,
            } => RawOperation {
                kind,
                section: Some(section),
                content: Some(content),
                bullet_id: id,
            },
            EditOperation::Update { id, content } => RawOperation {
                kind,
                section: None,
                content: Some(content),
                bullet_id: Some(id),
            },
            EditOperation::Remove { id } => RawOperation {
                kind,
                section: None,
                content: None,
                bullet_id: Some(id),
            },
        }
    }
}

/// Ordered operations plus the curator's rationale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditBatch {
    /// Free-text explanation of the proposed changes.
    pub reasoning: String,
    /// Operations in application order.
    #[serde(default)]
    pub operations: Vec<EditOperation>,
}

impl EditBatch {
    /// Create a batch.
    pub fn new(reasoning: impl Into<String>, operations: Vec<EditOperation>) -> Self {
        Self {
            reasoning: reasoning.into(),
            operations,
        }
    }

    /// Whether the batch proposes no changes.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_wire_format() {
        let json = r#"{
            "reasoning": "Add unit check, fix stale advice",
            "operations": [
                {"type": "ADD", "section": "general", "content": "Always check units"},
                {"type": "UPDATE", "bullet_id": "general-00001", "content": "X"},
                {"type": "REMOVE", "bullet_id": "math-00003"}
            ]
        }"#;
        let batch: EditBatch = serde_json::from_str(json).unwrap();

        assert_eq!(batch.reasoning, "Add unit check, fix stale advice");
        assert_eq!(
            batch.operations,
            vec![
                EditOperation::add("general", "Always check units"),
                EditOperation::update("general-00001", "X"),
                EditOperation::remove("math-00003"),
            ]
        );
    }

    #[test]
    fn test_type_is_case_insensitive() {
        let op: EditOperation =
            serde_json::from_str(r#"{"type": "remove", "bullet_id": "a-00001"}"#).unwrap();
        assert_eq!(op, EditOperation::remove("a-00001"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{
            "reasoning": "r",
            "confidence": 0.9,
            "operations": [
                {"type": "ADD", "section": "s", "content": "c", "metadata": {"helpful": 1}}
            ]
        }"#;
        let batch: EditBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.operations, vec![EditOperation::add("s", "c")]);
    }

    #[test]
    fn test_add_defaults() {
        let op: EditOperation = serde_json::from_str(r#"{"type": "ADD"}"#).unwrap();
        assert_eq!(op, EditOperation::add(DEFAULT_SECTION, ""));
    }

    #[test]
    fn test_add_with_supplied_id() {
        let op: EditOperation = serde_json::from_str(
            r#"{"type": "ADD", "section": "s", "content": "c", "bullet_id": "s-custom"}"#,
        )
        .unwrap();
        assert_eq!(op, EditOperation::add_with_id("s", "c", "s-custom"));
        assert_eq!(op.target_id(), Some("s-custom"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = serde_json::from_str::<EditOperation>(
            r#"{"type": "TAG", "bullet_id": "a-00001"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown operation type 'TAG'"));
    }

    #[test]
    fn test_update_without_target_rejected() {
        let err =
            serde_json::from_str::<EditOperation>(r#"{"type": "UPDATE", "content": "x"}"#)
                .unwrap_err();
        assert!(err.to_string().contains("UPDATE operation requires bullet_id"));
    }

    #[test]
    fn test_batch_requires_reasoning() {
        assert!(serde_json::from_str::<EditBatch>(r#"{"operations": []}"#).is_err());
        let batch: EditBatch = serde_json::from_str(r#"{"reasoning": "none"}"#).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_serialize_drops_absent_fields() {
        let value = serde_json::to_value(EditOperation::remove("a-00001")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "REMOVE", "bullet_id": "a-00001"})
        );
    }

    #[test]
    fn test_display() {
        let line = EditOperation::add("general", "Always check units").to_string();
        assert!(line.starts_with("ADD    general"));
        assert!(line.ends_with("Always check units"));

        let line = EditOperation::remove("a-00001").to_string();
        assert!(line.contains("[a-00001]"));
        assert!(line.ends_with("(no content)"));
    }
}
