//! Playbook entry types.
//!
//! An entry is one atomic piece of advice. Its outcome counters record how
//! often a critique judged it helpful, harmful, or neutral.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Section prefix used when a section name has no words to mint from.
pub const DEFAULT_SECTION: &str = "general";

/// Single playbook entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    /// Stable identifier, unique within the playbook.
    pub id: String,
    /// Name of the section this entry belongs to.
    pub section: String,
    /// Free-text advice.
    pub content: String,
    /// Times the entry was judged helpful.
    #[serde(default)]
    pub helpful: u32,
    /// Times the entry was judged harmful.
    #[serde(default)]
    pub harmful: u32,
    /// Times the entry was judged neutral.
    #[serde(default)]
    pub neutral: u32,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the content or a counter last changed.
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// Create a new entry with zeroed counters.
    pub fn new(
        id: impl Into<String>,
        section: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            section: section.into(),
            content: content.into(),
            helpful: 0,
            harmful: 0,
            neutral: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Increment the counter for `outcome` and refresh `updated_at`.
    pub fn tag(&mut self, outcome: Outcome, increment: u32) {
        let counter = match outcome {
            Outcome::Helpful => &mut self.helpful,
            Outcome::Harmful => &mut self.harmful,
            Outcome::Neutral => &mut self.neutral,
        };
        *counter = counter.saturating_add(increment);
        self.touch();
    }

    /// Replace the content and refresh `updated_at`.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.touch();
    }

    /// Get the counter value for an outcome.
    pub fn count(&self, outcome: Outcome) -> u32 {
        match outcome {
            Outcome::Helpful => self.helpful,
            Outcome::Harmful => self.harmful,
            Outcome::Neutral => self.neutral,
        }
    }

    /// Refresh the `updated_at` timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Outcome classification applied to an entry by a critique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The entry helped reach the right answer.
    Helpful,
    /// The entry was wrong or misleading.
    Harmful,
    /// The entry did not affect the result.
    Neutral,
}

impl Outcome {
    /// Get all outcome variants.
    pub fn all() -> &'static [Outcome] {
        &[Outcome::Helpful, Outcome::Harmful, Outcome::Neutral]
    }

    /// Get the wire name of this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Helpful => "helpful",
            Outcome::Harmful => "harmful",
            Outcome::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pairs an entry id with an outcome.
///
/// Wire format: `{"id": "general-00001", "tag": "helpful"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTag {
    /// Target entry id.
    pub id: String,
    /// Outcome to record.
    pub tag: Outcome,
}

impl OutcomeTag {
    /// Create a new outcome tag.
    pub fn new(id: impl Into<String>, tag: Outcome) -> Self {
        Self { id: id.into(), tag }
    }
}
