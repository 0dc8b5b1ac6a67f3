//! The playbook: entries grouped into ordered sections.
//!
//! `entries` and `sections` are kept bidirectionally consistent: every id
//! listed under a section exists in `entries` with that section name, every
//! entry is listed exactly once, and no section maps to an empty list. All
//! mutators in this module preserve that invariant; snapshots loaded from
//! disk are checked against it.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::entry::{Entry, Outcome, DEFAULT_SECTION};
use crate::error::{PlaybookError, Result};

/// Text rendered for a playbook without entries.
pub const EMPTY_PLAYBOOK: &str = "No playbook entries yet.";

/// Structured strategy store.
///
/// Serializes to the snapshot format `{entries, sections, next_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Playbook {
    /// Entries keyed by id.
    #[serde(default, alias = "bullets")]
    entries: BTreeMap<String, Entry>,
    /// Section name to entry ids in insertion order.
    #[serde(default)]
    sections: BTreeMap<String, Vec<String>>,
    /// Counter used to mint ids.
    #[serde(default)]
    next_id: u64,
}

/// Aggregate counts over a playbook.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybookStats {
    /// Number of non-empty sections.
    pub sections: usize,
    /// Number of entries.
    pub entries: usize,
    /// Counter totals across all entries.
    pub tags: TagTotals,
}

/// Sum of each outcome counter across entries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagTotals {
    pub helpful: u64,
    pub harmful: u64,
    pub neutral: u64,
}

impl TagTotals {
    fn record(&mut self, outcome: Outcome, count: u32) {
        let total = match outcome {
            Outcome::Helpful => &mut self.helpful,
            Outcome::Harmful => &mut self.harmful,
            Outcome::Neutral => &mut self.neutral,
        };
        *total += u64::from(count);
    }
}

impl std::fmt::Display for PlaybookStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} section(s), {} entr{} (helpful={}, harmful={}, neutral={})",
            self.sections,
            self.entries,
            if self.entries == 1 { "y" } else { "ies" },
            self.tags.helpful,
            self.tags.harmful,
            self.tags.neutral
        )
    }
}

impl Playbook {
    /// Create an empty playbook.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get an entry by id.
    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id)
    }

    /// Check whether an entry exists.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the playbook has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries keyed by id.
    pub fn entries(&self) -> &BTreeMap<String, Entry> {
        &self.entries
    }

    /// Section index.
    pub fn sections(&self) -> &BTreeMap<String, Vec<String>> {
        &self.sections
    }

    /// Current value of the id counter.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Iterate entries in display order: sections sorted by name, entries in
    /// insertion order within a section.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.sections
            .values()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.entries.get(id))
    }

    /// Entries of one section in insertion order.
    pub fn section_entries<'a>(&'a self, section: &str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.sections
            .get(section)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.entries.get(id))
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Add an entry, minting an id when none is supplied.
    ///
    /// A supplied id that already exists replaces the previous entry; the old
    /// entry is detached from its section first.
    pub fn add_entry(&mut self, section: &str, content: &str, id: Option<&str>) -> &Entry {
        let id = match id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.mint_id(section),
        };

        if let Some(previous) = self.entries.remove(&id) {
            self.detach(&previous.section, &id);
        }

        self.sections
            .entry(section.to_string())
            .or_default()
            .push(id.clone());
        let entry = Entry::new(id.clone(), section, content);
        self.entries.entry(id).or_insert(entry)
    }

    /// Replace an entry's content.
    ///
    /// Returns `None` if the id is absent.
    pub fn update_entry(&mut self, id: &str, content: &str) -> Option<&Entry> {
        let entry = self.entries.get_mut(id)?;
        entry.set_content(content);
        Some(entry)
    }

    /// Remove an entry and drop its section if it becomes empty.
    pub fn remove_entry(&mut self, id: &str) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        self.detach(&entry.section, id);
        Some(entry)
    }

    /// Increment one outcome counter of an entry.
    ///
    /// Returns `None` if the id is absent.
    pub fn tag_entry(&mut self, id: &str, outcome: Outcome, increment: u32) -> Option<&Entry> {
        let entry = self.entries.get_mut(id)?;
        entry.tag(outcome, increment);
        Some(entry)
    }

    /// Mint the next free id for a section.
    ///
    /// Format: `<first word of section, lowercased>-<counter:05>`. The counter
    /// only moves forward; candidates already taken by caller-supplied ids
    /// are passed over.
    fn mint_id(&mut self, section: &str) -> String {
        let prefix = section
            .split_whitespace()
            .next()
            .unwrap_or(DEFAULT_SECTION)
            .to_lowercase();

        loop {
            self.next_id += 1;
            let candidate = format!("{}-{:05}", prefix, self.next_id);
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Remove an id from a section list, deleting the section when empty.
    fn detach(&mut self, section: &str, id: &str) {
        if let Some(ids) = self.sections.get_mut(section) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                self.sections.remove(section);
            }
        }
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Render the playbook as human-readable text for prompts and display.
    pub fn render(&self) -> String {
        if self.sections.is_empty() {
            return EMPTY_PLAYBOOK.to_string();
        }

        let mut lines = Vec::new();
        for section in self.sections.keys() {
            lines.push(format!("## {}", section));
            lines.extend(self.section_entries(section).map(render_line));
        }
        lines.join("\n")
    }

    /// Render only the given entries, in the order requested.
    ///
    /// Unknown ids are ignored. Used to show a critique which entries the
    /// answer relied on.
    pub fn render_excerpt(&self, ids: &[String]) -> String {
        let lines: Vec<String> = ids
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(render_line)
            .collect();

        if lines.is_empty() {
            "(no entries referenced)".to_string()
        } else {
            lines.join("\n")
        }
    }

    /// Aggregate counts.
    pub fn stats(&self) -> PlaybookStats {
        let mut tags = TagTotals::default();
        for entry in self.entries.values() {
            for &outcome in Outcome::all() {
                tags.record(outcome, entry.count(outcome));
            }
        }

        PlaybookStats {
            sections: self.sections.len(),
            entries: self.entries.len(),
            tags,
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Serialize to a structured snapshot.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a structured snapshot, checking consistency.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let playbook: Playbook = serde_json::from_value(value)?;
        playbook.validate()?;
        Ok(playbook)
    }

    /// Serialize to a pretty-printed JSON string.
    pub fn dumps(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from a JSON string, checking consistency.
    pub fn loads(data: &str) -> Result<Self> {
        let playbook: Playbook = serde_json::from_str(data)?;
        playbook.validate()?;
        Ok(playbook)
    }

    /// Check the entry/section consistency invariant.
    pub fn validate(&self) -> Result<()> {
        let mut listed: HashSet<&str> = HashSet::new();
        for (section, ids) in &self.sections {
            if ids.is_empty() {
                return Err(PlaybookError::inconsistent(format!(
                    "section '{}' has no entries",
                    section
                )));
            }
            for id in ids {
                match self.entries.get(id) {
                    None => {
                        return Err(PlaybookError::inconsistent(format!(
                            "section '{}' lists unknown entry '{}'",
                            section, id
                        )))
                    }
                    Some(entry) if entry.section != *section => {
                        return Err(PlaybookError::inconsistent(format!(
                            "entry '{}' belongs to '{}' but is listed under '{}'",
                            id, entry.section, section
                        )))
                    }
                    Some(_) => {
                        if !listed.insert(id.as_str()) {
                            return Err(PlaybookError::inconsistent(format!(
                                "entry '{}' is listed more than once",
                                id
                            )));
                        }
                    }
                }
            }
        }

        if let Some(id) = self.entries.keys().find(|id| !listed.contains(id.as_str())) {
            return Err(PlaybookError::inconsistent(format!(
                "entry '{}' is not listed in any section",
                id
            )));
        }

        for (id, entry) in &self.entries {
            if entry.id != *id {
                return Err(PlaybookError::inconsistent(format!(
                    "entry keyed '{}' carries id '{}'",
                    id, entry.id
                )));
            }
        }

        Ok(())
    }
}

fn render_line(entry: &Entry) -> String {
    format!(
        "- [{}] {} (helpful={}, harmful={}, neutral={})",
        entry.id, entry.content, entry.helpful, entry.harmful, entry.neutral
    )
}
