//! Outcome tagging: applies critique verdicts to entry counters.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::entry::OutcomeTag;
use crate::core::playbook::Playbook;

/// Tags that were applied and tags that named unknown entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReport {
    pub applied: Vec<OutcomeTag>,
    pub skipped: Vec<OutcomeTag>,
}

impl TagReport {
    /// Number of tags that incremented a counter.
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Number of tags whose entry was not found.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// One line per applied tag, for trace output.
    pub fn summary_lines(&self) -> Vec<String> {
        self.applied
            .iter()
            .map(|tag| format!("- [{}] {}", tag.id, tag.tag))
            .collect()
    }
}

/// Apply each tag as a +1 on the matching counter.
///
/// Missing entries are skipped and never created.
pub fn apply_tags(playbook: &mut Playbook, tags: &[OutcomeTag]) -> TagReport {
    apply_tags_with_limit(playbook, tags, 0)
}

/// Apply at most `max_tags` tags (0 = no limit); the rest are skipped.
pub fn apply_tags_with_limit(
    playbook: &mut Playbook,
    tags: &[OutcomeTag],
    max_tags: usize,
) -> TagReport {
    let mut report = TagReport::default();

    for (index, tag) in tags.iter().enumerate() {
        if max_tags > 0 && index >= max_tags {
            warn!("Tag limit {} reached, skipping [{}] {}", max_tags, tag.id, tag.tag);
            report.skipped.push(tag.clone());
            continue;
        }

        if playbook.tag_entry(&tag.id, tag.tag, 1).is_some() {
            debug!("Tagged [{}] {}", tag.id, tag.tag);
            report.applied.push(tag.clone());
        } else {
            warn!("Entry {} not found in playbook", tag.id);
            report.skipped.push(tag.clone());
        }
    }

    report
}
