//! CLI command implementations.
//!
//! Each command takes its options, runs against a history store, and
//! produces an output struct that formats as text or JSON.

pub mod apply;
pub mod cycle;
pub mod histories;
pub mod show;
pub mod snapshot;
pub mod stats;
pub mod tag;

pub use apply::{ApplyCommand, ApplyOptions, ApplyOutput};
pub use cycle::{CycleCommand, CycleOptions, CycleOutput};
pub use histories::{HistoriesCommand, HistoriesOptions, HistoriesOutput, HistorySummary};
pub use show::{ShowCommand, ShowOptions, ShowOutput};
pub use snapshot::{
    ExportCommand, ExportOptions, ExportOutput, ImportCommand, ImportOptions, ImportOutput,
};
pub use stats::{StatsCommand, StatsOptions, StatsOutput};
pub use tag::{TagCommand, TagOptions, TagOutput};

use crate::error::{PlaybookError, Result};
use crate::storage::{HistoryRecord, HistoryStore};

/// Load a history that must already exist.
pub(crate) fn require_history<S: HistoryStore>(store: &S, id: &str) -> Result<HistoryRecord> {
    store
        .get(id)?
        .ok_or_else(|| PlaybookError::history_not_found(id))
}

/// Serialize an output for `--json`.
pub(crate) fn to_json<T: serde::Serialize>(output: &T) -> String {
    serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
}
