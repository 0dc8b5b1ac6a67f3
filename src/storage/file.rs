//! File-based history storage.
//!
//! Histories are stored as pretty-printed JSON files in
//! `~/.playbook/histories/`. Atomic writes are achieved via temp file +
//! rename. Playbooks are checked for section consistency on load.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::histories_dir;
use crate::error::{PlaybookError, Result};
use crate::storage::record::{validate_history_id, HistoryRecord};
use crate::storage::HistoryStore;
use crate::util::{read_to_string_limited, write_atomic};

/// File-based history storage.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    /// Directory where history files are stored.
    histories_dir: PathBuf,
}

impl FileHistoryStore {
    /// Create a store in the default directory.
    ///
    /// Uses `~/.playbook/histories/` or `$PLAYBOOK_HOME/histories/`.
    pub fn new() -> Result<Self> {
        let dir = histories_dir().ok_or_else(|| {
            PlaybookError::config("Could not determine histories directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a store in a custom directory, creating it if needed.
    pub fn with_dir(histories_dir: impl Into<PathBuf>) -> Result<Self> {
        let histories_dir = histories_dir.into();

        if !histories_dir.exists() {
            fs::create_dir_all(&histories_dir)
                .map_err(|e| PlaybookError::storage(&histories_dir, e))?;
        }

        Ok(Self { histories_dir })
    }

    /// Directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.histories_dir
    }

    fn history_path(&self, id: &str) -> Result<PathBuf> {
        validate_history_id(id)?;
        Ok(self.histories_dir.join(format!("{}.json", id)))
    }

    fn temp_path(&self, id: &str) -> PathBuf {
        self.histories_dir.join(format!(".{}.json.tmp", id))
    }

    fn read_record(path: &Path) -> Result<HistoryRecord> {
        let content = read_to_string_limited(path)?;
        let record: HistoryRecord = serde_json::from_str(&content)?;
        record.playbook.validate()?;
        Ok(record)
    }

    fn atomic_write(&self, record: &HistoryRecord) -> Result<()> {
        let final_path = self.history_path(&record.id)?;
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&final_path, &json)
    }
}

impl HistoryStore for FileHistoryStore {
    fn get(&self, id: &str) -> Result<Option<HistoryRecord>> {
        let path = self.history_path(id)?;

        if !path.exists() {
            return Ok(None);
        }

        Self::read_record(&path).map(Some)
    }

    fn put(&self, record: &HistoryRecord) -> Result<()> {
        self.atomic_write(record)
    }

    fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        if !self.histories_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.histories_dir)
            .map_err(|e| PlaybookError::storage(&self.histories_dir, e))?;

        let mut histories = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PlaybookError::storage(&self.histories_dir, e))?;
            let path = entry.path();

            // Skip non-JSON files and temp files
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }

            match Self::read_record(&path) {
                Ok(record) => histories.push(record),
                Err(e) => tracing::warn!("Skipping unreadable history {}: {}", path.display(), e),
            }
        }

        histories.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        histories.truncate(limit);

        Ok(histories)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.history_path(id)?;

        if path.exists() {
            fs::remove_file(&path).map_err(|e| PlaybookError::storage(&path, e))?;
        }

        let temp_path = self.temp_path(id);
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        Ok(())
    }
}
