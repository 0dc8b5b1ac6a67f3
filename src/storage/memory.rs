//! In-memory history storage for testing.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{PlaybookError, Result};
use crate::storage::record::{validate_history_id, HistoryRecord};
use crate::storage::HistoryStore;

/// In-memory history store.
///
/// Thread-safe implementation using `RwLock<HashMap>`. Histories are lost
/// when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    histories: RwLock<HashMap<String, HistoryRecord>>,
}

fn poisoned() -> PlaybookError {
    PlaybookError::storage(
        "<memory>",
        std::io::Error::other("history store lock poisoned"),
    )
}

impl MemoryHistoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of histories in the store.
    pub fn len(&self) -> usize {
        self.histories.read().map(|h| h.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn get(&self, id: &str) -> Result<Option<HistoryRecord>> {
        let histories = self.histories.read().map_err(|_| poisoned())?;
        Ok(histories.get(id).cloned())
    }

    fn put(&self, record: &HistoryRecord) -> Result<()> {
        validate_history_id(&record.id)?;
        let mut histories = self.histories.write().map_err(|_| poisoned())?;
        histories.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let histories = self.histories.read().map_err(|_| poisoned())?;
        let mut result: Vec<HistoryRecord> = histories.values().cloned().collect();

        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);

        Ok(result)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut histories = self.histories.write().map_err(|_| poisoned())?;
        histories.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::test_history_store_crud;
    use std::sync::Arc;

    #[test]
    fn test_memory_history_store_crud() {
        let store = MemoryHistoryStore::new();
        test_history_store_crud(&store);
    }

    #[test]
    fn test_arc_store_crud() {
        let store = Arc::new(MemoryHistoryStore::new());
        test_history_store_crud(&store);
    }

    #[test]
    fn test_len_and_is_empty() {
        let store = MemoryHistoryStore::new();
        assert!(store.is_empty());

        store.put(&HistoryRecord::new("a")).unwrap();
        store.put(&HistoryRecord::new("b")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_put_rejects_invalid_id() {
        let store = MemoryHistoryStore::new();
        assert!(store.put(&HistoryRecord::new("a/b")).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_sorted_and_limited() {
        let store = MemoryHistoryStore::new();

        let mut old = HistoryRecord::new("old");
        old.updated_at = chrono::Utc::now() - chrono::Duration::hours(1);
        store.put(&old).unwrap();
        store.put(&HistoryRecord::new("new")).unwrap();

        let histories = store.list(10).unwrap();
        assert_eq!(histories[0].id, "new");
        assert_eq!(histories[1].id, "old");
        assert_eq!(store.list(1).unwrap().len(), 1);
    }
}
