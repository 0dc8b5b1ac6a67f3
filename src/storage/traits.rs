//! History storage trait.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::record::HistoryRecord;

/// Trait for history storage backends.
///
/// A cycle reads its history at the start and writes it back at the end,
/// so two cycles for the same history must not run at once.
pub trait HistoryStore: Send + Sync {
    /// Retrieve a history by ID.
    ///
    /// Returns `Ok(None)` if the history doesn't exist.
    fn get(&self, id: &str) -> Result<Option<HistoryRecord>>;

    /// Save a history.
    ///
    /// Creates a new history or replaces an existing one.
    fn put(&self, record: &HistoryRecord) -> Result<()>;

    /// List histories, most recently updated first, up to `limit`.
    fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>>;

    /// Delete a history.
    ///
    /// Returns `Ok(())` even if the history doesn't exist.
    fn delete(&self, id: &str) -> Result<()>;

    /// Check if a history exists.
    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }
}

/// Blanket implementation of HistoryStore for Arc-wrapped stores.
impl<T: HistoryStore + ?Sized> HistoryStore for Arc<T> {
    fn get(&self, id: &str) -> Result<Option<HistoryRecord>> {
        (**self).get(id)
    }

    fn put(&self, record: &HistoryRecord) -> Result<()> {
        (**self).put(record)
    }

    fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        (**self).list(limit)
    }

    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }
}
