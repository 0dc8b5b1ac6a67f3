//! History storage.
//!
//! Each history holds one playbook plus cycle counters, persisted between
//! cycles by a file-based or in-memory backend.

pub mod file;
pub mod memory;
pub mod record;
pub mod traits;

pub use file::FileHistoryStore;
pub use memory::MemoryHistoryStore;
pub use record::{validate_history_id, CycleSummary, HistoryRecord};
pub use traits::HistoryStore;
