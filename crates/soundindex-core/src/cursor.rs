//! Block cursor: persists the watcher's position across restarts.
//!
//! The stored value is the next block to fetch: after a cycle covering
//! `[from, to]` succeeds, the cursor becomes `to + 1`. The store does not
//! validate the values it is given; the watcher only ever moves it forward.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::WatcherError;

/// A persisted cursor for one watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCursor {
    /// Unique watcher identifier.
    pub watcher_id: String,
    /// Next block to fetch.
    pub block_number: u64,
    /// Unix timestamp of when this cursor was saved.
    pub updated_at: i64,
}

impl BlockCursor {
    pub fn new(watcher_id: impl Into<String>, block_number: u64) -> Self {
        Self {
            watcher_id: watcher_id.into(),
            block_number,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Trait for storing and loading cursors.
///
/// Implementations include `MemoryCursorStore` here and the in-memory and
/// SQLite backends in `soundindex-storage`.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the cursor for a watcher.
    async fn load(&self, watcher_id: &str) -> Result<Option<BlockCursor>, WatcherError>;

    /// Save (upsert) a cursor.
    async fn save(&self, cursor: BlockCursor) -> Result<(), WatcherError>;

    /// Delete a cursor (e.g. when resetting a watcher).
    async fn delete(&self, watcher_id: &str) -> Result<(), WatcherError>;
}

/// Reads and writes the cursor of a single watcher.
pub struct CursorTracker {
    store: Box<dyn CursorStore>,
    watcher_id: String,
    /// Returned when nothing has been saved yet.
    start_block: u64,
}

impl CursorTracker {
    pub fn new(store: Box<dyn CursorStore>, watcher_id: impl Into<String>, start_block: u64) -> Self {
        Self {
            store,
            watcher_id: watcher_id.into(),
            start_block,
        }
    }

    pub fn watcher_id(&self) -> &str {
        &self.watcher_id
    }

    /// The next block to fetch.
    pub async fn current_block_number(&self) -> Result<u64, WatcherError> {
        Ok(self
            .store
            .load(&self.watcher_id)
            .await?
            .map(|c| c.block_number)
            .unwrap_or(self.start_block))
    }

    /// Persist a new cursor value.
    pub async fn update_current_block_number(&self, block_number: u64) -> Result<(), WatcherError> {
        self.store
            .save(BlockCursor::new(self.watcher_id.clone(), block_number))
            .await?;
        tracing::debug!(watcher = %self.watcher_id, block = block_number, "cursor saved");
        Ok(())
    }

    /// The stored cursor record, if any.
    pub async fn load(&self) -> Result<Option<BlockCursor>, WatcherError> {
        self.store.load(&self.watcher_id).await
    }

    /// Forget the stored cursor; the next cycle starts from `start_block`.
    pub async fn reset(&self) -> Result<(), WatcherError> {
        self.store.delete(&self.watcher_id).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory cursor store for tests and ephemeral watchers.
#[derive(Default)]
pub struct MemoryCursorStore {
    data: Mutex<HashMap<String, BlockCursor>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `block_number` for `watcher_id`.
    pub fn seeded(watcher_id: &str, block_number: u64) -> Self {
        let store = Self::new();
        store
            .data
            .lock()
            .unwrap()
            .insert(watcher_id.to_string(), BlockCursor::new(watcher_id, block_number));
        store
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self, watcher_id: &str) -> Result<Option<BlockCursor>, WatcherError> {
        Ok(self.data.lock().unwrap().get(watcher_id).cloned())
    }

    async fn save(&self, cursor: BlockCursor) -> Result<(), WatcherError> {
        self.data
            .lock()
            .unwrap()
            .insert(cursor.watcher_id.clone(), cursor);
        Ok(())
    }

    async fn delete(&self, watcher_id: &str) -> Result<(), WatcherError> {
        self.data.lock().unwrap().remove(watcher_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_start_block() {
        let tracker = CursorTracker::new(Box::new(MemoryCursorStore::new()), "watcher", 42);
        assert_eq!(tracker.current_block_number().await.unwrap(), 42);
        assert!(tracker.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_then_read() {
        let tracker = CursorTracker::new(Box::new(MemoryCursorStore::new()), "watcher", 0);
        tracker.update_current_block_number(1_000).await.unwrap();
        assert_eq!(tracker.current_block_number().await.unwrap(), 1_000);

        let saved = tracker.load().await.unwrap().unwrap();
        assert_eq!(saved.watcher_id, "watcher");
        assert_eq!(saved.block_number, 1_000);
    }

    #[tokio::test]
    async fn reset_returns_to_start_block() {
        let tracker = CursorTracker::new(Box::new(MemoryCursorStore::seeded("w", 500)), "w", 7);
        assert_eq!(tracker.current_block_number().await.unwrap(), 500);

        tracker.reset().await.unwrap();
        assert_eq!(tracker.current_block_number().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn watchers_are_isolated() {
        let store = MemoryCursorStore::new();
        store.save(BlockCursor::new("a", 10)).await.unwrap();
        store.save(BlockCursor::new("b", 20)).await.unwrap();
        assert_eq!(store.load("a").await.unwrap().unwrap().block_number, 10);
        assert_eq!(store.load("b").await.unwrap().unwrap().block_number, 20);
    }
}
