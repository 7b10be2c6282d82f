//! In-memory storage backend.
//!
//! Stores cursors, dead letters and journaled events in RAM.
//! Useful for tests and one-off runs that don't need persistence.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use soundindex_core::{
    BlockCursor, CursorStore, FailedEvent, FailedEventStore, RawChainEvent, WatcherError,
};

use crate::journal::EventJournal;

/// In-memory watcher storage.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStorage {
    cursors: Mutex<HashMap<String, BlockCursor>>,
    failed: Mutex<Vec<FailedEvent>>,
    events: Mutex<Vec<RawChainEvent>>,
    seen: Mutex<HashSet<(String, u32)>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Journaled events with tag `tag`, in insertion order.
    pub fn events_by_tag(&self, tag: &str) -> Vec<RawChainEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event == tag)
            .cloned()
            .collect()
    }

    /// Total number of journaled events.
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl CursorStore for InMemoryStorage {
    async fn load(&self, watcher_id: &str) -> Result<Option<BlockCursor>, WatcherError> {
        Ok(self.cursors.lock().unwrap().get(watcher_id).cloned())
    }

    async fn save(&self, cursor: BlockCursor) -> Result<(), WatcherError> {
        self.cursors
            .lock()
            .unwrap()
            .insert(cursor.watcher_id.clone(), cursor);
        Ok(())
    }

    async fn delete(&self, watcher_id: &str) -> Result<(), WatcherError> {
        self.cursors.lock().unwrap().remove(watcher_id);
        Ok(())
    }
}

#[async_trait]
impl FailedEventStore for InMemoryStorage {
    async fn record(&self, failed: FailedEvent) -> Result<(), WatcherError> {
        self.failed.lock().unwrap().push(failed);
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<FailedEvent>, WatcherError> {
        Ok(self
            .failed
            .lock()
            .unwrap()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, WatcherError> {
        Ok(self.failed.lock().unwrap().len() as u64)
    }
}

#[async_trait]
impl EventJournal for InMemoryStorage {
    async fn append(&self, event: &RawChainEvent) -> Result<bool, WatcherError> {
        let key = (event.transaction_hash.clone(), event.log_index);
        if !self.seen.lock().unwrap().insert(key) {
            return Ok(false);
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundindex_core::{ContractId, CursorTracker};
    use std::sync::Arc;

    fn ev(tag: &str, tx: &str, log_index: u32) -> RawChainEvent {
        RawChainEvent {
            event: tag.into(),
            return_values: serde_json::Value::Null,
            address: "0x0".into(),
            block_number: 100,
            block_hash: "0x0".into(),
            transaction_hash: tx.into(),
            log_index,
            source: ContractId::NFT_V1,
        }
    }

    #[tokio::test]
    async fn cursor_roundtrip() {
        let store = InMemoryStorage::new();
        store.save(BlockCursor::new("w", 500)).await.unwrap();

        let loaded = store.load("w").await.unwrap().unwrap();
        assert_eq!(loaded.block_number, 500);

        store.delete("w").await.unwrap();
        assert!(store.load("w").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tracker_over_memory_storage() {
        let tracker = CursorTracker::new(Box::new(InMemoryStorage::new()), "w", 42);
        assert_eq!(tracker.current_block_number().await.unwrap(), 42);
        tracker.update_current_block_number(43).await.unwrap();
        assert_eq!(tracker.current_block_number().await.unwrap(), 43);
    }

    #[tokio::test]
    async fn journal_deduplicates_replays() {
        let store = Arc::new(InMemoryStorage::new());
        assert!(store.append(&ev("Transfer", "0xa", 0)).await.unwrap());
        assert!(store.append(&ev("Transfer", "0xa", 1)).await.unwrap());
        assert!(!store.append(&ev("Transfer", "0xa", 0)).await.unwrap());

        assert_eq!(store.event_count(), 2);
        assert_eq!(store.events_by_tag("Transfer").len(), 2);
        assert!(store.events_by_tag("EditionCreated").is_empty());
    }

    #[tokio::test]
    async fn dead_letters_newest_first() {
        let store = InMemoryStorage::new();
        for tx in ["0x1", "0x2", "0x3"] {
            let failed = FailedEvent::from_event(
                &ev("Transfer", tx, 0),
                &WatcherError::handler("Transfer", "boom"),
            );
            store.record(failed).await.unwrap();
        }
        let list = store.list(2).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].transaction_hash, "0x3");
        assert_eq!(store.count().await.unwrap(), 3);
    }
}
