//! Dead letters: events whose handler failed under `FailurePolicy::DeadLetter`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

use crate::error::WatcherError;
use crate::types::RawChainEvent;

/// A handler failure kept for later inspection or replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEvent {
    /// Event tag the handler was invoked for.
    pub name: String,
    /// Handler error message.
    pub error: String,
    /// The event's decoded arguments.
    pub data: Value,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u32,
    /// Unix timestamp of when the failure was recorded.
    pub recorded_at: i64,
}

impl FailedEvent {
    pub fn from_event(event: &RawChainEvent, error: &WatcherError) -> Self {
        Self {
            name: event.event.clone(),
            error: error.to_string(),
            data: event.return_values.clone(),
            block_number: event.block_number,
            transaction_hash: event.transaction_hash.clone(),
            log_index: event.log_index,
            recorded_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Persistence for dead letters.
#[async_trait]
pub trait FailedEventStore: Send + Sync {
    async fn record(&self, failed: FailedEvent) -> Result<(), WatcherError>;

    /// Most recent failures first.
    async fn list(&self, limit: usize) -> Result<Vec<FailedEvent>, WatcherError>;

    async fn count(&self) -> Result<u64, WatcherError>;
}

/// In-memory dead-letter store.
#[derive(Default)]
pub struct MemoryFailedEventStore {
    events: Mutex<Vec<FailedEvent>>,
}

impl MemoryFailedEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FailedEventStore for MemoryFailedEventStore {
    async fn record(&self, failed: FailedEvent) -> Result<(), WatcherError> {
        self.events.lock().unwrap().push(failed);
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<FailedEvent>, WatcherError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, WatcherError> {
        Ok(self.events.lock().unwrap().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContractId;

    fn event(tag: &str, block: u64) -> RawChainEvent {
        RawChainEvent {
            event: tag.into(),
            return_values: serde_json::json!({ "tokenId": block.to_string() }),
            address: "0x0".into(),
            block_number: block,
            block_hash: "0x0".into(),
            transaction_hash: format!("0x{block:064x}"),
            log_index: 2,
            source: ContractId::AUCTION_V1,
        }
    }

    #[test]
    fn captures_event_and_error() {
        let failed = FailedEvent::from_event(
            &event("BidPlaced", 77),
            &WatcherError::handler("BidPlaced", "auction not found"),
        );
        assert_eq!(failed.name, "BidPlaced");
        assert_eq!(failed.data["tokenId"], "77");
        assert_eq!(failed.block_number, 77);
        assert_eq!(failed.log_index, 2);
        assert!(failed.error.contains("auction not found"));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryFailedEventStore::new();
        for block in 1..=3 {
            let e = event("AuctionResulted", block);
            store
                .record(FailedEvent::from_event(&e, &WatcherError::Other("x".into())))
                .await
                .unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 3);

        let recent = store.list(2).await.unwrap();
        let blocks: Vec<u64> = recent.iter().map(|f| f.block_number).collect();
        assert_eq!(blocks, vec![3, 2]);
    }
}
