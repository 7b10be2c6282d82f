//! SQLite storage backend.
//!
//! Persists cursors, dead letters and the event journal to a single SQLite
//! file. Uses `sqlx` with WAL mode.
//!
//! # Usage
//! ```rust,no_run
//! use soundindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./soundindex.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use soundindex_core::{
    BlockCursor, ContractId, CursorStore, FailedEvent, FailedEventStore, RawChainEvent,
    WatcherError,
};

use crate::journal::EventJournal;

fn storage_err(e: impl std::fmt::Display) -> WatcherError {
    WatcherError::Storage(e.to_string())
}

/// SQLite-backed storage for cursors, dead letters and journaled events.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./soundindex.db"`) or a full
    /// SQLite URL (`"sqlite:./soundindex.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, WatcherError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory database. One connection, so every query sees the
    /// same data; everything is lost when the pool is dropped.
    pub async fn in_memory() -> Result<Self, WatcherError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), WatcherError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cursors (
                watcher_id   TEXT    PRIMARY KEY,
                block_number INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS failed_events (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                name         TEXT    NOT NULL,
                error        TEXT    NOT NULL,
                data_json    TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                tx_hash      TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                recorded_at  INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                tag          TEXT    NOT NULL,
                contract     TEXT    NOT NULL,
                address      TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                block_hash   TEXT    NOT NULL,
                tx_hash      TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                values_json  TEXT    NOT NULL,
                UNIQUE (tx_hash, log_index)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_tag ON events (tag);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    // ─── Event journal ──────────────────────────────────────────────────────────

    /// Journaled events with tag `tag`, in chain order.
    pub async fn events_by_tag(&self, tag: &str) -> Result<Vec<RawChainEvent>, WatcherError> {
        let rows = sqlx::query(
            "SELECT tag, contract, address, block_number, block_hash, tx_hash, log_index, values_json
             FROM events WHERE tag = ? ORDER BY block_number, log_index",
        )
        .bind(tag)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(event_from_row).collect()
    }

    /// Total number of journaled events.
    pub async fn event_count(&self) -> Result<u64, WatcherError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM events")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }
}

fn contract_from_str(s: &str) -> Option<ContractId> {
    ContractId::ALL.into_iter().find(|id| id.to_string() == s)
}

fn event_from_row(row: &SqliteRow) -> Result<RawChainEvent, WatcherError> {
    let contract: String = row.get("contract");
    let source = contract_from_str(&contract)
        .ok_or_else(|| storage_err(format!("unknown contract '{contract}' in events table")))?;
    let values: String = row.get("values_json");

    Ok(RawChainEvent {
        event: row.get("tag"),
        return_values: serde_json::from_str(&values).map_err(storage_err)?,
        address: row.get("address"),
        block_number: row.get::<i64, _>("block_number") as u64,
        block_hash: row.get("block_hash"),
        transaction_hash: row.get("tx_hash"),
        log_index: row.get::<i64, _>("log_index") as u32,
        source,
    })
}

// ─── CursorStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl CursorStore for SqliteStorage {
    async fn load(&self, watcher_id: &str) -> Result<Option<BlockCursor>, WatcherError> {
        let row = sqlx::query(
            "SELECT watcher_id, block_number, updated_at FROM cursors WHERE watcher_id = ?",
        )
        .bind(watcher_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| BlockCursor {
            watcher_id: r.get("watcher_id"),
            block_number: r.get::<i64, _>("block_number") as u64,
            updated_at: r.get("updated_at"),
        }))
    }

    async fn save(&self, cursor: BlockCursor) -> Result<(), WatcherError> {
        sqlx::query(
            "INSERT OR REPLACE INTO cursors (watcher_id, block_number, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(&cursor.watcher_id)
        .bind(cursor.block_number as i64)
        .bind(cursor.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(watcher = %cursor.watcher_id, block = cursor.block_number, "cursor saved");
        Ok(())
    }

    async fn delete(&self, watcher_id: &str) -> Result<(), WatcherError> {
        sqlx::query("DELETE FROM cursors WHERE watcher_id = ?")
            .bind(watcher_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

// ─── FailedEventStore impl ───────────────────────────────────────────────────

#[async_trait]
impl FailedEventStore for SqliteStorage {
    async fn record(&self, failed: FailedEvent) -> Result<(), WatcherError> {
        let data = serde_json::to_string(&failed.data).map_err(storage_err)?;
        sqlx::query(
            "INSERT INTO failed_events
             (name, error, data_json, block_number, tx_hash, log_index, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&failed.name)
        .bind(&failed.error)
        .bind(&data)
        .bind(failed.block_number as i64)
        .bind(&failed.transaction_hash)
        .bind(failed.log_index as i64)
        .bind(failed.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<FailedEvent>, WatcherError> {
        let rows = sqlx::query(
            "SELECT name, error, data_json, block_number, tx_hash, log_index, recorded_at
             FROM failed_events ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let data: String = r.get("data_json");
            out.push(FailedEvent {
                name: r.get("name"),
                error: r.get("error"),
                data: serde_json::from_str(&data).map_err(storage_err)?,
                block_number: r.get::<i64, _>("block_number") as u64,
                transaction_hash: r.get("tx_hash"),
                log_index: r.get::<i64, _>("log_index") as u32,
                recorded_at: r.get("recorded_at"),
            });
        }
        Ok(out)
    }

    async fn count(&self) -> Result<u64, WatcherError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM failed_events")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }
}

// ─── EventJournal impl ───────────────────────────────────────────────────────

#[async_trait]
impl EventJournal for SqliteStorage {
    async fn append(&self, event: &RawChainEvent) -> Result<bool, WatcherError> {
        let values = serde_json::to_string(&event.return_values).map_err(storage_err)?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO events
             (tag, contract, address, block_number, block_hash, tx_hash, log_index, values_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event)
        .bind(event.source.to_string())
        .bind(&event.address)
        .bind(event.block_number as i64)
        .bind(&event.block_hash)
        .bind(&event.transaction_hash)
        .bind(event.log_index as i64)
        .bind(&values)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() == 1)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JournalHandler;
    use soundindex_core::{MarketplaceHandler, SystemActor, WatchContext, EventRange};
    use std::sync::Arc;

    fn sample_event(tag: &str, block: u64, log_index: u32) -> RawChainEvent {
        RawChainEvent {
            event: tag.into(),
            return_values: serde_json::json!({
                "owner": "0x1111111111111111111111111111111111111111",
                "tokenId": block.to_string()
            }),
            address: "0xmarket".into(),
            block_number: block,
            block_hash: format!("0xb{block}"),
            transaction_hash: format!("0x{block:064x}"),
            log_index,
            source: ContractId::MARKETPLACE_V2,
        }
    }

    #[tokio::test]
    async fn cursor_roundtrip_and_upsert() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.save(BlockCursor::new("soundchain", 100)).await.unwrap();
        store.save(BlockCursor::new("soundchain", 200)).await.unwrap();

        let loaded = store.load("soundchain").await.unwrap().unwrap();
        assert_eq!(loaded.block_number, 200);
        assert!(store.load("other").await.unwrap().is_none());

        store.delete("soundchain").await.unwrap();
        assert!(store.load("soundchain").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_events_roundtrip() {
        let store = SqliteStorage::in_memory().await.unwrap();
        for block in [10, 11] {
            let failed = FailedEvent::from_event(
                &sample_event("ItemSold", block, 0),
                &WatcherError::handler("ItemSold", "listing not found"),
            );
            store.record(failed).await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 2);
        let list = store.list(10).await.unwrap();
        assert_eq!(list[0].block_number, 11);
        assert_eq!(list[1].data["tokenId"], "10");
        assert!(list[0].error.contains("listing not found"));
    }

    #[tokio::test]
    async fn journal_insert_and_query() {
        let store = SqliteStorage::in_memory().await.unwrap();
        assert!(store.append(&sample_event("ItemListed", 101, 0)).await.unwrap());
        assert!(store.append(&sample_event("ItemListed", 100, 0)).await.unwrap());
        assert!(store.append(&sample_event("ItemSold", 102, 1)).await.unwrap());
        assert!(!store.append(&sample_event("ItemSold", 102, 1)).await.unwrap());

        assert_eq!(store.event_count().await.unwrap(), 3);
        let listed = store.events_by_tag("ItemListed").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].block_number, 100);
        assert_eq!(listed[0].source, ContractId::MARKETPLACE_V2);
        assert_eq!(listed[0].return_values["tokenId"], "100");
    }

    #[tokio::test]
    async fn journal_handler_writes_through() {
        let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let handler = JournalHandler::new(store.clone());
        let ctx = WatchContext {
            actor: SystemActor::new("sys", "_system"),
            range: EventRange::new(100, 110).unwrap(),
            chain: "polygon".into(),
        };

        let event = sample_event("ItemListed", 105, 2);
        handler.listed(&event, &ctx).await.unwrap();
        handler.listed(&event, &ctx).await.unwrap();

        assert_eq!(store.event_count().await.unwrap(), 1);
    }
}
