//! soundindex-storage: storage backends for the SoundChain watcher.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (single-file persistence)
//!
//! Both implement `CursorStore`, `FailedEventStore`, and [`EventJournal`],
//! so either can back a watcher on its own.

pub mod journal;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use journal::{EventJournal, JournalHandler};
pub use memory::InMemoryStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
