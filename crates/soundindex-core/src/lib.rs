//! soundindex-core: foundation for the SoundChain marketplace chain watcher.
//!
//! # Architecture
//!
//! ```text
//! WatcherBuilder → Watcher::poll_once
//!                      ├── CursorTracker    (durable "next block" cursor)
//!                      ├── ContractFetchers (six contracts, fetched concurrently)
//!                      ├── aggregate        (v1 + v2 → marketplace / nft / auction)
//!                      ├── Dispatcher       (sequential per domain, routed by tag)
//!                      └── FailedEventStore (optional dead letters)
//! ```
//!
//! The fetching and orchestration halves live in `soundindex-evm`; storage
//! backends in `soundindex-storage`.

pub mod actor;
pub mod aggregate;
pub mod cursor;
pub mod dead_letter;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod types;
pub mod watcher;

pub use actor::{ActorDirectory, StaticActorDirectory, SystemActor};
pub use aggregate::{aggregate, DomainEvents, FetchResult};
pub use cursor::{BlockCursor, CursorStore, CursorTracker, MemoryCursorStore};
pub use dead_letter::{FailedEvent, FailedEventStore, MemoryFailedEventStore};
pub use dispatch::{DispatchReport, Dispatcher};
pub use error::WatcherError;
pub use handler::{
    AuctionEvent, AuctionHandler, AuctionRouter, DomainRouter, MarketplaceEvent,
    MarketplaceHandler, MarketplaceRouter, NftEvent, NftHandler, NftRouter,
};
pub use types::{ContractId, ContractVersion, Domain, EventRange, RawChainEvent, WatchContext};
pub use watcher::{EventOrdering, FailurePolicy, WatcherConfig, WatcherState};
