//! An append-only journal of handled events, and handlers that write to it.
//!
//! `JournalHandler` implements all three domain handler traits by appending
//! each event it receives. Appends are keyed by `(transaction_hash,
//! log_index)`, so replaying a range after a failed cycle does not create
//! duplicates.

use async_trait::async_trait;
use std::sync::Arc;

use soundindex_core::{
    AuctionHandler, MarketplaceHandler, NftHandler, RawChainEvent, WatchContext, WatcherError,
};

/// Durable record of events that reached a handler.
#[async_trait]
pub trait EventJournal: Send + Sync {
    /// Append `event`. Returns `false` if it was already journaled.
    async fn append(&self, event: &RawChainEvent) -> Result<bool, WatcherError>;
}

/// Domain handler that journals every event it is given.
pub struct JournalHandler<J> {
    journal: Arc<J>,
}

impl<J> Clone for JournalHandler<J> {
    fn clone(&self) -> Self {
        Self {
            journal: Arc::clone(&self.journal),
        }
    }
}

impl<J: EventJournal> JournalHandler<J> {
    pub fn new(journal: Arc<J>) -> Self {
        Self { journal }
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    async fn record(
        &self,
        action: &'static str,
        event: &RawChainEvent,
        ctx: &WatchContext,
    ) -> Result<(), WatcherError> {
        let inserted = self.journal.append(event).await?;
        tracing::debug!(
            action,
            tag = %event.event,
            contract = %event.source,
            block = event.block_number,
            tx = %event.transaction_hash,
            actor = %ctx.actor.user_id,
            replay = !inserted,
            "journaled event"
        );
        Ok(())
    }
}

#[async_trait]
impl<J: EventJournal> MarketplaceHandler for JournalHandler<J> {
    async fn listed(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("listed", e, ctx).await
    }
    async fn sold(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("sold", e, ctx).await
    }
    async fn updated(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("updated", e, ctx).await
    }
    async fn canceled(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("canceled", e, ctx).await
    }
    async fn edition_listed(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("edition_listed", e, ctx).await
    }
    async fn edition_canceled(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("edition_canceled", e, ctx).await
    }
}

#[async_trait]
impl<J: EventJournal> NftHandler for JournalHandler<J> {
    async fn transfer(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("transfer", e, ctx).await
    }
    async fn edition_created(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("edition_created", e, ctx).await
    }
}

#[async_trait]
impl<J: EventJournal> AuctionHandler for JournalHandler<J> {
    async fn created(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("auction_created", e, ctx).await
    }
    async fn bid_placed(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("bid_placed", e, ctx).await
    }
    async fn resulted(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("auction_resulted", e, ctx).await
    }
    async fn canceled(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("auction_canceled", e, ctx).await
    }
    async fn update(&self, e: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError> {
        self.record("update_auction", e, ctx).await
    }
}
