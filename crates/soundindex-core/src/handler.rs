//! Domain handler traits and the tag routers in front of them.
//!
//! Each domain has a fixed set of event tags. A router matches an event's tag
//! against that set and forwards the event to exactly one handler method.
//! Tags outside the set are reported back as unrouted; they are not errors.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::WatcherError;
use crate::types::{Domain, RawChainEvent, WatchContext};

macro_rules! event_tags {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The on-chain event name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Match a raw event tag. Exact, case-sensitive.
            pub fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $(stringify!($variant) => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

event_tags! {
    /// Marketplace (buy-now listing) events, v1 and editions contracts.
    MarketplaceEvent {
        ItemListed,
        ItemSold,
        ItemUpdated,
        ItemCanceled,
        EditionListed,
        EditionCanceled,
    }
}

event_tags! {
    /// NFT contract events.
    NftEvent {
        Transfer,
        EditionCreated,
    }
}

event_tags! {
    /// Auction contract events. Note the double "l" in `AuctionCancelled`.
    AuctionEvent {
        AuctionCreated,
        BidPlaced,
        AuctionResulted,
        AuctionCancelled,
        UpdateAuction,
    }
}

// ─── Handler traits ──────────────────────────────────────────────────────────

/// Persists the effects of marketplace events.
#[async_trait]
pub trait MarketplaceHandler: Send + Sync {
    async fn listed(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn sold(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn updated(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn canceled(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn edition_listed(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn edition_canceled(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
}

/// Persists the effects of NFT events.
#[async_trait]
pub trait NftHandler: Send + Sync {
    async fn transfer(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn edition_created(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
}

/// Persists the effects of auction events.
#[async_trait]
pub trait AuctionHandler: Send + Sync {
    async fn created(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn bid_placed(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn resulted(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn canceled(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
    async fn update(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<(), WatcherError>;
}

// ─── Routers ─────────────────────────────────────────────────────────────────

/// Routes events of one domain to handler methods by tag.
#[async_trait]
pub trait DomainRouter: Send + Sync {
    fn domain(&self) -> Domain;

    /// Forward `event` to its handler. Returns `Ok(false)` when the tag is not
    /// one this domain knows, in which case no handler ran.
    async fn route(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<bool, WatcherError>;
}

pub struct MarketplaceRouter {
    handler: Arc<dyn MarketplaceHandler>,
}

impl MarketplaceRouter {
    pub fn new(handler: Arc<dyn MarketplaceHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl DomainRouter for MarketplaceRouter {
    fn domain(&self) -> Domain {
        Domain::Marketplace
    }

    async fn route(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<bool, WatcherError> {
        let Some(tag) = MarketplaceEvent::from_tag(&event.event) else {
            return Ok(false);
        };
        let h = &self.handler;
        match tag {
            MarketplaceEvent::ItemListed => h.listed(event, ctx).await?,
            MarketplaceEvent::ItemSold => h.sold(event, ctx).await?,
            MarketplaceEvent::ItemUpdated => h.updated(event, ctx).await?,
            MarketplaceEvent::ItemCanceled => h.canceled(event, ctx).await?,
            MarketplaceEvent::EditionListed => h.edition_listed(event, ctx).await?,
            MarketplaceEvent::EditionCanceled => h.edition_canceled(event, ctx).await?,
        }
        Ok(true)
    }
}

pub struct NftRouter {
    handler: Arc<dyn NftHandler>,
}

impl NftRouter {
    pub fn new(handler: Arc<dyn NftHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl DomainRouter for NftRouter {
    fn domain(&self) -> Domain {
        Domain::Nft
    }

    async fn route(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<bool, WatcherError> {
        let Some(tag) = NftEvent::from_tag(&event.event) else {
            return Ok(false);
        };
        match tag {
            NftEvent::Transfer => self.handler.transfer(event, ctx).await?,
            NftEvent::EditionCreated => self.handler.edition_created(event, ctx).await?,
        }
        Ok(true)
    }
}

pub struct AuctionRouter {
    handler: Arc<dyn AuctionHandler>,
}

impl AuctionRouter {
    pub fn new(handler: Arc<dyn AuctionHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl DomainRouter for AuctionRouter {
    fn domain(&self) -> Domain {
        Domain::Auction
    }

    async fn route(&self, event: &RawChainEvent, ctx: &WatchContext) -> Result<bool, WatcherError> {
        let Some(tag) = AuctionEvent::from_tag(&event.event) else {
            return Ok(false);
        };
        let h = &self.handler;
        match tag {
            AuctionEvent::AuctionCreated => h.created(event, ctx).await?,
            AuctionEvent::BidPlaced => h.bid_placed(event, ctx).await?,
            AuctionEvent::AuctionResulted => h.resulted(event, ctx).await?,
            AuctionEvent::AuctionCancelled => h.canceled(event, ctx).await?,
            AuctionEvent::UpdateAuction => h.update(event, ctx).await?,
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::SystemActor;
    use crate::types::{ContractId, EventRange};
    use std::sync::Mutex;

    /// Records `method` names in call order.
    #[derive(Default)]
    struct Calls(Mutex<Vec<&'static str>>);

    impl Calls {
        fn push(&self, m: &'static str) -> Result<(), WatcherError> {
            self.0.lock().unwrap().push(m);
            Ok(())
        }
        fn take(&self) -> Vec<&'static str> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    #[async_trait]
    impl MarketplaceHandler for Calls {
        async fn listed(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("listed")
        }
        async fn sold(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("sold")
        }
        async fn updated(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("updated")
        }
        async fn canceled(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("canceled")
        }
        async fn edition_listed(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("edition_listed")
        }
        async fn edition_canceled(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("edition_canceled")
        }
    }

    #[async_trait]
    impl NftHandler for Calls {
        async fn transfer(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("transfer")
        }
        async fn edition_created(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("edition_created")
        }
    }

    #[async_trait]
    impl AuctionHandler for Calls {
        async fn created(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("created")
        }
        async fn bid_placed(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("bid_placed")
        }
        async fn resulted(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("resulted")
        }
        async fn canceled(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("auction_canceled")
        }
        async fn update(&self, _: &RawChainEvent, _: &WatchContext) -> Result<(), WatcherError> {
            self.push("update")
        }
    }

    fn ctx() -> WatchContext {
        WatchContext {
            actor: SystemActor::new("sys", "_system"),
            range: EventRange::new(1, 2).unwrap(),
            chain: "polygon".into(),
        }
    }

    fn ev(tag: &str) -> RawChainEvent {
        RawChainEvent {
            event: tag.into(),
            return_values: serde_json::Value::Null,
            address: "0x0".into(),
            block_number: 1,
            block_hash: "0x0".into(),
            transaction_hash: "0x0".into(),
            log_index: 0,
            source: ContractId::MARKETPLACE_V1,
        }
    }

    #[test]
    fn tag_parsing_is_exact() {
        assert_eq!(MarketplaceEvent::from_tag("ItemListed"), Some(MarketplaceEvent::ItemListed));
        assert_eq!(MarketplaceEvent::from_tag("itemlisted"), None);
        assert_eq!(AuctionEvent::from_tag("AuctionCancelled"), Some(AuctionEvent::AuctionCancelled));
        assert_eq!(AuctionEvent::from_tag("AuctionCanceled"), None);
        for tag in NftEvent::ALL {
            assert_eq!(NftEvent::from_tag(tag.as_str()), Some(*tag));
        }
    }

    #[tokio::test]
    async fn marketplace_tags_map_to_one_method_each() {
        let calls = Arc::new(Calls::default());
        let router = MarketplaceRouter::new(calls.clone());
        let ctx = ctx();

        for tag in MarketplaceEvent::ALL {
            assert!(router.route(&ev(tag.as_str()), &ctx).await.unwrap());
        }
        assert_eq!(
            calls.take(),
            vec!["listed", "sold", "updated", "canceled", "edition_listed", "edition_canceled"]
        );
    }

    #[tokio::test]
    async fn auction_and_nft_tags_map_to_one_method_each() {
        let calls = Arc::new(Calls::default());
        let auction = AuctionRouter::new(calls.clone());
        let nft = NftRouter::new(calls.clone());
        let ctx = ctx();

        for tag in AuctionEvent::ALL {
            assert!(auction.route(&ev(tag.as_str()), &ctx).await.unwrap());
        }
        for tag in NftEvent::ALL {
            assert!(nft.route(&ev(tag.as_str()), &ctx).await.unwrap());
        }
        assert_eq!(
            calls.take(),
            vec![
                "created",
                "bid_placed",
                "resulted",
                "auction_canceled",
                "update",
                "transfer",
                "edition_created"
            ]
        );
    }

    #[tokio::test]
    async fn unknown_and_foreign_tags_are_unrouted() {
        let calls = Arc::new(Calls::default());
        let router = MarketplaceRouter::new(calls.clone());
        let ctx = ctx();

        assert!(!router.route(&ev("Approval"), &ctx).await.unwrap());
        // A valid tag of another domain is still unknown here.
        assert!(!router.route(&ev("Transfer"), &ctx).await.unwrap());
        assert!(calls.take().is_empty());
    }
}
