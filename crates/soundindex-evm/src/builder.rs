//! Fluent builder for `Watcher`.
//!
//! # Example
//!
//! ```rust,no_run
//! use soundindex_evm::WatcherBuilder;
//!
//! let config = WatcherBuilder::new()
//!     .id("soundchain-polygon")
//!     .chain("polygon")
//!     .start_block(27_000_000)
//!     .confirmations(5)
//!     .max_block_range(2_000)
//!     .build_config();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use soundindex_core::{
    ActorDirectory, AuctionHandler, AuctionRouter, ContractId, CursorStore, CursorTracker,
    Dispatcher, EventOrdering, FailedEventStore, FailurePolicy, MarketplaceHandler,
    MarketplaceRouter, MemoryCursorStore, NftHandler, NftRouter, SystemActor, WatcherConfig,
    WatcherError, WatcherState,
};

use crate::abi::{soundchain, ContractAbi};
use crate::fetcher::{ContractAddresses, ContractFetcher};
use crate::rpc::ChainClient;
use crate::watcher::Watcher;

/// Assembles a `Watcher` from its configuration and collaborators.
#[derive(Default)]
pub struct WatcherBuilder {
    config: WatcherConfig,
    client: Option<Arc<dyn ChainClient>>,
    cursor_store: Option<Box<dyn CursorStore>>,
    contracts: ContractAddresses,
    abis: HashMap<ContractId, ContractAbi>,
    marketplace: Option<Arc<dyn MarketplaceHandler>>,
    nft: Option<Arc<dyn NftHandler>>,
    auction: Option<Arc<dyn AuctionHandler>>,
    dead_letters: Option<Arc<dyn FailedEventStore>>,
    actor: Option<SystemActor>,
    directory: Option<Arc<dyn ActorDirectory>>,
}

impl WatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration (e.g. loaded from a file).
    pub fn with_config(config: WatcherConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set the watcher ID (used as the cursor key).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.config.chain = chain.into();
        self
    }

    /// Cursor value used on first run.
    pub fn start_block(mut self, block: u64) -> Self {
        self.config.start_block = block;
        self
    }

    /// Stay this many blocks behind the head.
    pub fn confirmations(mut self, depth: u64) -> Self {
        self.config.confirmations = depth;
        self
    }

    /// Cap how far past the cursor one cycle may reach.
    pub fn max_block_range(mut self, blocks: u64) -> Self {
        self.config.max_block_range = Some(blocks);
        self
    }

    pub fn ordering(mut self, ordering: EventOrdering) -> Self {
        self.config.ordering = ordering;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn system_handle(mut self, handle: impl Into<String>) -> Self {
        self.config.system_handle = handle.into();
        self
    }

    /// Return the configuration without building a watcher.
    pub fn build_config(self) -> WatcherConfig {
        self.config
    }

    pub fn client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Defaults to an in-process `MemoryCursorStore`.
    pub fn cursor_store(mut self, store: Box<dyn CursorStore>) -> Self {
        self.cursor_store = Some(store);
        self
    }

    pub fn contracts(mut self, contracts: ContractAddresses) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn contract(mut self, id: ContractId, address: impl Into<String>) -> Self {
        self.contracts.set(id, address);
        self
    }

    /// Replace the built-in ABI of one contract.
    pub fn abi(mut self, id: ContractId, abi: ContractAbi) -> Self {
        self.abis.insert(id, abi);
        self
    }

    pub fn marketplace_handler(mut self, handler: Arc<dyn MarketplaceHandler>) -> Self {
        self.marketplace = Some(handler);
        self
    }

    pub fn nft_handler(mut self, handler: Arc<dyn NftHandler>) -> Self {
        self.nft = Some(handler);
        self
    }

    pub fn auction_handler(mut self, handler: Arc<dyn AuctionHandler>) -> Self {
        self.auction = Some(handler);
        self
    }

    /// Required when the failure policy is `DeadLetter`.
    pub fn dead_letters(mut self, store: Arc<dyn FailedEventStore>) -> Self {
        self.dead_letters = Some(store);
        self
    }

    /// Use a known system actor instead of looking one up.
    pub fn actor(mut self, actor: SystemActor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Resolve the system actor by `system_handle` at build time.
    pub fn actor_directory(mut self, directory: Arc<dyn ActorDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub async fn build(mut self) -> Result<Watcher, WatcherError> {
        let missing = |what: &str| WatcherError::Config(format!("watcher needs {what}"));

        if self.config.max_block_range == Some(0) {
            return Err(WatcherError::Config("max_block_range must be > 0".into()));
        }

        let client = self.client.take().ok_or_else(|| missing("a chain client"))?;
        let marketplace = self.marketplace.take().ok_or_else(|| missing("a marketplace handler"))?;
        let nft = self.nft.take().ok_or_else(|| missing("an nft handler"))?;
        let auction = self.auction.take().ok_or_else(|| missing("an auction handler"))?;

        let actor = match (self.actor.take(), self.directory.take()) {
            (Some(actor), _) => actor,
            (None, Some(dir)) => SystemActor::resolve(dir.as_ref(), &self.config.system_handle).await?,
            (None, None) => return Err(missing("a system actor or actor directory")),
        };

        let mut fetchers = Vec::with_capacity(ContractId::ALL.len());
        for id in ContractId::ALL {
            let address = self.contracts.require(id)?.to_string();
            let abi = match self.abis.remove(&id) {
                Some(abi) => abi,
                None => soundchain::contract_abi(id)?,
            };
            fetchers.push(ContractFetcher::new(id, address, Arc::new(abi)));
        }

        let dispatcher = Dispatcher::new(self.config.failure_policy, self.dead_letters.take())?;
        let store = self
            .cursor_store
            .take()
            .unwrap_or_else(|| Box::new(MemoryCursorStore::new()));
        let cursor = CursorTracker::new(store, self.config.id.clone(), self.config.start_block);

        Ok(Watcher {
            config: self.config,
            client,
            cursor,
            fetchers,
            marketplace: MarketplaceRouter::new(marketplace),
            nft: NftRouter::new(nft),
            auction: AuctionRouter::new(auction),
            dispatcher,
            actor,
            in_flight: tokio::sync::Mutex::new(()),
            state: Mutex::new(WatcherState::Idle),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_config_fields() {
        let config = WatcherBuilder::new()
            .id("sc")
            .chain("mumbai")
            .start_block(100)
            .confirmations(3)
            .max_block_range(50)
            .ordering(EventOrdering::Chain)
            .failure_policy(FailurePolicy::DeadLetter)
            .poll_interval_ms(5_000)
            .build_config();

        assert_eq!(config.id, "sc");
        assert_eq!(config.chain, "mumbai");
        assert_eq!(config.start_block, 100);
        assert_eq!(config.confirmations, 3);
        assert_eq!(config.max_block_range, Some(50));
        assert_eq!(config.ordering, EventOrdering::Chain);
        assert_eq!(config.failure_policy, FailurePolicy::DeadLetter);
        assert_eq!(config.poll_interval_ms, 5_000);
    }

    #[tokio::test]
    async fn build_without_client_fails() {
        let err = WatcherBuilder::new().build().await.err().unwrap();
        assert!(matches!(err, WatcherError::Config(_)));
    }
}
