//! Per-contract event fetchers.
//!
//! Each of the six tracked contracts gets one `ContractFetcher`, which pulls
//! the whole range in a single `eth_getLogs` call and decodes every log with
//! the contract's ABI. A log that does not decode is kept raw rather than
//! failing the range; only bad block or log-index metadata is an error.
//! `fetch_all` runs the six fetchers concurrently and fails as a whole if any
//! one of them fails.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use soundindex_core::{ContractId, EventRange, FetchResult, RawChainEvent, WatcherError};

use crate::abi::{ContractAbi, DecodedLog};
use crate::rpc::{ChainClient, RawLog};

/// Deployed addresses of the six contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub marketplace_v1: Option<String>,
    pub marketplace_v2: Option<String>,
    pub nft_v1: Option<String>,
    pub nft_v2: Option<String>,
    pub auction_v1: Option<String>,
    pub auction_v2: Option<String>,
}

impl ContractAddresses {
    pub fn get(&self, id: ContractId) -> Option<&str> {
        let slot = match id {
            ContractId::MARKETPLACE_V1 => &self.marketplace_v1,
            ContractId::MARKETPLACE_V2 => &self.marketplace_v2,
            ContractId::NFT_V1 => &self.nft_v1,
            ContractId::NFT_V2 => &self.nft_v2,
            ContractId::AUCTION_V1 => &self.auction_v1,
            _ => &self.auction_v2,
        };
        slot.as_deref().filter(|s| !s.is_empty())
    }

    pub fn set(&mut self, id: ContractId, address: impl Into<String>) {
        let slot = match id {
            ContractId::MARKETPLACE_V1 => &mut self.marketplace_v1,
            ContractId::MARKETPLACE_V2 => &mut self.marketplace_v2,
            ContractId::NFT_V1 => &mut self.nft_v1,
            ContractId::NFT_V2 => &mut self.nft_v2,
            ContractId::AUCTION_V1 => &mut self.auction_v1,
            _ => &mut self.auction_v2,
        };
        *slot = Some(address.into());
    }

    /// The address for `id`, or a configuration error naming the contract.
    pub fn require(&self, id: ContractId) -> Result<&str, WatcherError> {
        self.get(id)
            .ok_or_else(|| WatcherError::Config(format!("no address configured for {id}")))
    }
}

/// Fetches and decodes the logs of one contract.
#[derive(Debug, Clone)]
pub struct ContractFetcher {
    pub id: ContractId,
    pub address: String,
    abi: Arc<ContractAbi>,
}

impl ContractFetcher {
    pub fn new(id: ContractId, address: impl Into<String>, abi: Arc<ContractAbi>) -> Self {
        Self {
            id,
            address: address.into(),
            abi,
        }
    }

    pub fn abi(&self) -> &ContractAbi {
        &self.abi
    }

    /// All events this contract emitted in `range`, in node order.
    pub async fn fetch_all_events(
        &self,
        client: &dyn ChainClient,
        range: EventRange,
    ) -> Result<Vec<RawChainEvent>, WatcherError> {
        let logs = client.get_logs(&self.address, range).await?;
        let mut events = Vec::with_capacity(logs.len());
        for log in logs.iter().filter(|l| !l.is_removed()) {
            events.push(self.to_event(log)?);
        }
        tracing::debug!(contract = %self.id, %range, count = events.len(), "fetched events");
        Ok(events)
    }

    fn to_event(&self, log: &RawLog) -> Result<RawChainEvent, WatcherError> {
        let decode_err = |reason: String| WatcherError::Decode {
            contract: self.id.to_string(),
            reason,
        };
        // A log that matches a known topic0 but not its layout would fail every
        // retry of this range, so it is kept raw and left unrouted.
        let decoded = self.abi.decode_log(log).unwrap_or_else(|e| {
            tracing::warn!(
                contract = %self.id,
                tx = %log.tx_hash,
                log_index = %log.log_index,
                error = %e,
                "undecodable log kept raw"
            );
            DecodedLog::raw(log)
        });
        let block_number = log
            .block_number_u64()
            .ok_or_else(|| decode_err(format!("bad blockNumber '{}'", log.block_number)))?;
        let log_index = log
            .log_index_u32()
            .ok_or_else(|| decode_err(format!("bad logIndex '{}'", log.log_index)))?;

        Ok(RawChainEvent {
            event: decoded.event,
            return_values: decoded.return_values,
            address: log.address.clone(),
            block_number,
            block_hash: log.block_hash.clone(),
            transaction_hash: log.tx_hash.clone(),
            log_index,
            source: self.id,
        })
    }
}

/// Run every fetcher over `range` concurrently. The first failure fails the
/// whole fetch.
pub async fn fetch_all(
    fetchers: &[ContractFetcher],
    client: &dyn ChainClient,
    range: EventRange,
) -> Result<Vec<FetchResult>, WatcherError> {
    try_join_all(fetchers.iter().map(|f| async move {
        let events = f.fetch_all_events(client, range).await?;
        Ok::<_, WatcherError>(FetchResult::new(f.id, events))
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::soundchain;
    use async_trait::async_trait;

    struct OneLog(RawLog);

    #[async_trait]
    impl ChainClient for OneLog {
        async fn latest_block_number(&self) -> Result<u64, WatcherError> {
            Ok(0)
        }
        async fn get_logs(&self, _: &str, _: EventRange) -> Result<Vec<RawLog>, WatcherError> {
            Ok(vec![self.0.clone()])
        }
    }

    fn cancel_log(block: &str, removed: Option<bool>) -> RawLog {
        let abi = soundchain::contract_abi(ContractId::MARKETPLACE_V1).unwrap();
        let topic0 = abi.event_by_name("ItemCanceled").unwrap().topic0().to_string();
        RawLog {
            address: "0xmarket".into(),
            topics: vec![
                topic0,
                format!("0x{:064x}", 1),
                format!("0x{:064x}", 2),
            ],
            data: format!("0x{:064x}", 9),
            block_number: block.into(),
            block_hash: "0xbh".into(),
            tx_hash: "0xtx".into(),
            log_index: "0x3".into(),
            removed,
        }
    }

    fn fetcher() -> ContractFetcher {
        let abi = soundchain::contract_abi(ContractId::MARKETPLACE_V1).unwrap();
        ContractFetcher::new(ContractId::MARKETPLACE_V1, "0xmarket", Arc::new(abi))
    }

    #[tokio::test]
    async fn decodes_into_raw_chain_event() {
        let client = OneLog(cancel_log("0x64", None));
        let range = EventRange::new(100, 101).unwrap();
        let events = fetcher().fetch_all_events(&client, range).await.unwrap();

        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.event, "ItemCanceled");
        assert_eq!(e.block_number, 100);
        assert_eq!(e.log_index, 3);
        assert_eq!(e.source, ContractId::MARKETPLACE_V1);
        assert_eq!(e.arg_str("tokenId"), Some("9"));
    }

    #[tokio::test]
    async fn skips_removed_logs() {
        let client = OneLog(cancel_log("0x64", Some(true)));
        let range = EventRange::new(100, 101).unwrap();
        assert!(fetcher().fetch_all_events(&client, range).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_block_number_is_decode_error() {
        let client = OneLog(cancel_log("nope", None));
        let range = EventRange::new(100, 101).unwrap();
        let err = fetcher().fetch_all_events(&client, range).await.unwrap_err();
        assert!(matches!(err, WatcherError::Decode { .. }));
    }

    #[tokio::test]
    async fn undecodable_log_is_kept_raw() {
        let mut log = cancel_log("0x64", None);
        log.topics.truncate(2);
        let topic0 = log.topics[0].clone();
        let client = OneLog(log);
        let range = EventRange::new(100, 101).unwrap();

        let events = fetcher().fetch_all_events(&client, range).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, topic0.to_lowercase());
        assert_eq!(events[0].return_values["topics"].as_array().unwrap().len(), 2);
        assert_eq!(events[0].block_number, 100);
    }

    #[test]
    fn addresses_lookup() {
        let mut addrs = ContractAddresses::default();
        addrs.set(ContractId::AUCTION_V2, "0xa2");
        assert_eq!(addrs.get(ContractId::AUCTION_V2), Some("0xa2"));
        assert!(addrs.get(ContractId::AUCTION_V1).is_none());
        assert!(addrs.require(ContractId::NFT_V1).is_err());
    }
}
