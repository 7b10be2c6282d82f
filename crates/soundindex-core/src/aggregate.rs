//! Merges per-contract fetch results into one event list per domain.

use crate::types::{ContractId, Domain, RawChainEvent};
use crate::watcher::EventOrdering;

/// Events fetched from one tracked contract.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub contract: ContractId,
    pub events: Vec<RawChainEvent>,
}

impl FetchResult {
    pub fn new(contract: ContractId, events: Vec<RawChainEvent>) -> Self {
        Self { contract, events }
    }
}

/// The three per-domain event lists of one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainEvents {
    pub marketplace: Vec<RawChainEvent>,
    pub nft: Vec<RawChainEvent>,
    pub auction: Vec<RawChainEvent>,
}

impl DomainEvents {
    pub fn get(&self, domain: Domain) -> &[RawChainEvent] {
        match domain {
            Domain::Marketplace => &self.marketplace,
            Domain::Nft => &self.nft,
            Domain::Auction => &self.auction,
        }
    }

    fn get_mut(&mut self, domain: Domain) -> &mut Vec<RawChainEvent> {
        match domain {
            Domain::Marketplace => &mut self.marketplace,
            Domain::Nft => &mut self.nft,
            Domain::Auction => &mut self.auction,
        }
    }

    /// Total events across all domains.
    pub fn total(&self) -> usize {
        self.marketplace.len() + self.nft.len() + self.auction.len()
    }
}

/// Concatenate same-domain results, v1 before v2.
///
/// With `EventOrdering::Arrival` each contract's events keep the order they
/// were fetched in and nothing is interleaved. With `EventOrdering::Chain`
/// each merged list is then stably sorted by `(block_number, log_index)`.
pub fn aggregate(mut results: Vec<FetchResult>, ordering: EventOrdering) -> DomainEvents {
    // Stable: contracts listed twice keep their relative order.
    results.sort_by_key(|r| r.contract.version);

    let mut out = DomainEvents::default();
    for result in results {
        out.get_mut(result.contract.domain).extend(result.events);
    }

    if ordering == EventOrdering::Chain {
        for domain in Domain::ALL {
            out.get_mut(domain).sort_by_key(RawChainEvent::chain_position);
        }
    }
    out
}
