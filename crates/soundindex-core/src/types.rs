//! Shared types for the watcher pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actor::SystemActor;

// ─── Domain / ContractId ──────────────────────────────────────────────────────

/// Logical event family. Each family is served by one dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Marketplace,
    Nft,
    Auction,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Marketplace, Domain::Nft, Domain::Auction];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marketplace => "marketplace",
            Self::Nft => "nft",
            Self::Auction => "auction",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract generation. V2 contracts are the multi-edition variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractVersion {
    V1,
    V2,
}

/// Identifies one tracked contract: a domain plus a contract generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractId {
    pub domain: Domain,
    pub version: ContractVersion,
}

impl ContractId {
    pub const MARKETPLACE_V1: ContractId = ContractId::new(Domain::Marketplace, ContractVersion::V1);
    pub const MARKETPLACE_V2: ContractId = ContractId::new(Domain::Marketplace, ContractVersion::V2);
    pub const NFT_V1: ContractId = ContractId::new(Domain::Nft, ContractVersion::V1);
    pub const NFT_V2: ContractId = ContractId::new(Domain::Nft, ContractVersion::V2);
    pub const AUCTION_V1: ContractId = ContractId::new(Domain::Auction, ContractVersion::V1);
    pub const AUCTION_V2: ContractId = ContractId::new(Domain::Auction, ContractVersion::V2);

    /// The six contracts, in fetch (and aggregation) order.
    pub const ALL: [ContractId; 6] = [
        Self::MARKETPLACE_V1,
        Self::MARKETPLACE_V2,
        Self::NFT_V1,
        Self::NFT_V2,
        Self::AUCTION_V1,
        Self::AUCTION_V2,
    ];

    pub const fn new(domain: Domain, version: ContractVersion) -> Self {
        Self { domain, version }
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = match self.version {
            ContractVersion::V1 => "v1",
            ContractVersion::V2 => "v2",
        };
        write!(f, "{}-{v}", self.domain)
    }
}

// ─── RawChainEvent ────────────────────────────────────────────────────────────

/// One decoded contract log.
///
/// `event` is the tag the dispatchers route on (e.g. `"ItemListed"`). Logs
/// whose signature is not in the contract ABI carry their raw `topic0` as the
/// tag, so they fall through routing as unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChainEvent {
    /// Event tag.
    pub event: String,
    /// Decoded arguments keyed by parameter name.
    pub return_values: Value,
    /// Emitting contract address.
    pub address: String,
    pub block_number: u64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub log_index: u32,
    /// Which tracked contract produced this event.
    pub source: ContractId,
}

impl RawChainEvent {
    /// Look up a single decoded argument.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.return_values.get(name)
    }

    /// Look up a decoded argument as a string (numbers and addresses are strings).
    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.arg(name).and_then(Value::as_str)
    }

    /// Chain position used when re-ordering across contract versions.
    pub fn chain_position(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }
}

// ─── EventRange ───────────────────────────────────────────────────────────────

/// An inclusive block range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRange {
    pub from: u64,
    pub to: u64,
}

impl EventRange {
    /// Build the range for a cycle. Returns `None` when `from >= to`, which is
    /// treated as "nothing to do".
    pub fn new(from: u64, to: u64) -> Option<Self> {
        (from < to).then_some(Self { from, to })
    }

    /// The cursor value after this range has been fully applied.
    pub fn next_block(&self) -> u64 {
        self.to + 1
    }

    /// Number of blocks covered (inclusive).
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

impl std::fmt::Display for EventRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

// ─── WatchContext ─────────────────────────────────────────────────────────────

/// Context passed to every domain handler during a cycle.
#[derive(Debug, Clone)]
pub struct WatchContext {
    /// Identity that writes triggered by chain events are attributed to.
    pub actor: SystemActor,
    /// The block range being processed.
    pub range: EventRange,
    /// Chain slug (e.g. `"polygon"`).
    pub chain: String,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
