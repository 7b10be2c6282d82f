//! soundindex-evm: EVM side of the SoundChain watcher.
//!
//! - [`rpc`]: `ChainClient` trait and the HTTP JSON-RPC implementation
//! - [`abi`]: event signatures, topic0 hashing, log decoding
//! - [`fetcher`]: one fetcher per contract, run concurrently per cycle
//! - [`watcher`]: the poll cycle and the interval loop

pub mod abi;
pub mod builder;
pub mod fetcher;
pub mod retry;
pub mod rpc;
pub mod watcher;

pub use abi::{ContractAbi, DecodedLog, EventAbi};
pub use builder::WatcherBuilder;
pub use fetcher::{fetch_all, ContractAddresses, ContractFetcher};
pub use rpc::{ChainClient, HttpChainClient, HttpClientConfig, RawLog};
pub use watcher::{CycleOutcome, CycleReport, Watcher};
