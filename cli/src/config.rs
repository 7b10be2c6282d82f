//! TOML config file.
//!
//! ```toml
//! [watcher]
//! id = "soundchain"
//! start_block = 27000000
//! confirmations = 5
//!
//! [rpc]
//! url = "https://polygon-rpc.com"
//! timeout_ms = 30000
//!
//! [contracts]
//! marketplace_v1 = "0x..."
//! # ... six addresses
//!
//! [storage]
//! sqlite_path = "./soundindex.db"
//!
//! [actor]
//! system_user_id = "..."
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use soundindex_core::WatcherConfig;
use soundindex_evm::retry::RetryConfig;
use soundindex_evm::{ContractAddresses, HttpClientConfig};

use crate::logging::LogConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watcher: WatcherConfig,
    pub rpc: RpcSection,
    pub contracts: ContractAddresses,
    pub storage: StorageSection,
    pub log: LogConfig,
    pub actor: ActorSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSection {
    pub url: Option<String>,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for RpcSection {
    fn default() -> Self {
        let http = HttpClientConfig::default();
        Self {
            url: None,
            timeout_ms: http.request_timeout_ms,
            retry: http.retry,
        }
    }
}

impl RpcSection {
    pub fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout_ms: self.timeout_ms,
            retry: self.retry.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub sqlite_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            sqlite_path: "./soundindex.db".into(),
        }
    }
}

/// Who chain-driven writes are attributed to. Either a fixed user id, or a
/// handle → id map searched for `watcher.system_handle`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorSection {
    pub system_user_id: Option<String>,
    pub users: HashMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn watcher(&self) -> &WatcherConfig {
        &self.watcher
    }
}
