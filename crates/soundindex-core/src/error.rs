//! Error types for the watcher pipeline.

use thiserror::Error;

/// Errors that can occur during a poll cycle.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to decode log from {contract}: {reason}")]
    Decode { contract: String, reason: String },

    #[error("Handler error in '{handler}': {reason}")]
    Handler { handler: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl WatcherError {
    /// Convenience constructor for handler failures.
    pub fn handler(handler: impl Into<String>, reason: impl ToString) -> Self {
        Self::Handler {
            handler: handler.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if the error came from fetching or decoding chain data.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Decode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failure_classification() {
        assert!(WatcherError::Rpc("timeout".into()).is_fetch_failure());
        assert!(WatcherError::Decode {
            contract: "marketplace-v1".into(),
            reason: "short data".into()
        }
        .is_fetch_failure());
        assert!(!WatcherError::Storage("down".into()).is_fetch_failure());
        assert!(!WatcherError::handler("listed", "boom").is_fetch_failure());
    }

    #[test]
    fn handler_error_message() {
        let e = WatcherError::handler("ItemSold", "listing not found");
        assert_eq!(e.to_string(), "Handler error in 'ItemSold': listing not found");
    }
}
