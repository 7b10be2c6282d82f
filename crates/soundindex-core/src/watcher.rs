//! Watcher configuration and state types.

use serde::{Deserialize, Serialize};

use crate::actor::SYSTEM_HANDLE;

/// How the two contract versions of a domain are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrdering {
    /// All v1 events, then all v2 events, each in the order fetched.
    #[default]
    Arrival,
    /// Stable sort of the merged list by `(block_number, log_index)`.
    Chain,
}

/// What a dispatcher does when a domain handler fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the domain and fail the cycle; the cursor is not advanced.
    #[default]
    Propagate,
    /// Record the event as a dead letter and continue with the next one.
    DeadLetter,
}

/// Configuration for a watcher instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Unique name for this watcher (used as the cursor key).
    pub id: String,
    /// Chain slug (e.g. `"polygon"`).
    pub chain: String,
    /// Cursor value used when nothing has been persisted yet.
    pub start_block: u64,
    /// Blocks to stay behind the chain head. 0 follows the head exactly.
    pub confirmations: u64,
    /// How far past the cursor one cycle reaches: the range is
    /// `[cursor, cursor + cap]`, so it spans `cap + 1` blocks. `None` = up to
    /// the head in one go.
    pub max_block_range: Option<u64>,
    /// Merge order of v1 and v2 events.
    pub ordering: EventOrdering,
    /// Handler failure behaviour.
    pub failure_policy: FailurePolicy,
    /// Delay between cycles when running continuously (milliseconds).
    pub poll_interval_ms: u64,
    /// Reserved handle of the system user.
    pub system_handle: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            id: "soundchain".into(),
            chain: "polygon".into(),
            start_block: 0,
            confirmations: 0,
            max_block_range: None,
            ordering: EventOrdering::Arrival,
            failure_policy: FailurePolicy::Propagate,
            poll_interval_ms: 60_000,
            system_handle: SYSTEM_HANDLE.into(),
        }
    }
}

/// Runtime state of the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatcherState {
    /// No cycle running.
    Idle,
    /// Reading the cursor and fetching logs.
    Fetching,
    /// Handlers are running.
    Dispatching,
    /// Writing the new cursor.
    Committing,
    /// The continuous loop has been asked to stop.
    Stopped,
}

impl std::fmt::Display for WatcherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Committing => write!(f, "committing"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
