//! System actor: the identity chain-triggered writes are attributed to.
//!
//! The actor is resolved once at start-up (by looking up a reserved handle,
//! `_system` by default) and then handed to the watcher as a plain value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::WatcherError;

/// Default reserved handle of the system user.
pub const SYSTEM_HANDLE: &str = "_system";

/// The resolved system identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemActor {
    /// User id in the application's user store.
    pub user_id: String,
    /// Handle the id was resolved from.
    pub handle: String,
}

impl SystemActor {
    pub fn new(user_id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            handle: handle.into(),
        }
    }

    /// Resolve the actor for `handle` through `directory`.
    pub async fn resolve(
        directory: &dyn ActorDirectory,
        handle: &str,
    ) -> Result<Self, WatcherError> {
        match directory.find_by_handle(handle).await? {
            Some(user_id) => {
                tracing::info!(handle, user_id = %user_id, "resolved system actor");
                Ok(Self::new(user_id, handle))
            }
            None => Err(WatcherError::Config(format!(
                "no user with reserved handle '{handle}'"
            ))),
        }
    }
}

/// Lookup of user ids by handle.
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<String>, WatcherError>;
}

/// Directory backed by a fixed handle → id map (usually from config).
#[derive(Debug, Clone, Default)]
pub struct StaticActorDirectory {
    users: HashMap<String, String>,
}

impl StaticActorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, handle: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.users.insert(handle.into(), user_id.into());
        self
    }
}

impl From<HashMap<String, String>> for StaticActorDirectory {
    fn from(users: HashMap<String, String>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl ActorDirectory for StaticActorDirectory {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<String>, WatcherError> {
        Ok(self.users.get(handle).cloned())
    }
}
