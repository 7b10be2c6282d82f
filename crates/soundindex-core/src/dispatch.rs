//! Sequential per-domain dispatch.
//!
//! Events are handed to the router one at a time, in list order, and each
//! handler is awaited before the next event starts. Two events touching the
//! same record (a listing followed by its sale) are therefore applied in
//! fetch order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::dead_letter::{FailedEvent, FailedEventStore};
use crate::error::WatcherError;
use crate::handler::DomainRouter;
use crate::types::{Domain, RawChainEvent, WatchContext};
use crate::watcher::FailurePolicy;

/// Per-domain counters for one dispatch pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub domain: Domain,
    /// Events forwarded to a handler that succeeded.
    pub handled: usize,
    /// Events whose tag matched no handler.
    pub unrouted: usize,
    /// Events whose handler failed and were recorded as dead letters.
    pub dead_lettered: usize,
}

impl DispatchReport {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            handled: 0,
            unrouted: 0,
            dead_lettered: 0,
        }
    }
}

/// Drives a `DomainRouter` over a list of events.
pub struct Dispatcher {
    policy: FailurePolicy,
    dead_letters: Option<Arc<dyn FailedEventStore>>,
}

impl Dispatcher {
    /// `FailurePolicy::DeadLetter` needs somewhere to put the failures.
    pub fn new(
        policy: FailurePolicy,
        dead_letters: Option<Arc<dyn FailedEventStore>>,
    ) -> Result<Self, WatcherError> {
        if policy == FailurePolicy::DeadLetter && dead_letters.is_none() {
            return Err(WatcherError::Config(
                "dead_letter failure policy requires a failed-event store".into(),
            ));
        }
        Ok(Self {
            policy,
            dead_letters,
        })
    }

    /// A dispatcher that fails on the first handler error.
    pub fn propagating() -> Self {
        Self {
            policy: FailurePolicy::Propagate,
            dead_letters: None,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Route every event in order, awaiting each handler.
    pub async fn dispatch(
        &self,
        router: &dyn DomainRouter,
        events: &[RawChainEvent],
        ctx: &WatchContext,
    ) -> Result<DispatchReport, WatcherError> {
        let domain = router.domain();
        let mut report = DispatchReport::new(domain);

        for event in events {
            match router.route(event, ctx).await {
                Ok(true) => report.handled += 1,
                Ok(false) => {
                    report.unrouted += 1;
                    tracing::debug!(
                        %domain,
                        tag = %event.event,
                        contract = %event.source,
                        block = event.block_number,
                        "no handler for event tag"
                    );
                }
                Err(e) => {
                    let store = match (&self.policy, &self.dead_letters) {
                        (FailurePolicy::DeadLetter, Some(store)) => store,
                        _ => {
                            tracing::error!(
                                %domain,
                                tag = %event.event,
                                block = event.block_number,
                                tx = %event.transaction_hash,
                                error = %e,
                                "handler failed"
                            );
                            return Err(e);
                        }
                    };
                    tracing::warn!(
                        %domain,
                        tag = %event.event,
                        block = event.block_number,
                        tx = %event.transaction_hash,
                        error = %e,
                        "handler failed, recording dead letter"
                    );
                    store.record(FailedEvent::from_event(event, &e)).await?;
                    report.dead_lettered += 1;
                }
            }
        }

        Ok(report)
    }
}
