//! The poll cycle.
//!
//! One cycle:
//! 1. Read the cursor (next block to fetch) and the chain head.
//! 2. If there is no new range, stop. Nothing is fetched and the cursor is
//!    left alone.
//! 3. Fetch all six contracts concurrently. Any failure aborts the cycle with
//!    the cursor unchanged, so the same range is retried next time.
//! 4. Merge v1 + v2 results into marketplace / nft / auction lists.
//! 5. Dispatch the three domains concurrently, each one sequentially.
//! 6. Only after all three dispatches succeed, write `to + 1` as the cursor.
//!
//! Cycles on one `Watcher` never overlap: a call made while another cycle is
//! running returns `CycleOutcome::Skipped` without touching the chain.

use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use soundindex_core::{
    aggregate, AuctionRouter, CursorTracker, DispatchReport, Dispatcher, EventRange,
    MarketplaceRouter, NftRouter, SystemActor, WatchContext, WatcherConfig, WatcherError,
    WatcherState,
};

use crate::fetcher::{fetch_all, ContractFetcher};
use crate::rpc::ChainClient;

/// Counters for a cycle that advanced the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Events fetched across all six contracts.
    pub fetched: usize,
    /// One report per domain, marketplace, nft, auction.
    pub dispatch: Vec<DispatchReport>,
}

impl CycleReport {
    pub fn handled(&self) -> usize {
        self.dispatch.iter().map(|d| d.handled).sum()
    }

    pub fn unrouted(&self) -> usize {
        self.dispatch.iter().map(|d| d.unrouted).sum()
    }

    pub fn dead_lettered(&self) -> usize {
        self.dispatch.iter().map(|d| d.dead_lettered).sum()
    }
}

/// What a call to `poll_once` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Another cycle was already running on this watcher.
    Skipped,
    /// `cursor >= head`; nothing fetched, cursor unchanged.
    UpToDate { cursor: u64, head: u64 },
    /// The range was fully applied and the cursor moved to `next_block`.
    Advanced {
        range: EventRange,
        next_block: u64,
        report: CycleReport,
    },
}

/// Polls the six SoundChain contracts and feeds their events to the domain
/// handlers. Build one with [`crate::WatcherBuilder`].
pub struct Watcher {
    pub(crate) config: WatcherConfig,
    pub(crate) client: Arc<dyn ChainClient>,
    pub(crate) cursor: CursorTracker,
    pub(crate) fetchers: Vec<ContractFetcher>,
    pub(crate) marketplace: MarketplaceRouter,
    pub(crate) nft: NftRouter,
    pub(crate) auction: AuctionRouter,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) actor: SystemActor,
    pub(crate) in_flight: tokio::sync::Mutex<()>,
    pub(crate) state: Mutex<WatcherState>,
}

impl Watcher {
    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn cursor(&self) -> &CursorTracker {
        &self.cursor
    }

    pub fn fetchers(&self) -> &[ContractFetcher] {
        &self.fetchers
    }

    pub fn actor(&self) -> &SystemActor {
        &self.actor
    }

    pub fn state(&self) -> WatcherState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: WatcherState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Run a single cycle.
    pub async fn poll_once(&self) -> Result<CycleOutcome, WatcherError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!(watcher = %self.config.id, "cycle already running, skipping");
            return Ok(CycleOutcome::Skipped);
        };
        let result = self.cycle().await;
        self.set_state(WatcherState::Idle);
        result
    }

    async fn cycle(&self) -> Result<CycleOutcome, WatcherError> {
        self.set_state(WatcherState::Fetching);

        let from = self.cursor.current_block_number().await?;
        let head = self.client.latest_block_number().await.map_err(|e| {
            tracing::error!(watcher = %self.config.id, cursor = from, error = %e, "failed to read chain head");
            e
        })?;

        let target = head.saturating_sub(self.config.confirmations);
        let to = match self.config.max_block_range {
            Some(cap) => target.min(from.saturating_add(cap)),
            None => target,
        };
        let Some(range) = EventRange::new(from, to) else {
            tracing::debug!(watcher = %self.config.id, cursor = from, head, "up to date");
            return Ok(CycleOutcome::UpToDate { cursor: from, head });
        };

        let results = fetch_all(&self.fetchers, self.client.as_ref(), range)
            .await
            .map_err(|e| {
                tracing::error!(
                    watcher = %self.config.id,
                    from = range.from,
                    to = range.to,
                    error = %e,
                    "fetch failed, cursor not advanced"
                );
                e
            })?;

        let events = aggregate(results, self.config.ordering);
        let fetched = events.total();

        self.set_state(WatcherState::Dispatching);
        let ctx = WatchContext {
            actor: self.actor.clone(),
            range,
            chain: self.config.chain.clone(),
        };
        // Every domain finishes before the first error is reported.
        let (marketplace, nft, auction) = futures::join!(
            self.dispatcher.dispatch(&self.marketplace, &events.marketplace, &ctx),
            self.dispatcher.dispatch(&self.nft, &events.nft, &ctx),
            self.dispatcher.dispatch(&self.auction, &events.auction, &ctx),
        );
        let dispatch = match (marketplace, nft, auction) {
            (Ok(m), Ok(n), Ok(a)) => vec![m, n, a],
            (m, n, a) => {
                let err = [m.err(), n.err(), a.err()].into_iter().flatten().next();
                let err = err.unwrap_or_else(|| WatcherError::Other("dispatch failed".into()));
                tracing::error!(
                    watcher = %self.config.id,
                    from = range.from,
                    to = range.to,
                    error = %err,
                    "dispatch failed, cursor not advanced"
                );
                return Err(err);
            }
        };

        self.set_state(WatcherState::Committing);
        let next_block = range.next_block();
        self.cursor.update_current_block_number(next_block).await?;

        let report = CycleReport { fetched, dispatch };
        tracing::info!(
            watcher = %self.config.id,
            from = range.from,
            to = range.to,
            fetched,
            handled = report.handled(),
            unrouted = report.unrouted(),
            dead_lettered = report.dead_lettered(),
            "cycle complete"
        );
        Ok(CycleOutcome::Advanced {
            range,
            next_block,
            report,
        })
    }

    /// Poll every `poll_interval_ms` until `shutdown` resolves. Cycle errors
    /// are logged and the next tick retries from the unchanged cursor.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), WatcherError>
    where
        F: Future<Output = ()>,
    {
        let period = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            watcher = %self.config.id,
            chain = %self.config.chain,
            interval_ms = self.config.poll_interval_ms,
            "watcher started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::warn!(watcher = %self.config.id, error = %e, "cycle failed");
                    }
                }
            }
        }

        self.set_state(WatcherState::Stopped);
        tracing::info!(watcher = %self.config.id, "watcher stopped");
        Ok(())
    }
}
