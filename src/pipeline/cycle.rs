//! One poll cycle of one source.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Item, Source};
use crate::services::{Deliver, FetchStrategy};
use crate::storage::SeenStore;
use crate::utils::Shutdown;

/// Attempts made to commit a delivered item before the cycle is aborted.
const COMMIT_ATTEMPTS: u32 = 3;
const COMMIT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Where a source currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Polling,
    Delivering,
}

/// What a finished cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items returned by the strategy
    pub fetched: usize,
    /// Items not yet in the seen-store
    pub new_items: usize,
    /// Items delivered and committed
    pub delivered: usize,
    /// Items whose delivery failed; retried next cycle
    pub failed: usize,
    /// First poll of the source; items were recorded without delivery
    pub bootstrapped: bool,
    /// Shutdown stopped the cycle before it finished
    pub interrupted: bool,
}

/// Runs the fetch, filter and deliver sequence for a single source.
///
/// A worker is owned by one task, so a source never runs two cycles at
/// once and its items are delivered strictly one after another.
///
/// With a shutdown listener attached, the fetch, each send and the pause
/// between sends stop as soon as shutdown fires. Seen-store writes are
/// never interrupted: a commit that has started always completes.
pub struct SourceWorker {
    source: Source,
    fetcher: Arc<dyn FetchStrategy>,
    store: Arc<dyn SeenStore>,
    deliver: Arc<dyn Deliver>,
    send_delay: Duration,
    shutdown: Option<Shutdown>,
    state: CycleState,
}

impl SourceWorker {
    pub fn new(
        source: Source,
        fetcher: Arc<dyn FetchStrategy>,
        store: Arc<dyn SeenStore>,
        deliver: Arc<dyn Deliver>,
    ) -> Self {
        Self {
            source,
            fetcher,
            store,
            deliver,
            send_delay: Duration::ZERO,
            shutdown: None,
            state: CycleState::Idle,
        }
    }

    /// Pause after each delivered item.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Stop in-flight network work when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Run one full cycle.
    ///
    /// Fails only when the fetch fails or a delivered item cannot be
    /// committed. Delivery failures are counted in the report; those items
    /// stay unseen and come back on the next cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let result = self.cycle().await;
        self.state = CycleState::Idle;
        result
    }

    async fn cycle(&mut self) -> Result<CycleReport> {
        self.state = CycleState::Polling;
        let key = self.source.key().to_string();
        let mut shutdown = self.shutdown.clone();

        let Some(items) = interruptible(&mut shutdown, self.fetcher.fetch(&self.source)).await
        else {
            return Ok(CycleReport {
                interrupted: true,
                ..CycleReport::default()
            });
        };
        let items = items?;
        let mut report = CycleReport {
            fetched: items.len(),
            ..CycleReport::default()
        };

        if !self.store.is_known_source(&key).await {
            let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
            self.store.mark_all_seen(&key, &ids).await?;
            log::info!(
                "{}: first poll, recorded {} existing item(s) without delivering",
                self.source.name,
                ids.len()
            );
            report.bootstrapped = true;
            return Ok(report);
        }

        let fresh = self.unseen(items).await;
        report.new_items = fresh.len();
        if fresh.is_empty() {
            return Ok(report);
        }

        self.state = CycleState::Delivering;
        for item in fresh {
            if shutdown.as_ref().is_some_and(Shutdown::is_triggered) {
                report.interrupted = true;
                break;
            }

            let Some(sent) = interruptible(&mut shutdown, self.deliver.send(&self.source, &item)).await
            else {
                report.interrupted = true;
                break;
            };

            match sent {
                Ok(()) => {
                    self.commit(&key, &item).await?;
                    report.delivered += 1;
                    if !self.send_delay.is_zero()
                        && interruptible(&mut shutdown, tokio::time::sleep(self.send_delay))
                            .await
                            .is_none()
                    {
                        report.interrupted = true;
                        break;
                    }
                }
                Err(e) if e.is_permanent_rejection() => {
                    report.failed += 1;
                    log::error!(
                        "{}: destination rejected item {} ({}): {}",
                        self.source.name,
                        item.id,
                        item.link,
                        e
                    );
                }
                Err(e) if e.is_transient() => {
                    report.failed += 1;
                    log::warn!(
                        "{}: delivery of item {} failed, will retry next cycle: {}",
                        self.source.name,
                        item.id,
                        e
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    log::error!(
                        "{}: delivery of item {} failed: {}",
                        self.source.name,
                        item.id,
                        e
                    );
                }
            }
        }

        Ok(report)
    }

    /// Items not yet seen, in fetch order, without repeats.
    async fn unseen(&self, items: Vec<Item>) -> Vec<Item> {
        let key = self.source.key();
        let mut batch = HashSet::new();
        let mut fresh = Vec::new();
        for item in items {
            if !batch.insert(item.id.clone()) {
                continue;
            }
            if !self.store.is_seen(key, &item.id).await {
                fresh.push(item);
            }
        }
        fresh
    }

    async fn commit(&self, key: &str, item: &Item) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.mark_seen(key, &item.id).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < COMMIT_ATTEMPTS => {
                    log::warn!(
                        "{}: commit of item {} failed (attempt {}/{}): {}",
                        self.source.name,
                        item.id,
                        attempt,
                        COMMIT_ATTEMPTS,
                        e
                    );
                    tokio::time::sleep(COMMIT_RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(AppError::persistence(format!(
                        "{}: item {} delivered but not recorded, aborting cycle: {e}",
                        self.source.name, item.id
                    )));
                }
            }
        }
    }
}

/// Run `fut` to completion, or return `None` once shutdown fires.
async fn interruptible<T>(shutdown: &mut Option<Shutdown>, fut: impl Future<Output = T>) -> Option<T> {
    match shutdown {
        Some(shutdown) => tokio::select! {
            biased;
            _ = shutdown.wait() => None,
            value = fut => Some(value),
        },
        None => Some(fut.await),
    }
}
