//! Per-source polling loops.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::error::{AppError, Result};
use crate::models::{Config, Source};
use crate::pipeline::cycle::{CycleReport, SourceWorker};
use crate::services::{Deliver, FetchStrategy};
use crate::storage::SeenStore;
use crate::utils::Shutdown;

/// Drives one independent polling task per source.
pub struct Scheduler {
    fetcher: Arc<dyn FetchStrategy>,
    store: Arc<dyn SeenStore>,
    deliver: Arc<dyn Deliver>,
    sources: Vec<Source>,
    interval: Duration,
    send_delay: Duration,
}

impl Scheduler {
    pub fn new(
        fetcher: Arc<dyn FetchStrategy>,
        store: Arc<dyn SeenStore>,
        deliver: Arc<dyn Deliver>,
        config: &Config,
    ) -> Self {
        Self {
            fetcher,
            store,
            deliver,
            sources: config.feeds.clone(),
            interval: config.interval(),
            send_delay: Duration::from_millis(config.delivery.send_delay_ms),
        }
    }

    fn worker(&self, source: Source) -> SourceWorker {
        SourceWorker::new(
            source,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.store),
            Arc::clone(&self.deliver),
        )
        .with_send_delay(self.send_delay)
    }

    /// Poll every source until `shutdown` fires.
    ///
    /// Each source gets its own task and its own interval timer. A cycle
    /// that overruns the interval delays the next tick instead of stacking
    /// another run. On shutdown, in-flight fetches and sends are dropped,
    /// while a commit that already started runs to completion before its
    /// task ends.
    pub async fn run(self, shutdown: Shutdown) {
        log::info!(
            "Polling {} source(s) every {}s",
            self.sources.len(),
            self.interval.as_secs()
        );

        let mut tasks = JoinSet::new();
        for source in &self.sources {
            let worker = self.worker(source.clone()).with_shutdown(shutdown.clone());
            tasks.spawn(poll_loop(worker, self.interval, shutdown.clone()));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::error!("Source task ended abnormally: {}", e);
            }
        }
        log::info!("All source tasks stopped");
    }

    /// Run a single cycle of every source concurrently.
    pub async fn run_once(&self) -> Vec<(String, Result<CycleReport>)> {
        let cycles = self.sources.iter().map(|source| {
            let mut worker = self.worker(source.clone());
            async move {
                let result = worker.run_cycle().await;
                log_cycle(worker.source(), &result);
                (worker.source().name.clone(), result)
            }
        });
        join_all(cycles).await
    }
}

async fn poll_loop(mut worker: SourceWorker, interval: Duration, mut shutdown: Shutdown) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {}
        }

        let result = worker.run_cycle().await;
        log_cycle(worker.source(), &result);
        if matches!(result, Ok(ref report) if report.interrupted) {
            break;
        }
    }
    log::debug!("{}: polling stopped", worker.source().name);
}

fn log_cycle(source: &Source, result: &Result<CycleReport>) {
    match result {
        Ok(report) if report.bootstrapped => {}
        Ok(report) if report.interrupted => log::debug!(
            "{}: cycle interrupted by shutdown after {} delivered",
            source.name,
            report.delivered
        ),
        Ok(report) if report.new_items > 0 => log::info!(
            "{}: delivered {}/{} new item(s), {} failed",
            source.name,
            report.delivered,
            report.new_items,
            report.failed
        ),
        Ok(report) => log::debug!("{}: no new items ({} fetched)", source.name, report.fetched),
        Err(e @ AppError::Fetch { .. }) => log::warn!("{}: {}", source.name, e),
        Err(e) => log::error!("{}: cycle aborted: {}", source.name, e),
    }
}
