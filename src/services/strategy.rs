//! Strategy contract and the closed set of strategy variants.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Item, Source, StrategyKind, ThreadConfig};
use crate::services::{FeedStrategy, ThreadStrategy};

/// Turns a source into its current list of normalized items.
///
/// Implementations only read from the origin. Items come back in the
/// order they should be delivered, oldest first. A malformed individual
/// entry is repaired with defaults or skipped; the whole fetch fails only
/// when the origin is unreachable, answers with a non-success status, or
/// the document is unusable.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<Vec<Item>>;
}

/// Dispatches a source to the strategy named by its configuration.
pub struct Strategies {
    feed: FeedStrategy,
    thread: ThreadStrategy,
}

impl Strategies {
    pub fn new(client: reqwest::Client, thread: &ThreadConfig) -> Result<Self> {
        Ok(Self {
            feed: FeedStrategy::new(client.clone()),
            thread: ThreadStrategy::new(client, thread)?,
        })
    }
}

#[async_trait]
impl FetchStrategy for Strategies {
    async fn fetch(&self, source: &Source) -> Result<Vec<Item>> {
        log::debug!("Fetching {} with {} strategy", source.name, source.strategy.as_str());
        match source.strategy {
            StrategyKind::Feed => self.feed.fetch(source).await,
            StrategyKind::Thread => self.thread.fetch(source).await,
        }
    }
}
