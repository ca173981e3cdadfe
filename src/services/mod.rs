//! Service layer for the forwarder.
//!
//! This module contains:
//! - Feed extraction (`FeedStrategy`)
//! - Forum thread extraction (`ThreadStrategy`)
//! - Strategy dispatch (`Strategies`)
//! - Webhook delivery (`WebhookClient`)

mod feed;
mod strategy;
mod thread;
mod webhook;

pub use feed::{FeedStrategy, parse_feed};
pub use strategy::{FetchStrategy, Strategies};
pub use thread::ThreadStrategy;
pub use webhook::{Deliver, WebhookClient};
