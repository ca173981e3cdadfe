// src/models/mod.rs

//! Domain models for the forwarder.
//!
//! Configuration, source descriptors, normalized items, and the
//! outbound webhook payload.

mod config;
mod item;
mod message;
mod source;

// Re-export all public types
pub use config::{Config, DeliveryConfig, HttpConfig, StorageConfig, ThreadConfig};
pub use item::{Item, content_digest};
pub use message::{Embed, EmbedAuthor, EmbedFooter, EmbedImage, WebhookMessage, truncate};
pub use source::{Source, StrategyKind};
