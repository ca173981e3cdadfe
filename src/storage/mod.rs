//! Seen-store: which item identifiers have already been delivered.
//!
//! The store is keyed by (source name, item id). It only ever grows: an
//! identifier is added after its item was delivered (or while a brand-new
//! source is bootstrapped) and is never removed.
//!
//! ## Storage Layout
//!
//! ```text
//! {data_dir}/
//! └── seen.json      # {"version":1,"updated_at":..,"sources":{"name":[ids]}}
//! ```

pub mod local;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalSeenStore;

/// Contract for seen-store backends.
///
/// Implementations must tolerate concurrent calls from one task per
/// source; calls for different sources never touch the same key.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Replace in-memory state with the persisted state.
    async fn load(&self) -> Result<()>;

    /// Persist the in-memory state.
    async fn flush(&self) -> Result<()>;

    /// Whether the source has ever been recorded, even with zero items.
    async fn is_known_source(&self, source: &str) -> bool;

    /// Whether `item` was already delivered for `source`.
    async fn is_seen(&self, source: &str, item: &str) -> bool;

    /// Record one delivered item and persist.
    async fn mark_seen(&self, source: &str, item: &str) -> Result<()>;

    /// Record many items at once and persist; registers the source even
    /// when `items` is empty.
    async fn mark_all_seen(&self, source: &str, items: &[String]) -> Result<()>;

    /// Seen-count per known source.
    async fn summary(&self) -> BTreeMap<String, usize>;
}
