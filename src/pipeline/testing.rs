//! In-memory collaborators for pipeline tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Item, Source};
use crate::services::{Deliver, FetchStrategy};
use crate::storage::SeenStore;

pub fn item(id: &str) -> Item {
    Item::new(id, format!("Item {id}")).with_link(format!("https://example.com/{id}"))
}

/// Returns canned items per source name; unknown or failed sources error.
#[derive(Default)]
pub struct FakeFetcher {
    items: Mutex<HashMap<String, Option<Vec<Item>>>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn set(&self, source: &str, items: Vec<Item>) {
        self.items.lock().unwrap().insert(source.to_string(), Some(items));
    }

    pub fn fail(&self, source: &str) {
        self.items.lock().unwrap().insert(source.to_string(), None);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchStrategy for FakeFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.items.lock().unwrap().get(&source.name) {
            Some(Some(items)) => Ok(items.clone()),
            _ => Err(AppError::fetch(&source.name, "HTTP 503 Service Unavailable")),
        }
    }
}

/// Records delivered item ids; rejects ids it was told to.
#[derive(Default)]
pub struct FakeDeliver {
    sent: Mutex<Vec<String>>,
    rejected: Mutex<HashSet<String>>,
}

impl FakeDeliver {
    pub fn reject(&self, id: &str) {
        self.rejected.lock().unwrap().insert(id.to_string());
    }

    pub fn accept_all(&self) {
        self.rejected.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deliver for FakeDeliver {
    async fn send(&self, _source: &Source, item: &Item) -> Result<()> {
        if self.rejected.lock().unwrap().contains(&item.id) {
            return Err(AppError::DeliveryRejected {
                status: 400,
                message: "Invalid Form Body".into(),
            });
        }
        self.sent.lock().unwrap().push(item.id.clone());
        Ok(())
    }
}

/// Delegates reads to an inner store and fails every single-item commit.
pub struct FailingCommitStore {
    inner: Arc<dyn SeenStore>,
    attempts: AtomicUsize,
}

impl FailingCommitStore {
    pub fn new(inner: Arc<dyn SeenStore>) -> Self {
        Self {
            inner,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn commit_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeenStore for FailingCommitStore {
    async fn load(&self) -> Result<()> {
        self.inner.load().await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    async fn is_known_source(&self, source: &str) -> bool {
        self.inner.is_known_source(source).await
    }

    async fn is_seen(&self, source: &str, item: &str) -> bool {
        self.inner.is_seen(source, item).await
    }

    async fn mark_seen(&self, _source: &str, _item: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::persistence("disk full"))
    }

    async fn mark_all_seen(&self, source: &str, items: &[String]) -> Result<()> {
        self.inner.mark_all_seen(source, items).await
    }

    async fn summary(&self) -> BTreeMap<String, usize> {
        self.inner.summary().await
    }
}

/// Delegates to an inner store, pausing before every single-item commit.
pub struct SlowCommitStore {
    inner: Arc<dyn SeenStore>,
    delay: Duration,
}

impl SlowCommitStore {
    pub fn new(inner: Arc<dyn SeenStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl SeenStore for SlowCommitStore {
    async fn load(&self) -> Result<()> {
        self.inner.load().await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    async fn is_known_source(&self, source: &str) -> bool {
        self.inner.is_known_source(source).await
    }

    async fn is_seen(&self, source: &str, item: &str) -> bool {
        self.inner.is_seen(source, item).await
    }

    async fn mark_seen(&self, source: &str, item: &str) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.mark_seen(source, item).await
    }

    async fn mark_all_seen(&self, source: &str, items: &[String]) -> Result<()> {
        self.inner.mark_all_seen(source, items).await
    }

    async fn summary(&self) -> BTreeMap<String, usize> {
        self.inner.summary().await
    }
}
