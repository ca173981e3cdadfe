//! Local filesystem seen-store.
//!
//! Keeps the whole seen-set in memory and rewrites `seen.json` after every
//! commit. Writes go to a temporary file that is renamed over the old one,
//! so an interrupted write never corrupts the committed state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::error::{AppError, Result};
use crate::storage::SeenStore;

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

type SeenMap = BTreeMap<String, BTreeSet<String>>;

/// On-disk representation.
#[derive(Debug, Serialize, Deserialize)]
struct SeenFile {
    version: u32,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    sources: SeenMap,
}

/// JSON-file backed seen-store.
pub struct LocalSeenStore {
    path: PathBuf,
    state: RwLock<SeenMap>,
    /// Serializes file writes so an older snapshot never lands last.
    io: Mutex<()>,
}

impl LocalSeenStore {
    /// Create an empty store persisted at `path`. Call [`SeenStore::load`]
    /// to read existing state.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(SeenMap::new()),
            io: Mutex::new(()),
        }
    }

    /// Create a store and load its persisted state.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.load().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the full seen-set.
    pub async fn snapshot(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.state.read().await.clone()
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SeenStore for LocalSeenStore {
    async fn load(&self) -> Result<()> {
        let bytes = self.read_bytes().await.map_err(|e| {
            AppError::persistence(format!("cannot read {}: {e}", self.path.display()))
        })?;

        let sources = match bytes {
            Some(bytes) => {
                let file: SeenFile = serde_json::from_slice(&bytes).map_err(|e| {
                    AppError::persistence(format!("cannot parse {}: {e}", self.path.display()))
                })?;
                if file.version != FORMAT_VERSION {
                    return Err(AppError::persistence(format!(
                        "{} has unsupported version {}",
                        self.path.display(),
                        file.version
                    )));
                }
                log::info!(
                    "Loaded seen-store from {} ({} sources)",
                    self.path.display(),
                    file.sources.len()
                );
                file.sources
            }
            None => {
                log::info!(
                    "No seen-store at {}, starting empty",
                    self.path.display()
                );
                SeenMap::new()
            }
        };

        *self.state.write().await = sources;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let _guard = self.io.lock().await;

        let bytes = {
            let state = self.state.read().await;
            let file = SeenFile {
                version: FORMAT_VERSION,
                updated_at: Utc::now(),
                sources: state.clone(),
            };
            serde_json::to_vec_pretty(&file)?
        };

        self.write_bytes(&bytes).await.map_err(|e| {
            AppError::persistence(format!("cannot write {}: {e}", self.path.display()))
        })?;
        log::debug!("Seen-store flushed to {}", self.path.display());
        Ok(())
    }

    async fn is_known_source(&self, source: &str) -> bool {
        self.state.read().await.contains_key(source)
    }

    async fn is_seen(&self, source: &str, item: &str) -> bool {
        self.state
            .read()
            .await
            .get(source)
            .is_some_and(|ids| ids.contains(item))
    }

    async fn mark_seen(&self, source: &str, item: &str) -> Result<()> {
        let inserted = self
            .state
            .write()
            .await
            .entry(source.to_string())
            .or_default()
            .insert(item.to_string());

        if !inserted {
            return Ok(());
        }

        // Roll back so a retried commit writes again.
        if let Err(e) = self.flush().await {
            if let Some(ids) = self.state.write().await.get_mut(source) {
                ids.remove(item);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn mark_all_seen(&self, source: &str, items: &[String]) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let ids = state.entry(source.to_string()).or_default();
            ids.extend(items.iter().cloned());
        }
        self.flush().await
    }

    async fn summary(&self) -> BTreeMap<String, usize> {
        self.state
            .read()
            .await
            .iter()
            .map(|(name, ids)| (name.clone(), ids.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> LocalSeenStore {
        LocalSeenStore::new(tmp.path().join("data").join("seen.json"))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.load().await.unwrap();

        assert!(!store.is_known_source("a").await);
        assert!(!store.is_seen("a", "1").await);
        assert!(store.summary().await.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.mark_seen("blog", "a").await.unwrap();
        store.mark_seen("blog", "b").await.unwrap();
        store.mark_all_seen("forum", &["100".into(), "101".into()]).await.unwrap();
        store.mark_all_seen("empty", &[]).await.unwrap();
        let before = store.snapshot().await;

        let reopened = LocalSeenStore::open(store.path().to_path_buf()).await.unwrap();
        assert_eq!(reopened.snapshot().await, before);
        assert!(reopened.is_seen("blog", "a").await);
        assert!(reopened.is_seen("forum", "101").await);
        assert!(reopened.is_known_source("empty").await);
        assert!(!reopened.is_seen("forum", "a").await);
    }

    #[tokio::test]
    async fn test_sources_are_disjoint() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.mark_seen("one", "x").await.unwrap();

        assert!(store.is_seen("one", "x").await);
        assert!(!store.is_seen("two", "x").await);
        assert!(!store.is_known_source("two").await);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_persistence_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seen.json");
        std::fs::write(&path, b"{not json").unwrap();

        let result = LocalSeenStore::open(path).await;
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_unsupported_version_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seen.json");
        std::fs::write(
            &path,
            br#"{"version":99,"updated_at":"2025-01-01T00:00:00Z","sources":{}}"#,
        )
        .unwrap();

        assert!(LocalSeenStore::open(path).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_commits_all_persist() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(store_in(&tmp));

        let mut handles = Vec::new();
        for source in ["a", "b", "c", "d"] {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    store.mark_seen(source, &i.to_string()).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reopened = LocalSeenStore::open(store.path().to_path_buf()).await.unwrap();
        let summary = reopened.summary().await;
        assert_eq!(summary.len(), 4);
        assert!(summary.values().all(|&n| n == 10));
    }

    #[tokio::test]
    async fn test_file_is_deterministic_json() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.mark_seen("s", "b").await.unwrap();
        store.mark_seen("s", "a").await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["sources"]["s"], serde_json::json!(["a", "b"]));
    }
}
