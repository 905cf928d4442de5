//! Single-slot persistence for the last known good directory.
//!
//! The whole directory lives under one fixed key as a JSON blob. Reads that
//! find nothing usable report "no cached directory"; writes are best-effort
//! and only ever log on failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::record::Record;

pub const CACHE_KEY: &str = "channel_directory";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDirectory {
    pub saved_at: DateTime<Utc>,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", CACHE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<Vec<Record>> {
        self.load_entry().map(|entry| entry.records)
    }

    pub fn load_entry(&self) -> Option<CachedDirectory> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!("No cached directory at {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<CachedDirectory>(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Ignoring unreadable cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub async fn save(&self, records: &[Record]) {
        if let Err(e) = self.try_save(records).await {
            warn!("Failed to write cache {}: {}", self.path.display(), e);
        }
    }

    async fn try_save(&self, records: &[Record]) -> anyhow::Result<()> {
        let entry = CachedDirectory {
            saved_at: Utc::now(),
            records: records.to_vec(),
        };
        let json = serde_json::to_string(&entry)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        debug!("Cached {} records at {}", records.len(), self.path.display());
        Ok(())
    }

    pub async fn clear(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed cache {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove cache {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<Record> {
        vec![
            Record::new("CNN", "http://a/cnn.m3u8"),
            Record::new("BBC", "http://b/bbc.m3u8"),
        ]
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips_ids() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.load().is_none());

        let records = sample();
        store.save(&records).await;
        assert_eq!(store.load(), Some(records));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());

        store.save(&sample()).await;
        store.save(&[]).await;
        assert_eq!(store.load(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_clear_removes_slot() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());

        store.save(&sample()).await;
        store.clear().await;
        assert!(store.load().is_none());
        assert!(!store.path().exists());

        // Clearing an empty slot is a no-op.
        store.clear().await;
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_save_creates_missing_dirs() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("nested").join("cache"));
        store.save(&sample()).await;
        assert_eq!(store.load().map(|r| r.len()), Some(2));
    }

    #[test]
    fn test_corrupt_blob_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_none());

        std::fs::write(store.path(), r#"{"saved_at":"2024-01-01T00:00:00Z","records":[{"id":"zz","name":"x","url":"y"}]}"#).unwrap();
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_unwritable_path_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a dir").unwrap();

        let store = CacheStore::new(&blocker);
        store.save(&sample()).await;
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_entry_carries_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let before = Utc::now();
        store.save(&sample()).await;
        let entry = store.load_entry().unwrap();
        assert!(entry.saved_at >= before);
        assert_eq!(entry.records.len(), 2);
    }
}
