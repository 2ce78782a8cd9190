//! In-memory bin store

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Longest lifetime a bin can be given; longer TTLs are clamped to it
pub const MAX_BIN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Expiring bins and their request histories
///
/// Expired bins behave exactly like bins that never existed. They are
/// dropped lazily on access and in bulk by [`purge_expired`](Self::purge_expired).
pub struct BinStore {
    bins: RwLock<HashMap<String, Bin>>,
}

struct Bin {
    expires_at: SystemTime,
    /// Serialized records, oldest first
    records: Vec<String>,
}

impl Bin {
    fn is_live(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }
}

impl BinStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            bins: RwLock::new(HashMap::new()),
        }
    }

    /// Create a bin that expires after `ttl`, unless a live bin has the same id
    ///
    /// An expired bin with the same id is replaced. `ttl` is clamped to
    /// [`MAX_BIN_TTL`]. Returns the expiry time, or `None` if the id is taken.
    pub async fn create_new(&self, id: &str, ttl: Duration) -> Option<SystemTime> {
        let now = SystemTime::now();
        let mut bins = self.bins.write().await;
        if bins.get(id).is_some_and(|bin| bin.is_live(now)) {
            return None;
        }

        let expires_at = expiry(now, ttl);
        bins.insert(
            id.to_string(),
            Bin {
                expires_at,
                records: Vec::new(),
            },
        );
        Some(expires_at)
    }

    /// Whether a live bin exists
    pub async fn exists(&self, id: &str) -> bool {
        let now = SystemTime::now();
        {
            let bins = self.bins.read().await;
            match bins.get(id) {
                Some(bin) if bin.is_live(now) => return true,
                Some(_) => {}
                None => return false,
            }
        }

        self.remove_if_expired(id, now).await;
        false
    }

    /// Append a serialized record, returning the bin's new record count
    pub async fn append(&self, id: &str, record: String) -> Result<usize> {
        let now = SystemTime::now();
        let mut bins = self.bins.write().await;

        match bins.get_mut(id) {
            Some(bin) if bin.is_live(now) => {
                bin.records.push(record);
                Ok(bin.records.len())
            }
            Some(_) => {
                bins.remove(id);
                Err(Error::BinNotFound(id.to_string()))
            }
            None => Err(Error::BinNotFound(id.to_string())),
        }
    }

    /// Serialized records, newest first
    pub async fn history(&self, id: &str) -> Result<Vec<String>> {
        let now = SystemTime::now();
        {
            let bins = self.bins.read().await;
            if let Some(bin) = bins.get(id).filter(|bin| bin.is_live(now)) {
                return Ok(bin.records.iter().rev().cloned().collect());
            }
        }

        self.remove_if_expired(id, now).await;
        Err(Error::BinNotFound(id.to_string()))
    }

    /// Number of records in a live bin
    pub async fn count(&self, id: &str) -> Option<usize> {
        let now = SystemTime::now();
        let bins = self.bins.read().await;
        bins.get(id)
            .filter(|bin| bin.is_live(now))
            .map(|bin| bin.records.len())
    }

    /// Expiry time of a live bin
    pub async fn expires_at(&self, id: &str) -> Option<SystemTime> {
        let now = SystemTime::now();
        let bins = self.bins.read().await;
        bins.get(id)
            .filter(|bin| bin.is_live(now))
            .map(|bin| bin.expires_at)
    }

    /// Drop every expired bin, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut bins = self.bins.write().await;
        let before = bins.len();

        bins.retain(|id, bin| {
            let live = bin.is_live(now);
            if !live {
                tracing::debug!(bin = %id, "Bin expired");
            }
            live
        });

        before - bins.len()
    }

    /// Spawn background purge task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_purge_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = store.purge_expired().await;
                if removed > 0 {
                    tracing::info!(removed = removed, "Expired bins purged");
                }
            }
        })
    }

    async fn remove_if_expired(&self, id: &str, now: SystemTime) {
        let mut bins = self.bins.write().await;
        if bins.get(id).is_some_and(|bin| !bin.is_live(now)) {
            bins.remove(id);
            tracing::debug!(bin = %id, "Bin expired");
        }
    }
}

fn expiry(now: SystemTime, ttl: Duration) -> SystemTime {
    now.checked_add(ttl.min(MAX_BIN_TTL)).unwrap_or(now)
}

impl Default for BinStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_create_exists() {
        let store = BinStore::new();

        assert!(!store.exists("abc").await);
        let expires = store.create_new("abc", HOUR).await.unwrap();

        assert!(store.exists("abc").await);
        assert!(expires > SystemTime::now());
        assert_eq!(store.expires_at("abc").await, Some(expires));
        assert_eq!(store.count("abc").await, Some(0));
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = BinStore::new();
        store.create_new("abc", HOUR).await.unwrap();

        assert_eq!(store.append("abc", "first".into()).await.unwrap(), 1);
        assert_eq!(store.append("abc", "second".into()).await.unwrap(), 2);
        assert_eq!(store.append("abc", "third".into()).await.unwrap(), 3);

        let history = store.history("abc").await.unwrap();
        assert_eq!(history, vec!["third", "second", "first"]);
        assert_eq!(store.count("abc").await, Some(3));
    }

    #[tokio::test]
    async fn test_unknown_bin() {
        let store = BinStore::new();

        assert!(matches!(
            store.append("nope", "x".into()).await,
            Err(Error::BinNotFound(_))
        ));
        assert!(matches!(store.history("nope").await, Err(Error::BinNotFound(_))));
        assert_eq!(store.count("nope").await, None);
    }

    #[tokio::test]
    async fn test_expired_bin_is_absent() {
        let store = BinStore::new();
        store.create_new("short", Duration::from_millis(20)).await.unwrap();
        store.append("short", "x".into()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.count("short").await, None);
        assert!(matches!(store.history("short").await, Err(Error::BinNotFound(_))));
        assert!(!store.exists("short").await);
        assert_eq!(store.purge_expired().await, 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = BinStore::new();
        store.create_new("short", Duration::from_millis(10)).await.unwrap();
        store.create_new("long", HOUR).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.purge_expired().await, 0);
        assert!(store.exists("long").await);
    }

    #[tokio::test]
    async fn test_create_new_refuses_live_id() {
        let store = BinStore::new();

        assert!(store.create_new("abc", HOUR).await.is_some());
        assert!(store.create_new("abc", HOUR).await.is_none());

        store.create_new("old", Duration::from_millis(10)).await.unwrap();
        store.append("old", "x".into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.create_new("old", HOUR).await.is_some());
        assert_eq!(store.count("old").await, Some(0));
    }

    #[tokio::test]
    async fn test_huge_ttl_is_clamped() {
        let store = BinStore::new();
        let before = SystemTime::now();

        let expires = store.create_new("forever", Duration::MAX).await.unwrap();

        assert!(store.exists("forever").await);
        assert!(expires > before);
        assert!(expires <= before + MAX_BIN_TTL + Duration::from_secs(60));
    }
}
