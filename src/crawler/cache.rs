//! Time-bounded page cache
//!
//! Best-effort accelerator mapping URL -> fetched body, shared by every
//! worker loop. Entries expire a fixed time after their last access and a
//! background sweep removes them; once the entry ceiling is reached new
//! inserts are silently dropped. The cache never blocks a caller and is
//! never a correctness dependency.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
// tokio's Instant so that tests driving the paused runtime clock observe
// expiry the same way the sweeper does.
use tokio::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::CacheConfig;

struct CacheEntry {
    content: String,
    last_access: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.last_access) > ttl
    }
}

/// Shared page cache with access-time expiry.
pub struct PageCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
    sweep_interval: Duration,
}

impl PageCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: config.ttl(),
            max_entries: config.max_entries,
            sweep_interval: config.sweep_interval(),
        }
    }

    /// Fetch a cached body, refreshing its access time on a hit.
    /// Expired entries are treated as misses and left for the sweeper.
    pub fn get(&self, url: &str) -> Option<String> {
        let mut entry = self.entries.get_mut(url)?;
        if entry.is_expired(Instant::now(), self.ttl) {
            debug!(url, "cache entry expired");
            return None;
        }
        entry.last_access = Instant::now();
        Some(entry.content.clone())
    }

    /// Insert a body unless the cache is at its ceiling; a full cache makes
    /// this a silent no-op rather than an error.
    pub fn put(&self, url: impl Into<String>, content: impl Into<String>) {
        if self.entries.len() >= self.max_entries {
            debug!("page cache full, dropping insert");
            return;
        }
        self.entries.insert(
            url.into(),
            CacheEntry {
                content: content.into(),
                last_access: Instant::now(),
            },
        );
    }

    /// Number of live entries (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry whose last access is older than the TTL.
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    /// Spawn the background sweep loop. The task runs until the shutdown
    /// channel fires; cached content is simply discarded at that point.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.sweep_interval);
            // The first tick fires immediately; skip it so a fresh cache
            // isn't swept right after startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.sweep();
                    }
                    _ = shutdown.recv() => {
                        info!("page cache sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache(ttl_secs: u64, max_entries: usize) -> PageCache {
        PageCache::new(&CacheConfig {
            ttl_secs,
            sweep_interval_secs: 60,
            max_entries,
        })
    }

    #[test]
    fn test_put_get_round_trip() {
        let cache = test_cache(300, 10);
        cache.put("u", "c");
        assert_eq!(cache.get("u").as_deref(), Some("c"));
    }

    #[test]
    fn test_miss_on_unknown_url() {
        let cache = test_cache(300, 10);
        assert!(cache.get("http://x.test/nope").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss() {
        let cache = test_cache(1, 10);
        cache.put("u", "c");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("u").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_refreshes_access_time() {
        let cache = test_cache(2, 10);
        cache.put("u", "c");

        // Touch the entry just before it would expire, then confirm the
        // refreshed clock keeps it alive past the original deadline.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("u").is_some());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("u").is_some());
    }

    #[test]
    fn test_full_cache_drops_insert_silently() {
        let cache = test_cache(300, 2);
        cache.put("a", "1");
        cache.put("b", "2");
        cache.put("c", "3");

        assert_eq!(cache.len(), 2);
        assert!(cache.get("c").is_none());
        assert_eq!(cache.get("a").as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = test_cache(5, 10);
        cache.put("old", "1");

        tokio::time::advance(Duration::from_secs(4)).await;
        cache.put("fresh", "2");
        tokio::time::advance(Duration::from_secs(2)).await;

        let removed = cache.sweep();
        assert_eq!(removed, 1);
        assert!(cache.get("old").is_none());
        assert_eq!(cache.get("fresh").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let cache = Arc::new(test_cache(300, 10));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = cache.spawn_sweeper(shutdown_rx);
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
