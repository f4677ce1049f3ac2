//! Crawl scheduler and worker loop
//!
//! Owns the map of active crawls and drives one dedicated worker loop per
//! search on the shared worker pool. The loop pops a URL from the search's
//! frontier, resolves content through the page cache with the fetcher as
//! fallback, reports keyword matches to the search store, feeds discovered
//! links back into the frontier, and repeats until the frontier drains.
//! Transient fetch failures are retried a fixed number of times with a
//! fixed delay; terminal failures skip the URL immediately. No failure on
//! one URL ever affects another URL or another search.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::CrawlerConfig;
use crate::store::{SearchStore, StoreError};

use super::cache::PageCache;
use super::extractor::extract_links;
use super::fetcher::Fetcher;
use super::frontier::{Frontier, FrontierSnapshot};
use super::matcher::KeywordMatcher;
use super::pool::WorkerPool;

/// Errors surfaced when starting a crawl.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("scheduler is shutting down, not accepting new crawls")]
    ShuttingDown,
    #[error("a crawl for search {0} is already running")]
    AlreadyRunning(String),
}

/// One active crawl: the search identity plus its frontier.
pub struct CrawlJob {
    pub search_id: String,
    pub keyword: String,
    frontier: Frontier,
}

impl CrawlJob {
    pub fn frontier_snapshot(&self) -> FrontierSnapshot {
        self.frontier.snapshot()
    }
}

/// How processing one URL ended, as seen by the worker loop.
enum UrlOutcome {
    /// The URL was finalized (success, terminal failure, or retries
    /// exhausted); keep draining the frontier.
    Processed,
    /// The loop must stop: the search vanished mid-crawl or shutdown was
    /// requested.
    Abort,
}

/// Lock-free counters describing scheduler activity.
#[derive(Default)]
struct CrawlCounters {
    pages_processed: AtomicU64,
    pages_fetched: AtomicU64,
    cache_hits: AtomicU64,
    fetch_failures: AtomicU64,
    retries_exhausted: AtomicU64,
    matches_found: AtomicU64,
}

/// Point-in-time scheduler statistics.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub active_searches: usize,
    pub queued_urls: usize,
    pub busy_workers: usize,
    pub pool_size: usize,
    pub pages_processed: u64,
    pub pages_fetched: u64,
    pub cache_hits: u64,
    pub fetch_failures: u64,
    pub retries_exhausted: u64,
    pub matches_found: u64,
}

/// Crawl scheduler. Everything it depends on is injected at construction;
/// there is no ambient global state.
pub struct CrawlScheduler {
    config: CrawlerConfig,
    store: Arc<dyn SearchStore>,
    cache: Arc<PageCache>,
    fetcher: Fetcher,
    matcher: Arc<dyn KeywordMatcher>,
    pool: Arc<WorkerPool>,
    /// searchId -> active crawl; inserted by `start_crawl`, removed by
    /// finalization, possibly from different worker loops concurrently.
    active: DashMap<String, Arc<CrawlJob>>,
    /// Worker join handles, drained on shutdown.
    tasks: DashMap<String, JoinHandle<()>>,
    /// Scheduling-wide lock ordering insertions and removals in `active`.
    scheduling: parking_lot::Mutex<()>,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    counters: CrawlCounters,
}

impl CrawlScheduler {
    pub fn new(
        config: CrawlerConfig,
        store: Arc<dyn SearchStore>,
        cache: Arc<PageCache>,
        fetcher: Fetcher,
        matcher: Arc<dyn KeywordMatcher>,
        pool: Arc<WorkerPool>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            cache,
            fetcher,
            matcher,
            pool,
            active: DashMap::new(),
            tasks: DashMap::new(),
            scheduling: parking_lot::Mutex::new(()),
            running: AtomicBool::new(true),
            shutdown_tx,
            counters: CrawlCounters::default(),
        })
    }

    /// The shared worker pool, exposed for the pool monitor.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Start crawling for an existing search. Creates the frontier seeded
    /// with the configured origin, registers it, spawns the dedicated
    /// worker loop, and returns immediately.
    pub fn start_crawl(self: &Arc<Self>, search_id: &str) -> Result<String, SchedulerError> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(SchedulerError::ShuttingDown);
        }

        let search = self.store.find_by_id(search_id)?;
        info!(search_id, keyword = %search.keyword, "starting crawl");

        let job = Arc::new(CrawlJob {
            search_id: search_id.to_string(),
            keyword: search.keyword,
            frontier: Frontier::new(self.config.origin()),
        });

        {
            let _guard = self.scheduling.lock();
            if self.active.contains_key(search_id) {
                return Err(SchedulerError::AlreadyRunning(search_id.to_string()));
            }
            self.active.insert(search_id.to_string(), Arc::clone(&job));
        }

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            scheduler.run_worker(job).await;
        });
        self.tasks.insert(search_id.to_string(), handle);

        Ok(search_id.to_string())
    }

    /// Dedicated worker loop for one search. Holds a pool permit only while
    /// processing a single URL and yields between URLs so that more
    /// searches than pool slots still all make progress.
    async fn run_worker(self: Arc<Self>, job: Arc<CrawlJob>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if !self.running.load(Ordering::Relaxed) {
                debug!(search_id = %job.search_id, "stop requested, ending worker loop");
                break;
            }

            // Pool closed means shutdown.
            let Some(slot) = self.pool.acquire().await else {
                break;
            };

            // Single worker per frontier: an empty queue with nothing
            // checked out by this loop means the crawl is done.
            let Some(url) = job.frontier.pop_next() else {
                drop(slot);
                break;
            };

            let outcome = self.process_url(&job, &url, &mut shutdown_rx).await;
            drop(slot);

            match outcome {
                UrlOutcome::Processed => {}
                UrlOutcome::Abort => break,
            }

            // Give other frontiers a turn on the shared pool.
            tokio::task::yield_now().await;
        }

        info!(search_id = %job.search_id, "worker loop finished");
        self.finalize(&job.search_id);
    }

    /// Process one URL: resolve content (cache, then fetch), match the
    /// keyword, extract and enqueue links, and finalize the URL. Transient
    /// failures are retried with a fixed delay; the URL is marked processed
    /// exactly once on every path that does not abort the whole loop.
    async fn process_url(
        &self,
        job: &CrawlJob,
        url: &str,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> UrlOutcome {
        let max_retries = self.config.max_retries;

        for attempt in 1..=max_retries {
            let content = match self.cache.get(url) {
                Some(cached) => {
                    self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                    cached
                }
                None => match self.fetcher.fetch(url).await {
                    Ok(body) => {
                        self.counters.pages_fetched.fetch_add(1, Ordering::Relaxed);
                        self.cache.put(url, body.clone());
                        body
                    }
                    Err(e) if e.is_transient() => {
                        self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            search_id = %job.search_id,
                            url,
                            attempt,
                            max_retries,
                            "connection failure, retrying after delay: {e}"
                        );
                        if !self.retry_sleep(shutdown_rx).await {
                            return UrlOutcome::Abort;
                        }
                        continue;
                    }
                    Err(e) => {
                        // Non-success status: terminal for this URL.
                        self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(search_id = %job.search_id, url, "skipping url: {e}");
                        job.frontier.mark_processed();
                        self.counters.pages_processed.fetch_add(1, Ordering::Relaxed);
                        return UrlOutcome::Processed;
                    }
                },
            };

            if self.matcher.matches(&content, &job.keyword) {
                self.counters.matches_found.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = self.store.append_url(&job.search_id, url) {
                    // Search deleted mid-crawl: stop this loop, leave every
                    // other search alone.
                    error!(search_id = %job.search_id, url, "abandoning crawl: {e}");
                    return UrlOutcome::Abort;
                }
            }

            // Links must be enqueued before the URL is marked processed so
            // that completion can never be observed between the two.
            let links = extract_links(&content, url, self.config.origin_prefix());
            job.frontier.add_discovered(links);
            job.frontier.mark_processed();
            self.counters.pages_processed.fetch_add(1, Ordering::Relaxed);
            return UrlOutcome::Processed;
        }

        // Retries exhausted: the URL is skipped permanently, never requeued.
        error!(
            search_id = %job.search_id,
            url,
            max_retries,
            "giving up on url after repeated connection failures"
        );
        self.counters.retries_exhausted.fetch_add(1, Ordering::Relaxed);
        job.frontier.mark_processed();
        self.counters.pages_processed.fetch_add(1, Ordering::Relaxed);
        UrlOutcome::Processed
    }

    /// Sleep between retry attempts, waking early on shutdown. Returns
    /// false when the sleep was interrupted and the loop must stop.
    async fn retry_sleep(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.config.retry_delay()) => true,
            _ = shutdown_rx.recv() => {
                debug!("retry sleep interrupted by shutdown");
                false
            }
        }
    }

    /// Remove a finished crawl from the active set and mark its search
    /// done. Idempotent: only the first caller for an id has any effect.
    fn finalize(&self, search_id: &str) {
        let _guard = self.scheduling.lock();

        let Some((_, job)) = self.active.remove(search_id) else {
            return;
        };

        let snapshot = job.frontier_snapshot();
        info!(
            search_id,
            processed = snapshot.processed,
            visited = snapshot.visited,
            remaining_jobs = self.active.len(),
            "finalizing crawl"
        );

        if let Err(e) = self.store.mark_done(search_id) {
            error!(search_id, "search disappeared before finalization: {e}");
        }
        self.tasks.remove(search_id);
    }

    /// Whether any crawl is currently active.
    pub fn has_active_crawls(&self) -> bool {
        !self.active.is_empty()
    }

    /// Current scheduler statistics, for the pool monitor and logs.
    pub fn stats(&self) -> SchedulerStats {
        let queued_urls = self
            .active
            .iter()
            .map(|entry| entry.frontier_snapshot().pending)
            .sum();

        SchedulerStats {
            active_searches: self.active.len(),
            queued_urls,
            busy_workers: self.pool.busy(),
            pool_size: self.pool.size(),
            pages_processed: self.counters.pages_processed.load(Ordering::Relaxed),
            pages_fetched: self.counters.pages_fetched.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Relaxed),
            retries_exhausted: self.counters.retries_exhausted.load(Ordering::Relaxed),
            matches_found: self.counters.matches_found.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting crawls, signal every worker loop, and wait up to the
    /// configured grace period before force-terminating stragglers.
    pub async fn shutdown(&self) {
        info!("shutting down crawl scheduler");
        self.running.store(false, Ordering::Relaxed);
        let _ = self.shutdown_tx.send(());
        self.pool.shutdown().await;

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace();

        let ids: Vec<String> = self.tasks.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            let Some((_, mut handle)) = self.tasks.remove(&id) else {
                continue;
            };
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(_) => {}
                Err(_) => {
                    error!(search_id = %id, "worker did not stop within grace period, aborting");
                    handle.abort();
                    // Wait for the cancellation to land so the worker is
                    // really gone, and its pool slot released, on return.
                    let _ = handle.await;
                }
            }
        }

        info!("crawl scheduler stopped");
    }

    /// Whether the scheduler still accepts new crawls.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Poll a search until it is done or the timeout elapses. Test helper used
/// by the integration suite as well.
#[doc(hidden)]
pub async fn wait_until_done(
    store: &dyn SearchStore,
    search_id: &str,
    timeout: Duration,
) -> Result<crate::store::Search, StoreError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let search = store.find_by_id(search_id)?;
        if search.status == crate::store::SearchStatus::Done {
            return Ok(search);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(search);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::crawler::matcher::SubstringMatcher;
    use crate::store::{MemorySearchStore, SearchStatus};

    struct Harness {
        scheduler: Arc<CrawlScheduler>,
        store: Arc<MemorySearchStore>,
    }

    fn harness(base_url: &str) -> Harness {
        let config = CrawlerConfig {
            base_url: base_url.to_string(),
            min_workers: 2,
            max_workers: 4,
            retry_delay_secs: 0,
            shutdown_grace_secs: 2,
            ..CrawlerConfig::default()
        };
        let store = Arc::new(MemorySearchStore::new());
        let cache = Arc::new(PageCache::new(&CacheConfig::default()));
        let fetcher = Fetcher::new(&config).unwrap();
        let pool = WorkerPool::new(config.min_workers, config.max_workers);
        let (shutdown_tx, _) = broadcast::channel(8);

        let scheduler = CrawlScheduler::new(
            config,
            store.clone() as Arc<dyn SearchStore>,
            cache,
            fetcher,
            Arc::new(SubstringMatcher),
            pool,
            shutdown_tx,
        );

        Harness { scheduler, store }
    }

    #[tokio::test]
    async fn test_start_crawl_unknown_search() {
        let h = harness("http://127.0.0.1:1");
        let err = h.scheduler.start_crawl("deadbeef").unwrap_err();
        assert!(matches!(err, SchedulerError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_end_to_end_match_and_completion() {
        let mut server = mockito::Server::new_async().await;
        let origin = server.url();

        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(format!(
                r#"<html>widget factory <a href="{origin}/p2">next</a></html>"#
            ))
            .create_async()
            .await;
        server
            .mock("GET", "/p2")
            .with_status(200)
            .with_body("<html>nothing here</html>")
            .create_async()
            .await;

        let h = harness(&origin);
        let id = h.store.create("widget").unwrap();
        h.scheduler.start_crawl(&id).unwrap();

        let search = wait_until_done(h.store.as_ref(), &id, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(search.status, SearchStatus::Done);
        assert_eq!(
            search.urls.iter().cloned().collect::<Vec<_>>(),
            vec![origin.clone()]
        );
        assert!(!h.scheduler.has_active_crawls());
    }

    #[tokio::test]
    async fn test_no_duplicate_processing_on_cyclic_links() {
        let mut server = mockito::Server::new_async().await;
        let origin = server.url();

        // Two pages linking to each other and to themselves.
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(format!(
                r#"<a href="{origin}/">self</a><a href="{origin}/p2">two</a>"#
            ))
            .expect(1)
            .create_async()
            .await;
        let p2 = server
            .mock("GET", "/p2")
            .with_status(200)
            .with_body(format!(r#"<a href="{origin}/">back</a>"#))
            .expect(1)
            .create_async()
            .await;

        let h = harness(&origin);
        let id = h.store.create("widget").unwrap();
        h.scheduler.start_crawl(&id).unwrap();

        wait_until_done(h.store.as_ref(), &id, Duration::from_secs(5))
            .await
            .unwrap();

        p2.assert_async().await;
        assert_eq!(h.scheduler.stats().pages_processed, 2);
    }

    #[tokio::test]
    async fn test_terminal_status_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let origin = server.url();

        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(format!(r#"<a href="{origin}/gone">gone</a>"#))
            .create_async()
            .await;
        let gone = server
            .mock("GET", "/gone")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let h = harness(&origin);
        let id = h.store.create("widget").unwrap();
        h.scheduler.start_crawl(&id).unwrap();

        let search = wait_until_done(h.store.as_ref(), &id, Duration::from_secs(5))
            .await
            .unwrap();

        gone.assert_async().await;
        assert_eq!(search.status, SearchStatus::Done);
        assert!(search.urls.is_empty());
    }

    #[tokio::test]
    async fn test_retry_bound_on_unreachable_origin() {
        // Nothing listens on port 1; every attempt is a connection failure.
        let h = harness("http://127.0.0.1:1");
        let id = h.store.create("widget").unwrap();
        h.scheduler.start_crawl(&id).unwrap();

        let search = wait_until_done(h.store.as_ref(), &id, Duration::from_secs(5))
            .await
            .unwrap();

        // Exactly 3 attempts, then the URL was abandoned and the crawl
        // still completed.
        let stats = h.scheduler.stats();
        assert_eq!(stats.fetch_failures, 3);
        assert_eq!(stats.retries_exhausted, 1);
        assert_eq!(stats.pages_processed, 1);
        assert_eq!(search.status, SearchStatus::Done);
        assert!(search.urls.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_searches_do_not_interfere() {
        let mut server = mockito::Server::new_async().await;
        let origin = server.url();

        server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html>widget and gadget live here</html>")
            .create_async()
            .await;

        let h = harness(&origin);
        let widget_id = h.store.create("widget").unwrap();
        let gadget_id = h.store.create("missing-word").unwrap();
        h.scheduler.start_crawl(&widget_id).unwrap();
        h.scheduler.start_crawl(&gadget_id).unwrap();

        let widget = wait_until_done(h.store.as_ref(), &widget_id, Duration::from_secs(5))
            .await
            .unwrap();
        let gadget = wait_until_done(h.store.as_ref(), &gadget_id, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(widget.urls.len(), 1);
        assert!(gadget.urls.is_empty());
        assert_eq!(gadget.status, SearchStatus::Done);
    }

    #[tokio::test]
    async fn test_duplicate_start_rejected() {
        let mut server = mockito::Server::new_async().await;
        let origin = server.url();
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html>slow</html>")
            .create_async()
            .await;

        let h = harness(&origin);
        let id = h.store.create("widget").unwrap();
        h.scheduler.start_crawl(&id).unwrap();

        // The second start either races with completion (NotFound is
        // impossible here, the record persists) or is rejected outright.
        match h.scheduler.start_crawl(&id) {
            Err(SchedulerError::AlreadyRunning(_)) | Ok(_) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_crawls() {
        let h = harness("http://127.0.0.1:1");
        let id = h.store.create("widget").unwrap();

        h.scheduler.shutdown().await;
        assert!(!h.scheduler.is_running());
        assert!(matches!(
            h.scheduler.start_crawl(&id),
            Err(SchedulerError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_retry_sleep() {
        let config = CrawlerConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            min_workers: 1,
            max_workers: 2,
            retry_delay_secs: 60,
            shutdown_grace_secs: 2,
            ..CrawlerConfig::default()
        };
        let store = Arc::new(MemorySearchStore::new());
        let cache = Arc::new(PageCache::new(&CacheConfig::default()));
        let fetcher = Fetcher::new(&config).unwrap();
        let pool = WorkerPool::new(config.min_workers, config.max_workers);
        let (shutdown_tx, _) = broadcast::channel(8);
        let scheduler = CrawlScheduler::new(
            config,
            store.clone() as Arc<dyn SearchStore>,
            cache,
            fetcher,
            Arc::new(SubstringMatcher),
            pool,
            shutdown_tx,
        );

        let id = store.create("widget").unwrap();
        scheduler.start_crawl(&id).unwrap();

        // Give the worker time to fail its first attempt and enter the
        // 60-second retry sleep, then shut down. The sleep must be
        // interrupted well within the grace period.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let start = std::time::Instant::now();
        scheduler.shutdown().await;
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!scheduler.has_active_crawls());
    }

    #[tokio::test]
    async fn test_shutdown_aborts_worker_stuck_in_fetch() {
        // A listener that accepts the TCP handshake but never responds, so
        // the fetch blocks until the read timeout instead of failing fast.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());

        let config = CrawlerConfig {
            base_url: origin,
            min_workers: 1,
            max_workers: 2,
            read_timeout_secs: 60,
            shutdown_grace_secs: 0,
            ..CrawlerConfig::default()
        };
        let store = Arc::new(MemorySearchStore::new());
        let cache = Arc::new(PageCache::new(&CacheConfig::default()));
        let fetcher = Fetcher::new(&config).unwrap();
        let pool = WorkerPool::new(config.min_workers, config.max_workers);
        let (shutdown_tx, _) = broadcast::channel(8);
        let scheduler = CrawlScheduler::new(
            config,
            store.clone() as Arc<dyn SearchStore>,
            cache,
            fetcher,
            Arc::new(SubstringMatcher),
            Arc::clone(&pool),
            shutdown_tx,
        );

        let id = store.create("widget").unwrap();
        scheduler.start_crawl(&id).unwrap();

        // Let the worker get stuck in the fetch, then shut down with a zero
        // grace period: the loop cannot reach a cooperative checkpoint, so
        // it must be force-terminated.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let start = std::time::Instant::now();
        scheduler.shutdown().await;
        assert!(start.elapsed() < Duration::from_secs(5));

        // The aborted worker released its pool slot on cancellation; a
        // merely-detached worker would still hold it for the full read
        // timeout.
        assert_eq!(pool.busy(), 0);
        drop(listener);
    }
}
