//! Crawl engine
//!
//! Breadth-first, same-origin keyword crawling. Each search gets its own
//! [`Frontier`] and a dedicated worker loop scheduled by the
//! [`CrawlScheduler`] onto a shared, resizable [`WorkerPool`]. Fetched
//! pages pass through a TTL [`PageCache`] shared by every search, and the
//! [`PoolMonitor`] resizes the pool as load changes.

pub mod cache;
pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod matcher;
pub mod monitor;
pub mod pool;
pub mod scheduler;

pub use cache::PageCache;
pub use extractor::extract_links;
pub use fetcher::{FetchError, Fetcher};
pub use frontier::{Frontier, FrontierSnapshot};
pub use matcher::{KeywordMatcher, SubstringMatcher};
pub use monitor::PoolMonitor;
pub use pool::WorkerPool;
pub use scheduler::{CrawlScheduler, SchedulerError, SchedulerStats};
