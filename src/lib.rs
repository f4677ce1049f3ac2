//! Sitehound: keyword-hunting web crawler
//!
//! Crawls a configured site breadth-first, starting one crawl per search
//! request, looking for a keyword in fetched page bodies and recording
//! every URL whose content matches. Features:
//! - Per-search crawl frontiers with duplicate suppression
//! - A shared, dynamically-resized worker pool draining all frontiers
//! - Retry with fixed backoff on transient fetch failures
//! - A time-bounded page cache shared across searches
//! - An HTTP API for starting searches and polling their results

pub mod api;
pub mod config;
pub mod crawler;
pub mod store;

pub use config::Config;
