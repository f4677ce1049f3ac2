//! Search records and their store
//!
//! The crawl engine never owns the authoritative search record; it reports
//! matches and completion through the [`SearchStore`] trait and otherwise
//! carries only the id, keyword, and origin it needs to drive crawling.

mod memory;

pub use memory::MemorySearchStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Length of generated search ids
pub const SEARCH_ID_LENGTH: usize = 8;

/// Lifecycle state of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    /// Crawl in progress; the URL list may still grow
    Active,
    /// Crawl finished; the URL list is final
    Done,
}

/// A keyword search and its accumulated results.
///
/// `urls` is an ordered set so that repeated reads and API responses list
/// matches deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Search {
    pub id: String,
    pub keyword: String,
    pub status: SearchStatus,
    pub urls: BTreeSet<String>,
}

impl Search {
    pub fn new(id: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            keyword: keyword.into(),
            status: SearchStatus::Active,
            urls: BTreeSet::new(),
        }
    }
}

/// Store failures surfaced to the crawl engine and the API.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("search with id {0} not found")]
    NotFound(String),
    #[error("a search for keyword '{0}' already exists")]
    DuplicateKeyword(String),
}

/// External interface between the crawl engine and the search records.
///
/// The engine mutates searches only through `append_url` and `mark_done`;
/// everything else exists for the API surface.
pub trait SearchStore: Send + Sync {
    /// Create a search for `keyword`, rejecting duplicates, and return its id.
    fn create(&self, keyword: &str) -> Result<String, StoreError>;

    /// Fetch a snapshot of a search record.
    fn find_by_id(&self, id: &str) -> Result<Search, StoreError>;

    /// Record a matched URL against a search.
    fn append_url(&self, id: &str, url: &str) -> Result<(), StoreError>;

    /// Transition a search to [`SearchStatus::Done`].
    fn mark_done(&self, id: &str) -> Result<(), StoreError>;
}

/// Generate an 8-character alphanumeric search id.
pub fn generate_search_id() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SEARCH_ID_LENGTH)
        .collect()
}
