//! In-memory search store

use dashmap::DashMap;
use tracing::{debug, info};

use super::{generate_search_id, Search, SearchStatus, SearchStore, StoreError};

/// Concurrent in-memory implementation of [`SearchStore`].
///
/// Keyed by search id; the duplicate-keyword check on create scans the map,
/// which is fine at the scale a single instance handles.
#[derive(Default)]
pub struct MemorySearchStore {
    searches: DashMap<String, Search>,
}

impl MemorySearchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored searches (any status).
    pub fn len(&self) -> usize {
        self.searches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }

    fn keyword_exists(&self, keyword: &str) -> bool {
        self.searches.iter().any(|entry| entry.keyword == keyword)
    }

    /// Draw ids until one is unused, so a collision can never overwrite a
    /// live search.
    fn unique_id(&self, mut generate: impl FnMut() -> String) -> String {
        loop {
            let id = generate();
            if !self.searches.contains_key(&id) {
                return id;
            }
            debug!(id, "generated id already in use, retrying");
        }
    }
}

impl SearchStore for MemorySearchStore {
    fn create(&self, keyword: &str) -> Result<String, StoreError> {
        if self.keyword_exists(keyword) {
            return Err(StoreError::DuplicateKeyword(keyword.to_string()));
        }

        let id = self.unique_id(generate_search_id);
        self.searches.insert(id.clone(), Search::new(&id, keyword));
        info!(id, keyword, "created search");
        Ok(id)
    }

    fn find_by_id(&self, id: &str) -> Result<Search, StoreError> {
        self.searches
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn append_url(&self, id: &str, url: &str) -> Result<(), StoreError> {
        let mut entry = self
            .searches
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.urls.insert(url.to_string());
        debug!(id, url, "recorded matched url");
        Ok(())
    }

    fn mark_done(&self, id: &str) -> Result<(), StoreError> {
        let mut entry = self
            .searches
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.status = SearchStatus::Done;
        info!(id, urls = entry.urls.len(), "search finished");
        Ok(())
    }
}
