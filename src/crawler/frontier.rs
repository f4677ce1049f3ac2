//! Per-search crawl frontier
//!
//! Owns the pending-URL queue, the visited set, and the completion counters
//! for one search. All state lives behind a single mutex so that concurrent
//! readers (the pool monitor, the scheduler) always see a consistent
//! snapshot and the completion check can never observe counters mid-update.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

/// Crawl frontier for a single search.
///
/// The `visited` set is the dedup gate: a URL enters `pending` at most once,
/// ever, no matter how many pages link to it. Completion means both nothing
/// queued and nothing checked out by the worker.
pub struct Frontier {
    state: Mutex<FrontierState>,
}

struct FrontierState {
    /// URLs discovered but not yet dispatched to the worker
    pending: VecDeque<String>,
    /// URLs that have entered the queue at least once
    visited: HashSet<String>,
    /// Items currently in `pending`
    pending_count: usize,
    /// URLs checked out of the queue but not yet finalized
    processing_count: usize,
    /// URLs finalized (success, terminal failure, or retries exhausted)
    processed_count: u64,
}

/// Point-in-time view of a frontier, for monitoring and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierSnapshot {
    pub pending: usize,
    pub processing: usize,
    pub processed: u64,
    pub visited: usize,
}

impl Frontier {
    /// Create a frontier seeded with the crawl origin.
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        let mut pending = VecDeque::new();
        let mut visited = HashSet::new();
        visited.insert(origin.clone());
        pending.push_back(origin);

        Self {
            state: Mutex::new(FrontierState {
                pending,
                visited,
                pending_count: 1,
                processing_count: 0,
                processed_count: 0,
            }),
        }
    }

    /// Atomically remove the head of the queue and move it to processing.
    ///
    /// Returns `None` when the queue is empty; the caller must not call
    /// [`mark_processed`](Self::mark_processed) in that case.
    pub fn pop_next(&self) -> Option<String> {
        let mut state = self.state.lock();
        let url = state.pending.pop_front()?;
        state.pending_count -= 1;
        state.processing_count += 1;
        debug_assert_eq!(state.pending_count, state.pending.len());
        Some(url)
    }

    /// Queue every URL not already seen, filtering duplicates both within
    /// the batch and against everything previously queued.
    ///
    /// Returns the number of URLs actually added.
    pub fn add_discovered(&self, urls: Vec<String>) -> usize {
        let mut state = self.state.lock();
        let mut added = 0;
        for url in urls {
            // HashSet::insert doubles as the within-batch duplicate filter.
            if state.visited.insert(url.clone()) {
                state.pending.push_back(url);
                state.pending_count += 1;
                added += 1;
            }
        }
        debug_assert_eq!(state.pending_count, state.pending.len());
        added
    }

    /// Finalize one popped URL. Called exactly once per pop regardless of
    /// success, terminal failure, or retry exhaustion; this is what makes
    /// completion detection sound.
    pub fn mark_processed(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.processing_count > 0, "mark_processed without a matching pop");
        state.processing_count -= 1;
        state.processed_count += 1;
    }

    /// A crawl is complete only when nothing is queued and nothing is in
    /// flight. Checked after `mark_processed`, never before: links from the
    /// URL in hand are always enqueued before the URL itself is finalized,
    /// so a zero observed here cannot be invalidated by late arrivals.
    pub fn is_complete(&self) -> bool {
        let state = self.state.lock();
        state.pending_count == 0 && state.processing_count == 0
    }

    /// Consistent snapshot for monitoring. Never used as a basis for
    /// mutation.
    pub fn snapshot(&self) -> FrontierSnapshot {
        let state = self.state.lock();
        FrontierSnapshot {
            pending: state.pending_count,
            processing: state.processing_count,
            processed: state.processed_count,
            visited: state.visited.len(),
        }
    }
}
