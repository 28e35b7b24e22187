//! Breadth-first frontier and seen-set
//!
//! The frontier owns everything that must change atomically when a worker
//! claims a URL: the FIFO queue, the enqueued-set, the seen-set and the page
//! reservations. [`FrontierHandle`] only exposes closure-scoped access to it,
//! so the lock can never be held across an await point.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// A URL waiting to be crawled and its distance from the seeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
}

/// Result of trying to claim an entry for fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Marked seen and one page slot reserved
    Admitted,
    AlreadySeen,
    TooDeep,
    PageLimitReached,
}

#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    enqueued: HashSet<String>,
    seen: HashSet<String>,
    reserved: u64,
    max_depth: Option<u32>,
    max_pages: Option<u64>,
}

impl Frontier {
    pub fn new(max_depth: Option<u32>, max_pages: Option<u64>) -> Self {
        Self {
            max_depth,
            max_pages,
            ..Self::default()
        }
    }

    /// Adds a URL to the back of the queue
    ///
    /// Returns false (and does nothing) if the URL was already enqueued or seen.
    pub fn enqueue(&mut self, url: Url, depth: u32) -> bool {
        let key = url.as_str();
        if self.seen.contains(key) || self.enqueued.contains(key) {
            return false;
        }

        self.enqueued.insert(key.to_string());
        self.queue.push_back(FrontierEntry { url, depth });
        true
    }

    /// Removes the oldest queued entry
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    /// Claims `entry` for fetching
    ///
    /// On [`Admission::Admitted`] the URL is marked seen and a page slot is
    /// reserved; any other result leaves the frontier unchanged.
    pub fn try_admit(&mut self, entry: &FrontierEntry) -> Admission {
        if self.seen.contains(entry.url.as_str()) {
            return Admission::AlreadySeen;
        }

        if self.max_depth.map_or(false, |max| entry.depth > max) {
            return Admission::TooDeep;
        }

        if self.page_limit_reached() {
            return Admission::PageLimitReached;
        }

        self.seen.insert(entry.url.to_string());
        self.reserved += 1;
        Admission::Admitted
    }

    /// Returns a page slot whose URL ended up not being fetched
    ///
    /// The URL stays seen.
    pub fn release_reservation(&mut self) {
        self.reserved = self.reserved.saturating_sub(1);
    }

    /// True when every page slot is reserved
    pub fn page_limit_reached(&self) -> bool {
        self.max_pages.map_or(false, |max| self.reserved >= max)
    }

    pub fn is_seen(&self, url: &Url) -> bool {
        self.seen.contains(url.as_str())
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }
}

/// Shared, lock-protected frontier
#[derive(Debug, Clone, Default)]
pub struct FrontierHandle {
    inner: Arc<Mutex<Frontier>>,
}

impl FrontierHandle {
    pub fn new(frontier: Frontier) -> Self {
        Self {
            inner: Arc::new(Mutex::new(frontier)),
        }
    }

    /// Runs `f` with exclusive access to the frontier
    ///
    /// `f` is synchronous, so the critical section cannot span a suspension
    /// point.
    pub fn with<R>(&self, f: impl FnOnce(&mut Frontier) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
