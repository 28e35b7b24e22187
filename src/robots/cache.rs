//! Per-job robots.txt policy cache
//!
//! Entries live for the lifetime of the job that owns the cache and are never
//! refreshed. Concurrent lookups for a host that has not been loaded yet wait
//! on the same load instead of each fetching robots.txt.

use crate::robots::ParsedRobots;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type PolicyCell = Arc<OnceCell<Arc<ParsedRobots>>>;

#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, PolicyCell>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the policy for `key`, running `load` if this is the first lookup
    ///
    /// # Arguments
    ///
    /// * `key` - Origin key (`scheme://host[:port]`)
    /// * `load` - Produces the policy; only the first caller's loader runs
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Arc<ParsedRobots>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ParsedRobots>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.entry(key.to_string()).or_default().clone()
        };

        cell.get_or_init(|| async { Arc::new(load().await) })
            .await
            .clone()
    }

    /// Number of hosts with a cache slot
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
