//! Concurrency dispatcher
//!
//! Runs each frontier entry as a task in a `JoinSet`. A task first takes a
//! permit from the job's admission semaphore, then re-validates the entry
//! against live constraints, claims it in the frontier, consults the
//! politeness gate, fetches, processes, persists, and feeds discovered links
//! back into the frontier. The permit is released when the task ends,
//! whichever way it ends.

use crate::crawler::fetcher::{FetchOutcome, PageFetcher};
use crate::crawler::frontier::{Admission, FrontierEntry, FrontierHandle};
use crate::crawler::parser::{process_page, SelectorSet};
use crate::crawler::result::PageResult;
use crate::robots::PolitenessGate;
use crate::state::JobStats;
use crate::storage::ResultsStore;
use crate::url::{origin_key, ScopeEvaluator};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Live page counters, readable while the job runs
#[derive(Debug, Default)]
pub struct PageCounters {
    fetched: AtomicU64,
    failed: AtomicU64,
}

impl PageCounters {
    fn record(&self, result: &PageResult) {
        if result.is_success() {
            self.fetched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn fetched(&self) -> u64 {
        self.fetched.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Cloneable view of a job's live statistics
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    pub(crate) counters: Arc<PageCounters>,
    pub(crate) frontier: FrontierHandle,
    pub(crate) started: Arc<OnceLock<Instant>>,
}

impl ProgressHandle {
    /// Current statistics; duration is zero until the job starts running
    pub fn snapshot(&self) -> JobStats {
        JobStats {
            pages_fetched: self.counters.fetched(),
            pages_failed: self.counters.failed(),
            urls_seen: self.frontier.with(|f| f.seen_count()) as u64,
            duration_seconds: self
                .started
                .get()
                .map_or(0.0, |started| started.elapsed().as_secs_f64()),
        }
    }

    /// Entries waiting in the frontier
    pub fn queued(&self) -> usize {
        self.frontier.with(|f| f.queued_count())
    }
}

/// Everything a page task needs, shared by all tasks of one job
pub(crate) struct CrawlContext {
    pub job_id: String,
    pub user_agent: String,
    pub scope: ScopeEvaluator,
    /// Seed origins; None when cross-origin links are followed
    pub origins: Option<HashSet<String>>,
    pub max_depth: Option<u32>,
    pub max_duration: Option<Duration>,
    pub selectors: SelectorSet,
    pub frontier: FrontierHandle,
    pub politeness: PolitenessGate,
    pub fetcher: Arc<dyn PageFetcher>,
    pub store: Arc<dyn ResultsStore>,
    pub cancel: CancellationToken,
    pub counters: Arc<PageCounters>,
    pub started: Instant,
}

impl CrawlContext {
    /// Scope and same-origin checks
    pub fn in_bounds(&self, url: &Url) -> bool {
        if !self.scope.in_scope(url.as_str()) {
            return false;
        }

        match &self.origins {
            Some(origins) => origin_key(url).map_or(false, |key| origins.contains(&key)),
            None => true,
        }
    }

    pub fn duration_exceeded(&self) -> bool {
        self.max_duration
            .map_or(false, |max| self.started.elapsed() > max)
    }

    /// Instant at which the duration limit expires
    fn deadline(&self) -> Option<Instant> {
        self.max_duration.map(|max| self.started + max)
    }

    fn depth_allowed(&self, depth: u32) -> bool {
        self.max_depth.map_or(true, |max| depth <= max)
    }
}

/// Bounded task group for one job
pub(crate) struct Dispatcher {
    ctx: Arc<CrawlContext>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<CrawlContext>, concurrency: usize) -> Self {
        Self {
            ctx,
            permits: Arc::new(Semaphore::new(concurrency)),
            tasks: JoinSet::new(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Spawns a task for `entry`
    pub fn submit(&mut self, entry: FrontierEntry) {
        let ctx = Arc::clone(&self.ctx);
        let permits = Arc::clone(&self.permits);

        self.tasks.spawn(async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            crawl_entry(ctx, entry, permit).await;
        });
    }

    /// Waits for the next task to finish
    ///
    /// Returns false when no task is in flight.
    pub async fn join_next(&mut self) -> bool {
        match self.tasks.join_next().await {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::warn!("Page task ended abnormally: {}", e);
                true
            }
            None => false,
        }
    }

    /// Waits for every in-flight task
    pub async fn drain(&mut self) {
        while self.join_next().await {}
    }
}

/// Crawls one frontier entry while holding an admission permit
async fn crawl_entry(ctx: Arc<CrawlContext>, entry: FrontierEntry, _permit: OwnedSemaphorePermit) {
    if ctx.cancel.is_cancelled() || ctx.duration_exceeded() {
        return;
    }

    if !ctx.in_bounds(&entry.url) {
        tracing::debug!("Out of bounds: {}", entry.url);
        return;
    }

    match ctx.frontier.with(|f| f.try_admit(&entry)) {
        Admission::Admitted => {}
        other => {
            tracing::debug!("Not admitted ({:?}): {}", other, entry.url);
            return;
        }
    }

    if !ctx.politeness.allowed(&entry.url, &ctx.user_agent).await {
        tracing::debug!("Disallowed by robots.txt: {}", entry.url);
        ctx.frontier.with(|f| f.release_reservation());
        return;
    }

    let delay = ctx.politeness.delay_for(&entry.url, &ctx.user_agent).await;
    if !delay.is_zero() {
        let deadline = async {
            match ctx.deadline() {
                Some(at) => tokio::time::sleep_until(at.into()).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = ctx.cancel.cancelled() => {
                ctx.frontier.with(|f| f.release_reservation());
                return;
            }
            _ = deadline => {
                tracing::debug!("Duration limit reached while waiting to fetch {}", entry.url);
                ctx.frontier.with(|f| f.release_reservation());
                return;
            }
        }
    }

    tracing::debug!("Fetching {} (depth {})", entry.url, entry.depth);
    let result = match ctx.fetcher.fetch(&entry.url).await {
        FetchOutcome::Success(page) => process_page(&entry.url, entry.depth, page, &ctx.selectors),
        FetchOutcome::Failure { error, status_code } => {
            tracing::debug!("Fetch failed for {}: {}", entry.url, error);
            let mut failed = PageResult::failure(entry.url.as_str(), entry.depth, error);
            if let Some(status) = status_code {
                failed.status_code = status;
            }
            failed
        }
    };

    ctx.counters.record(&result);

    if let Err(e) = ctx.store.append_page_result(&ctx.job_id, &result).await {
        tracing::warn!("Failed to store result for {}: {}", result.url, e);
    }

    enqueue_links(&ctx, &result, entry.depth + 1);
}

/// Feeds a page's links back into the frontier at `child_depth`
///
/// Links that could never be admitted are dropped here so they don't occupy
/// the queue.
fn enqueue_links(ctx: &CrawlContext, result: &PageResult, child_depth: u32) {
    if result.links.is_empty() || !ctx.depth_allowed(child_depth) {
        return;
    }

    let candidates: Vec<Url> = result
        .links
        .iter()
        .filter_map(|link| Url::parse(link).ok())
        .filter(|url| ctx.in_bounds(url))
        .collect();

    let added = ctx.frontier.with(|f| {
        candidates
            .into_iter()
            .filter(|url| f.enqueue(url.clone(), child_depth))
            .count()
    });

    if added > 0 {
        tracing::debug!("Queued {} links from {}", added, result.url);
    }
}
