//! Job controller - drives one crawl job from queued to a terminal state
//!
//! The controller owns the dispatch loop: it seeds the frontier, submits
//! entries to the dispatcher while enforcing global limits and cancellation,
//! drains every in-flight task, and persists the final status and stats.

use crate::config::CrawlSpec;
use crate::crawler::dispatcher::{CrawlContext, Dispatcher, PageCounters, ProgressHandle};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::frontier::{Frontier, FrontierHandle};
use crate::crawler::parser::SelectorSet;
use crate::robots::{HttpRobotsSource, PolitenessGate, RobotsSource};
use crate::state::{JobState, JobStats, JobStatus};
use crate::storage::{JobRecord, ResultsStore};
use crate::url::{normalize_url, seed_origins, ScopeEvaluator};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Final report of a job run
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub stats: JobStats,

    /// Setup error for failed jobs
    pub error: Option<String>,
}

/// Runs a single crawl job
pub struct JobController {
    job_id: String,
    spec: CrawlSpec,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ResultsStore>,
    robots_source: Option<Arc<dyn RobotsSource>>,
    cancel: CancellationToken,
    counters: Arc<PageCounters>,
    frontier: FrontierHandle,
    started: Arc<OnceLock<Instant>>,
}

impl JobController {
    /// Creates a controller for `spec`
    ///
    /// # Arguments
    ///
    /// * `job_id` - ID of the job record (created on run if missing)
    /// * `spec` - The validated crawl spec
    /// * `fetcher` - Fetch collaborator
    /// * `store` - Where the job record and page results are written
    /// * `cancel` - Cooperative cancellation signal
    pub fn new(
        job_id: impl Into<String>,
        spec: CrawlSpec,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn ResultsStore>,
        cancel: CancellationToken,
    ) -> Self {
        let frontier = Frontier::new(spec.limits.max_depth, spec.limits.max_pages);

        Self {
            job_id: job_id.into(),
            spec,
            fetcher,
            store,
            robots_source: None,
            cancel,
            counters: Arc::new(PageCounters::default()),
            frontier: FrontierHandle::new(frontier),
            started: Arc::new(OnceLock::new()),
        }
    }

    /// Creates a controller for the oldest queued job in `store`
    ///
    /// Returns `Ok(None)` when no job is waiting. The job's spec is decoded
    /// from its record and handed to `make_fetcher`, so the fetcher can use
    /// the job's own user agent.
    pub async fn next_queued<F>(
        store: Arc<dyn ResultsStore>,
        cancel: CancellationToken,
        make_fetcher: F,
    ) -> crate::Result<Option<Self>>
    where
        F: FnOnce(&CrawlSpec) -> crate::Result<Arc<dyn PageFetcher>>,
    {
        let Some(record) = store.next_queued_job().await? else {
            return Ok(None);
        };

        let spec = record.spec()?;
        let fetcher = make_fetcher(&spec)?;
        tracing::info!("Picked up queued job {}", record.id);
        Ok(Some(Self::new(record.id, spec, fetcher, store, cancel)))
    }

    /// Uses `source` for robots.txt instead of fetching it over HTTP
    pub fn with_robots_source(mut self, source: Arc<dyn RobotsSource>) -> Self {
        self.robots_source = Some(source);
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Handle for reading live statistics while `run` executes
    pub fn progress(&self) -> ProgressHandle {
        ProgressHandle {
            counters: Arc::clone(&self.counters),
            frontier: self.frontier.clone(),
            started: Arc::clone(&self.started),
        }
    }

    /// Runs the job to a terminal state
    ///
    /// Per-page failures never fail the job. A job only fails when the fetch
    /// collaborator or the store cannot be used at startup; that outcome is
    /// returned as `Ok` with [`JobStatus::Failed`] and the error text.
    pub async fn run(self) -> crate::Result<JobOutcome> {
        let mut state = JobState::new(self.job_id.clone());
        let setup_clock = Instant::now();

        if let Err(e) = self.ensure_job_record().await {
            tracing::error!("Job {}: cannot record job: {}", self.job_id, e);
            state.transition(JobStatus::Failed)?;
            return Ok(self.outcome(&state, setup_clock, Some(e.to_string())));
        }

        let politeness = match self.build_politeness() {
            Ok(politeness) => politeness,
            Err(e) => return self.fail_setup(state, setup_clock, e).await,
        };

        if let Err(e) = self.fetcher.startup().await {
            return self.fail_setup(state, setup_clock, e.to_string()).await;
        }

        state.transition(JobStatus::Running)?;
        if let Err(e) = self
            .store
            .update_job_status(&self.job_id, JobStatus::Running, None)
            .await
        {
            return self.fail_setup(state, setup_clock, e.to_string()).await;
        }

        let started = *self.started.get_or_init(Instant::now);
        let seeded = self.seed_frontier();
        tracing::info!(
            "Job {} running: {} seed(s), concurrency {}",
            self.job_id,
            seeded,
            self.spec.request.concurrency
        );

        let ctx = Arc::new(CrawlContext {
            job_id: self.job_id.clone(),
            user_agent: self.spec.request.user_agent.clone(),
            scope: ScopeEvaluator::compile(&self.spec.scope.rules),
            origins: self
                .spec
                .same_domain_only
                .then(|| seed_origins(&self.spec.seeds)),
            max_depth: self.spec.limits.max_depth,
            max_duration: self.spec.limits.max_duration_seconds.map(Duration::from_secs),
            selectors: SelectorSet::compile(&self.spec.extraction.selectors),
            frontier: self.frontier.clone(),
            politeness,
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::clone(&self.store),
            cancel: self.cancel.clone(),
            counters: Arc::clone(&self.counters),
            started,
        });

        let stopped_by_cancel = self.dispatch_loop(Arc::clone(&ctx)).await;

        let final_status = if stopped_by_cancel {
            JobStatus::Cancelled
        } else {
            JobStatus::Completed
        };
        state.transition(final_status)?;

        let outcome = self.outcome(&state, started, None);
        self.persist_terminal(&outcome).await;

        tracing::info!(
            "Job {} {}: {} fetched, {} failed, {} seen in {:.1}s",
            outcome.job_id,
            outcome.status,
            outcome.stats.pages_fetched,
            outcome.stats.pages_failed,
            outcome.stats.urls_seen,
            outcome.stats.duration_seconds
        );

        Ok(outcome)
    }

    /// Submits frontier entries until the frontier drains, a limit triggers,
    /// or cancellation is observed
    ///
    /// Returns true if the loop stopped because of cancellation. Every task is
    /// joined before this returns.
    async fn dispatch_loop(&self, ctx: Arc<CrawlContext>) -> bool {
        let concurrency = self.spec.request.concurrency.max(1);
        let max_in_flight = concurrency * 2;
        let mut dispatcher = Dispatcher::new(Arc::clone(&ctx), concurrency);
        let mut stopped_by_cancel = false;

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Job {}: cancellation requested", self.job_id);
                stopped_by_cancel = true;
                break;
            }

            if ctx.duration_exceeded() {
                tracing::info!("Job {}: duration limit reached", self.job_id);
                break;
            }

            // Reservations can be released by robots denials, so a full page
            // limit only ends the job once nothing is in flight.
            if self.frontier.with(|f| f.page_limit_reached()) {
                if dispatcher.in_flight() == 0 {
                    tracing::info!("Job {}: page limit reached", self.job_id);
                    break;
                }
                dispatcher.join_next().await;
                continue;
            }

            match self.frontier.with(|f| f.pop()) {
                Some(entry) => {
                    dispatcher.submit(entry);
                    if dispatcher.in_flight() >= max_in_flight {
                        dispatcher.join_next().await;
                    }
                }
                None => {
                    if !dispatcher.join_next().await {
                        break;
                    }
                }
            }
        }

        dispatcher.drain().await;
        stopped_by_cancel
    }

    /// Enqueues every valid seed at depth 0
    fn seed_frontier(&self) -> usize {
        let seeds: Vec<_> = self
            .spec
            .seeds
            .iter()
            .filter_map(|seed| match normalize_url(seed) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("Skipping seed '{}': {}", seed, e);
                    None
                }
            })
            .collect();

        self.frontier.with(|f| {
            seeds
                .into_iter()
                .filter(|url| f.enqueue(url.clone(), 0))
                .count()
        })
    }

    fn build_politeness(&self) -> Result<PolitenessGate, String> {
        let base_delay = Duration::from_millis(self.spec.request.delay_ms);

        if !self.spec.request.respect_robots {
            return Ok(PolitenessGate::disabled(base_delay));
        }

        let source: Arc<dyn RobotsSource> = match &self.robots_source {
            Some(source) => Arc::clone(source),
            None => Arc::new(
                HttpRobotsSource::new(&self.spec.request.user_agent).map_err(|e| e.to_string())?,
            ),
        };

        Ok(PolitenessGate::respecting(source, base_delay))
    }

    async fn ensure_job_record(&self) -> crate::Result<()> {
        if self.store.get_job(&self.job_id).await?.is_none() {
            let record = JobRecord::queued(self.job_id.clone(), &self.spec)?;
            self.store.create_job(&record).await?;
        }
        Ok(())
    }

    async fn fail_setup(
        &self,
        mut state: JobState,
        clock: Instant,
        error: String,
    ) -> crate::Result<JobOutcome> {
        tracing::error!("Job {} failed during setup: {}", self.job_id, error);
        state.transition(JobStatus::Failed)?;

        let outcome = self.outcome(&state, clock, Some(error));
        self.persist_terminal(&outcome).await;
        Ok(outcome)
    }

    async fn persist_terminal(&self, outcome: &JobOutcome) {
        if let Err(e) = self
            .store
            .update_job_stats(&outcome.job_id, &outcome.stats)
            .await
        {
            tracing::warn!("Job {}: failed to store stats: {}", outcome.job_id, e);
        }

        if let Err(e) = self
            .store
            .update_job_status(&outcome.job_id, outcome.status, outcome.error.as_deref())
            .await
        {
            tracing::warn!("Job {}: failed to store status: {}", outcome.job_id, e);
        }
    }

    fn outcome(&self, state: &JobState, clock: Instant, error: Option<String>) -> JobOutcome {
        JobOutcome {
            job_id: state.id.clone(),
            status: state.status(),
            stats: JobStats {
                pages_fetched: self.counters.fetched(),
                pages_failed: self.counters.failed(),
                urls_seen: self.frontier.with(|f| f.seen_count()) as u64,
                duration_seconds: clock.elapsed().as_secs_f64(),
            },
            error,
        }
    }
}
