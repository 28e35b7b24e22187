//! Integration tests for the crawler
//!
//! Most tests drive a `JobController` against an in-memory site so that the
//! crawl graph is exact; the end-to-end tests use wiremock to run the HTTP
//! fetcher, robots.txt retrieval and the SQLite store together.

use async_trait::async_trait;
use scopecrawl::config::{CrawlSpec, ScopeRule, SelectorSpec};
use scopecrawl::CrawlError;
use scopecrawl::crawler::{
    FetchError, FetchOutcome, FetchedPage, JobController, JobOutcome, OneShotHttpFetcher,
    PageFetcher, PageResult, PooledHttpFetcher,
};
use scopecrawl::output::write_results_ndjson;
use scopecrawl::robots::{RobotsError, RobotsSource};
use scopecrawl::storage::{JobRecord, MemoryStore, ResultsStore, SqliteStore, StorageResult};
use scopecrawl::{CancellationToken, JobStats, JobStatus};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===== In-memory site =====

/// Serves a fixed set of pages and records every fetch
#[derive(Default)]
struct SiteFetcher {
    pages: HashMap<String, String>,
    delay: Duration,
    slow: HashMap<String, Duration>,
    fail_startup: bool,
    fetched: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl SiteFetcher {
    fn new() -> Self {
        Self::default()
    }

    fn page(mut self, url: &str, links: &[&str]) -> Self {
        self.pages.insert(url.to_string(), html_with_links(url, links));
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Overrides the fetch delay for one URL
    fn slow_page(mut self, url: &str, delay: Duration) -> Self {
        self.slow.insert(url.to_string(), delay);
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for SiteFetcher {
    async fn startup(&self) -> Result<(), FetchError> {
        if self.fail_startup {
            return Err(FetchError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn fetch(&self, url: &Url) -> FetchOutcome {
        self.fetched.lock().unwrap().push(url.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = self.slow.get(url.as_str()).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.pages.get(url.as_str()) {
            Some(html) => FetchOutcome::Success(FetchedPage::html(html.clone())),
            None => FetchOutcome::Failure {
                error: "HTTP 404 Not Found".to_string(),
                status_code: Some(404),
            },
        }
    }
}

fn html_with_links(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1>{}</body></html>",
        title, title, anchors
    )
}

/// Robots source that is never reachable
struct UnreachableRobots;

#[async_trait]
impl RobotsSource for UnreachableRobots {
    async fn fetch_robots(&self, _scheme: &str, _host: &str) -> Result<String, RobotsError> {
        Err(RobotsError::Unavailable("connection refused".to_string()))
    }
}

/// Robots source serving the same robots.txt for every host
struct StaticRobots(&'static str);

#[async_trait]
impl RobotsSource for StaticRobots {
    async fn fetch_robots(&self, _scheme: &str, _host: &str) -> Result<String, RobotsError> {
        Ok(self.0.to_string())
    }
}

/// Store that cancels the job once a result is persisted
///
/// With `trigger` set, only a result for that URL cancels.
struct CancelAfterFirstResult {
    inner: MemoryStore,
    cancel: CancellationToken,
    trigger: Option<String>,
}

#[async_trait]
impl ResultsStore for CancelAfterFirstResult {
    async fn create_job(&self, job: &JobRecord) -> StorageResult<()> {
        self.inner.create_job(job).await
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        self.inner.update_job_status(job_id, status, error).await
    }

    async fn update_job_stats(&self, job_id: &str, stats: &JobStats) -> StorageResult<()> {
        self.inner.update_job_stats(job_id, stats).await
    }

    async fn get_job(&self, job_id: &str) -> StorageResult<Option<JobRecord>> {
        self.inner.get_job(job_id).await
    }

    async fn next_queued_job(&self) -> StorageResult<Option<JobRecord>> {
        self.inner.next_queued_job().await
    }

    async fn append_page_result(&self, job_id: &str, result: &PageResult) -> StorageResult<()> {
        self.inner.append_page_result(job_id, result).await?;
        if self.trigger.as_deref().map_or(true, |url| url == result.url) {
            self.cancel.cancel();
        }
        Ok(())
    }

    async fn list_results(
        &self,
        job_id: &str,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<PageResult>> {
        self.inner.list_results(job_id, limit, offset).await
    }

    async fn count_results(&self, job_id: &str) -> StorageResult<u64> {
        self.inner.count_results(job_id).await
    }
}

fn spec(seeds: &[&str]) -> CrawlSpec {
    let mut spec = CrawlSpec::with_seeds(seeds.iter().copied());
    spec.request.user_agent = "TestBot/1.0".to_string();
    spec
}

async fn run_job(spec: CrawlSpec, fetcher: Arc<SiteFetcher>) -> (JobOutcome, Vec<PageResult>) {
    let store = Arc::new(MemoryStore::new());
    let controller = JobController::new(
        "job-1",
        spec,
        fetcher,
        store.clone(),
        CancellationToken::new(),
    );

    let outcome = controller.run().await.unwrap();
    (outcome, store.results("job-1"))
}

fn urls(results: &[PageResult]) -> HashSet<String> {
    results.iter().map(|r| r.url.clone()).collect()
}

/// Root linking to every page, every page linking to every other page
fn dense_site(count: usize) -> SiteFetcher {
    let pages: Vec<String> = (0..count).map(|i| format!("https://a.test/p{}", i)).collect();
    let refs: Vec<&str> = pages.iter().map(String::as_str).collect();

    let mut site = SiteFetcher::new().page("https://a.test/", &refs);
    for page in &pages {
        site = site.page(page, &refs);
    }
    site
}

// ===== Scope and depth =====

#[tokio::test]
async fn test_same_domain_depth_one() {
    let site = SiteFetcher::new()
        .page("https://a.test/", &["/x", "https://b.test/y"])
        .page("https://a.test/x", &["/z"])
        .page("https://a.test/z", &[])
        .page("https://b.test/y", &[]);
    let fetcher = Arc::new(site);

    let mut spec = spec(&["https://a.test/"]);
    spec.limits.max_depth = Some(1);
    spec.limits.max_pages = Some(10);
    spec.request.concurrency = 2;

    let (outcome, results) = run_job(spec, fetcher.clone()).await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(results.len(), 2);

    let by_url: HashMap<_, _> = results.iter().map(|r| (r.url.as_str(), r)).collect();
    assert_eq!(by_url["https://a.test/"].depth, 0);
    assert_eq!(by_url["https://a.test/x"].depth, 1);
    assert!(by_url["https://a.test/"].is_success());
    assert_eq!(by_url["https://a.test/"].title.as_deref(), Some("https://a.test/"));

    assert!(!fetcher.fetched().iter().any(|u| u.contains("b.test")));
    assert_eq!(outcome.stats.pages_fetched, 2);
}

#[tokio::test]
async fn test_cross_domain_when_allowed() {
    let site = SiteFetcher::new()
        .page("https://a.test/", &["https://b.test/y"])
        .page("https://b.test/y", &[]);

    let mut spec = spec(&["https://a.test/"]);
    spec.same_domain_only = false;

    let (outcome, results) = run_job(spec, Arc::new(site)).await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert!(urls(&results).contains("https://b.test/y"));
}

#[tokio::test]
async fn test_deny_everything_yields_no_results() {
    let fetcher = Arc::new(dense_site(3));
    let mut spec = spec(&["https://a.test/"]);
    spec.scope.rules.push(ScopeRule::deny(".*"));

    let (outcome, results) = run_job(spec, fetcher.clone()).await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert!(results.is_empty());
    assert!(fetcher.fetched().is_empty());
    assert_eq!(outcome.stats.urls_seen, 0);
}

#[tokio::test]
async fn test_scope_denied_seed_is_excluded() {
    let site = SiteFetcher::new()
        .page("https://a.test/", &[])
        .page("https://a.test/private/", &[]);

    let mut spec = spec(&["https://a.test/", "https://a.test/private/"]);
    spec.scope.rules.push(ScopeRule::deny("/private"));

    let (_, results) = run_job(spec, Arc::new(site)).await;

    assert_eq!(urls(&results), HashSet::from(["https://a.test/".to_string()]));
}

#[tokio::test]
async fn test_allow_rules_restrict_links() {
    let site = SiteFetcher::new()
        .page("https://a.test/docs/", &["/docs/a", "/blog/b"])
        .page("https://a.test/docs/a", &[])
        .page("https://a.test/blog/b", &[]);

    let mut spec = spec(&["https://a.test/docs/"]);
    spec.scope.rules.push(ScopeRule::allow("^https://a\\.test/docs/"));
    spec.scope.rules.push(ScopeRule::allow("(broken"));

    let (_, results) = run_job(spec, Arc::new(site)).await;

    assert_eq!(
        urls(&results),
        HashSet::from([
            "https://a.test/docs/".to_string(),
            "https://a.test/docs/a".to_string()
        ])
    );
}

#[tokio::test]
async fn test_link_depth_is_parent_depth_plus_one() {
    let site = SiteFetcher::new()
        .page("https://a.test/", &["/a", "/b"])
        .page("https://a.test/a", &["/c", "/"])
        .page("https://a.test/b", &["/c", "/d"])
        .page("https://a.test/c", &["/e"])
        .page("https://a.test/d", &["/e"])
        .page("https://a.test/e", &["/f"])
        .page("https://a.test/f", &[]);

    let mut spec = spec(&["https://a.test/"]);
    spec.limits.max_depth = Some(3);
    spec.request.concurrency = 3;

    let (_, results) = run_job(spec, Arc::new(site)).await;

    for result in results.iter().filter(|r| r.depth > 0) {
        let has_parent = results
            .iter()
            .any(|p| p.depth + 1 == result.depth && p.links.contains(&result.url));
        assert!(has_parent, "{} at depth {} has no parent", result.url, result.depth);
    }
    assert!(results.iter().all(|r| r.depth <= 3));
    assert!(!urls(&results).contains("https://a.test/f"));
}

#[tokio::test]
async fn test_sequential_crawl_is_breadth_first() {
    let site = SiteFetcher::new()
        .page("https://a.test/", &["/a", "/b"])
        .page("https://a.test/a", &["/a1"])
        .page("https://a.test/b", &["/b1"])
        .page("https://a.test/a1", &[])
        .page("https://a.test/b1", &[]);
    let fetcher = Arc::new(site);

    let mut spec = spec(&["https://a.test/"]);
    spec.request.concurrency = 1;

    run_job(spec, fetcher.clone()).await;

    assert_eq!(
        fetcher.fetched(),
        vec![
            "https://a.test/",
            "https://a.test/a",
            "https://a.test/b",
            "https://a.test/a1",
            "https://a.test/b1",
        ]
    );
}

// ===== Limits =====

#[tokio::test]
async fn test_max_pages_bounds_results() {
    let fetcher = Arc::new(dense_site(20));
    let mut spec = spec(&["https://a.test/"]);
    spec.limits.max_pages = Some(5);
    spec.request.concurrency = 4;

    let (outcome, results) = run_job(spec, fetcher.clone()).await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(results.len(), 5);
    assert_eq!(fetcher.fetched().len(), 5);
    assert!(outcome.stats.urls_seen >= outcome.stats.pages_fetched);
}

#[tokio::test]
async fn test_no_url_fetched_twice() {
    let fetcher = Arc::new(dense_site(12).with_delay(Duration::from_millis(2)));
    let mut spec = spec(&["https://a.test/", "https://a.test/#dup"]);
    spec.request.concurrency = 6;

    let (outcome, results) = run_job(spec, fetcher.clone()).await;

    let fetched = fetcher.fetched();
    let unique: HashSet<_> = fetched.iter().collect();
    assert_eq!(fetched.len(), unique.len());
    assert_eq!(results.len(), 13);
    assert_eq!(outcome.stats.urls_seen, 13);
    assert_eq!(outcome.stats.pages_fetched, 13);
}

#[tokio::test]
async fn test_in_flight_fetches_bounded_by_concurrency() {
    let fetcher = Arc::new(dense_site(20).with_delay(Duration::from_millis(20)));
    let mut spec = spec(&["https://a.test/"]);
    spec.request.concurrency = 3;

    let (outcome, results) = run_job(spec, fetcher.clone()).await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(results.len(), 21);
    assert!(fetcher.peak_in_flight() <= 3);
    assert_eq!(fetcher.peak_in_flight(), 3);
}

#[tokio::test]
async fn test_sequential_job_never_overlaps_fetches() {
    let fetcher = Arc::new(dense_site(6).with_delay(Duration::from_millis(5)));
    let mut spec = spec(&["https://a.test/"]);
    spec.request.concurrency = 1;

    run_job(spec, fetcher.clone()).await;

    assert_eq!(fetcher.peak_in_flight(), 1);
}

#[tokio::test]
async fn test_expired_duration_stops_early() {
    let fetcher = Arc::new(dense_site(10).with_delay(Duration::from_millis(5)));
    let mut spec = spec(&["https://a.test/"]);
    spec.limits.max_duration_seconds = Some(0);

    let (outcome, results) = run_job(spec, fetcher).await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert!(results.len() <= 1);
}

// ===== Failures =====

#[tokio::test]
async fn test_page_failures_do_not_fail_job() {
    let site = SiteFetcher::new()
        .page("https://a.test/", &["/missing", "/ok"])
        .page("https://a.test/ok", &[]);

    let (outcome, results) = run_job(spec(&["https://a.test/"]), Arc::new(site)).await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.stats.pages_fetched, 2);
    assert_eq!(outcome.stats.pages_failed, 1);

    let missing = results
        .iter()
        .find(|r| r.url == "https://a.test/missing")
        .unwrap();
    assert!(!missing.is_success());
    assert_eq!(missing.status_code, 404);
    assert!(missing.html.is_none());
    assert!(missing.error.as_deref().unwrap().contains("404"));
}

#[tokio::test]
async fn test_fetcher_unreachable_at_startup_fails_job() {
    let mut site = SiteFetcher::new().page("https://a.test/", &[]);
    site.fail_startup = true;
    let fetcher = Arc::new(site);
    let store = Arc::new(MemoryStore::new());

    let outcome = JobController::new(
        "job-1",
        spec(&["https://a.test/"]),
        fetcher.clone(),
        store.clone(),
        CancellationToken::new(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(outcome.status, JobStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().contains("connection refused"));
    assert!(fetcher.fetched().is_empty());

    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.is_some());
    assert!(job.stats.is_some());
}

// ===== Robots =====

#[tokio::test]
async fn test_unreachable_robots_still_crawls() {
    let fetcher = Arc::new(dense_site(3));
    let mut spec = spec(&["https://a.test/"]);
    spec.request.respect_robots = true;

    let outcome = JobController::new(
        "job-1",
        spec,
        fetcher,
        Arc::new(MemoryStore::new()),
        CancellationToken::new(),
    )
    .with_robots_source(Arc::new(UnreachableRobots))
    .run()
    .await
    .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert!(outcome.stats.pages_fetched > 0);
}

#[tokio::test]
async fn test_robots_denial_releases_page_slot() {
    let site = SiteFetcher::new()
        .page("https://a.test/", &["/private", "/ok"])
        .page("https://a.test/private", &[])
        .page("https://a.test/ok", &[]);
    let fetcher = Arc::new(site);
    let store = Arc::new(MemoryStore::new());

    let mut spec = spec(&["https://a.test/"]);
    spec.request.respect_robots = true;
    spec.request.concurrency = 1;
    spec.limits.max_pages = Some(2);

    let outcome = JobController::new(
        "job-1",
        spec,
        fetcher.clone(),
        store.clone(),
        CancellationToken::new(),
    )
    .with_robots_source(Arc::new(StaticRobots("User-agent: *\nDisallow: /private")))
    .run()
    .await
    .unwrap();

    let results = store.results("job-1");
    assert_eq!(
        urls(&results),
        HashSet::from(["https://a.test/".to_string(), "https://a.test/ok".to_string()])
    );
    assert!(!fetcher.fetched().contains(&"https://a.test/private".to_string()));
    assert_eq!(outcome.stats.urls_seen, 3);
}

#[tokio::test]
async fn test_crawl_delay_does_not_outlast_duration_limit() {
    let fetcher = Arc::new(dense_site(3));
    let mut spec = spec(&["https://a.test/"]);
    spec.request.respect_robots = true;
    spec.limits.max_duration_seconds = Some(1);

    let controller = JobController::new(
        "job-1",
        spec,
        fetcher.clone(),
        Arc::new(MemoryStore::new()),
        CancellationToken::new(),
    )
    .with_robots_source(Arc::new(StaticRobots("User-agent: *\nCrawl-delay: 30")));

    let clock = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(5), controller.run())
        .await
        .expect("job outlived its duration limit")
        .unwrap();

    assert!(clock.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.status, JobStatus::Completed);
    assert!(fetcher.fetched().is_empty());
}

// ===== Cancellation =====

#[tokio::test]
async fn test_cancel_after_first_result() {
    let chain: Vec<String> = (0..10).map(|i| format!("https://a.test/{}", i)).collect();
    let mut site = SiteFetcher::new().with_delay(Duration::from_millis(10));
    for (i, url) in chain.iter().enumerate() {
        let next: Vec<&str> = chain.get(i + 1).map(String::as_str).into_iter().collect();
        site = site.page(url, &next);
    }

    let cancel = CancellationToken::new();
    let store = Arc::new(CancelAfterFirstResult {
        inner: MemoryStore::new(),
        cancel: cancel.clone(),
        trigger: None,
    });

    let mut spec = spec(&["https://a.test/0"]);
    spec.request.concurrency = 1;

    let outcome = JobController::new("job-1", spec, Arc::new(site), store.clone(), cancel)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Cancelled);
    assert!(outcome.stats.pages_fetched >= 1);
    assert!(outcome.stats.pages_fetched < 10);

    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.stats, Some(outcome.stats.clone()));
}

#[tokio::test]
async fn test_cancel_while_draining_after_duration_limit() {
    let site = SiteFetcher::new()
        .page("https://a.test/fast", &[])
        .page("https://a.test/slow", &[])
        .slow_page("https://a.test/fast", Duration::from_millis(1200))
        .slow_page("https://a.test/slow", Duration::from_millis(2000));

    let cancel = CancellationToken::new();
    let store = Arc::new(CancelAfterFirstResult {
        inner: MemoryStore::new(),
        cancel: cancel.clone(),
        trigger: Some("https://a.test/slow".to_string()),
    });

    let mut spec = spec(&["https://a.test/slow", "https://a.test/fast"]);
    spec.request.concurrency = 2;
    spec.limits.max_duration_seconds = Some(1);

    let outcome = JobController::new("job-1", spec, Arc::new(site), store.clone(), cancel.clone())
        .run()
        .await
        .unwrap();

    // The loop stopped on the duration limit; the cancel fired during the drain
    assert!(cancel.is_cancelled());
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.stats.pages_fetched, 2);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let fetcher = Arc::new(dense_site(3));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = JobController::new(
        "job-1",
        spec(&["https://a.test/"]),
        fetcher.clone(),
        Arc::new(MemoryStore::new()),
        cancel,
    )
    .run()
    .await
    .unwrap();

    assert_eq!(outcome.status, JobStatus::Cancelled);
    assert!(fetcher.fetched().is_empty());
}

// ===== Progress =====

#[tokio::test]
async fn test_progress_matches_outcome() {
    let fetcher = Arc::new(dense_site(4));
    let controller = JobController::new(
        "job-1",
        spec(&["https://a.test/"]),
        fetcher,
        Arc::new(MemoryStore::new()),
        CancellationToken::new(),
    );
    let progress = controller.progress();
    assert_eq!(progress.snapshot(), JobStats::default());

    let outcome = controller.run().await.unwrap();
    let live = progress.snapshot();

    assert_eq!(live.pages_fetched, outcome.stats.pages_fetched);
    assert_eq!(live.urls_seen, outcome.stats.urls_seen);
    assert_eq!(progress.queued(), 0);
}

// ===== Queued jobs =====

#[tokio::test]
async fn test_next_queued_runs_oldest_job() {
    let store = Arc::new(MemoryStore::new());
    let mut older = JobRecord::queued("older", &spec(&["https://a.test/"])).unwrap();
    older.created_at = older.created_at - chrono::Duration::seconds(5);
    let newer = JobRecord::queued("newer", &spec(&["https://a.test/x"])).unwrap();
    store.create_job(&newer).await.unwrap();
    store.create_job(&older).await.unwrap();

    let site = Arc::new(
        SiteFetcher::new()
            .page("https://a.test/", &[])
            .page("https://a.test/x", &[]),
    );
    let mut agents = Vec::new();

    for expected in ["older", "newer"] {
        let controller = JobController::next_queued(store.clone(), CancellationToken::new(), |spec| {
            agents.push(spec.request.user_agent.clone());
            let fetcher: Arc<dyn PageFetcher> = site.clone();
            Ok(fetcher)
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(controller.job_id(), expected);

        let outcome = controller.run().await.unwrap();
        assert_eq!(outcome.status, JobStatus::Completed);
    }

    let none = JobController::next_queued(store.clone(), CancellationToken::new(), |_| {
        let fetcher: Arc<dyn PageFetcher> = site.clone();
        Ok(fetcher)
    })
    .await
    .unwrap();
    assert!(none.is_none());

    assert_eq!(agents, vec!["TestBot/1.0", "TestBot/1.0"]);
    assert_eq!(store.results("older")[0].url, "https://a.test/");
    assert_eq!(store.results("newer")[0].url, "https://a.test/x");
}

#[tokio::test]
async fn test_next_queued_surfaces_fetcher_errors() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_job(&JobRecord::queued("job-1", &spec(&["https://a.test/"])).unwrap())
        .await
        .unwrap();

    let result = JobController::next_queued(store.clone(), CancellationToken::new(), |_| {
        Err(FetchError::Unreachable("no network".to_string()).into())
    })
    .await;

    assert!(matches!(result, Err(CrawlError::Fetch(_))));
    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
}

// ===== End to end over HTTP =====

#[tokio::test]
async fn test_http_crawl_into_sqlite() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /secret"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><head><title>Home</title></head><body>
                    <h2 class="headline">Welcome</h2>
                    <a href="/a">A</a> <a href="/b">B</a> <a href="/secret">S</a>
                    <a href="mailto:me@example.com">mail</a>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><head><title>A</title></head><body><a href="/">home</a></body></html>"#)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>secret</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::new(&dir.path().join("crawl.db")).unwrap());

    let seed = format!("{}/", base);
    let mut spec = spec(&[seed.as_str()]);
    spec.request.respect_robots = true;
    spec.request.concurrency = 2;
    spec.extraction.selectors.push(SelectorSpec {
        name: "headline".to_string(),
        selector: "h2.headline".to_string(),
        attr: None,
    });

    let record = JobRecord::queued("http-job", &spec).unwrap();
    store.create_job(&record).await.unwrap();

    let fetcher = Arc::new(PooledHttpFetcher::new("TestBot/1.0").unwrap());
    let outcome = JobController::new("http-job", spec, fetcher, store.clone(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.stats.pages_fetched, 2);
    assert_eq!(outcome.stats.pages_failed, 1);

    let results = store.list_results("http-job", 100, 0).await.unwrap();
    let by_path: HashMap<_, _> = results
        .iter()
        .map(|r| (Url::parse(&r.url).unwrap().path().to_string(), r))
        .collect();

    assert_eq!(by_path.len(), 3);
    assert!(!by_path.contains_key("/secret"));

    let home = by_path["/"];
    assert_eq!(home.status_code, 200);
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.extracted["headline"], vec!["Welcome"]);
    assert_eq!(home.links.len(), 3);
    assert!(home.markdown.as_deref().unwrap().contains("Welcome"));

    let failed = by_path["/b"];
    assert_eq!(failed.status_code, 500);
    assert_eq!(failed.depth, 1);
    assert!(!failed.is_success());

    let job = store.get_job("http-job").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stats.unwrap().pages_fetched, 2);

    let mut buf = Vec::new();
    let written = write_results_ndjson(store.as_ref(), "http-job", &mut buf)
        .await
        .unwrap();
    assert_eq!(written, 3);
    assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 3);
}

#[tokio::test]
async fn test_one_shot_fetcher_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<a href="/next">next</a>"#)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>done</p>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let seed = format!("{}/", base);
    let store = Arc::new(MemoryStore::new());
    let outcome = JobController::new(
        "one-shot",
        spec(&[seed.as_str()]),
        Arc::new(OneShotHttpFetcher::new("TestBot/1.0")),
        store.clone(),
        CancellationToken::new(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(store.results("one-shot").len(), 2);
}
