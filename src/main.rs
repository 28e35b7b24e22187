//! Scopecrawl main entry point
//!
//! This is the command-line interface for running and inspecting crawl jobs.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use scopecrawl::config::{load_spec_with_hash, CrawlSpec};
use scopecrawl::crawler::{JobController, JobOutcome, PageFetcher, PooledHttpFetcher};
use scopecrawl::output::{load_job_report, print_job_report, write_results_ndjson};
use scopecrawl::storage::{open_store, JobRecord, ResultsStore, SqliteStore};
use scopecrawl::{CancellationToken, JobStatus, ScopeEvaluator};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Scopecrawl: a scoped, polite breadth-first crawler
///
/// Runs crawl jobs described by a JSON (or TOML) spec, stores one result per
/// attempted page in SQLite, and reports on or exports stored jobs.
#[derive(Parser, Debug)]
#[command(name = "scopecrawl")]
#[command(version)]
#[command(about = "A scoped, polite breadth-first crawler", long_about = None)]
struct Cli {
    /// Path to the SQLite results database
    #[arg(long, global = true, default_value = "scopecrawl.db")]
    database: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a job from a spec and run it (Ctrl-C cancels)
    Run {
        #[arg(value_name = "SPEC")]
        spec: PathBuf,

        /// Seconds between progress log lines (0 disables)
        #[arg(long, default_value_t = 10)]
        progress_interval: u64,
    },

    /// Record a job from a spec without running it; prints the job ID
    Submit {
        #[arg(value_name = "SPEC")]
        spec: PathBuf,
    },

    /// Run queued jobs, oldest first, until none are left
    Work {
        /// Seconds between progress log lines (0 disables)
        #[arg(long, default_value_t = 10)]
        progress_interval: u64,
    },

    /// Validate a spec and show what would be crawled
    DryRun {
        #[arg(value_name = "SPEC")]
        spec: PathBuf,
    },

    /// Show status and statistics of a stored job
    Stats {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },

    /// Write a job's results to stdout as NDJSON
    Export {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Run {
            spec,
            progress_interval,
        } => handle_run(&cli.database, &spec, progress_interval).await,
        Command::Submit { spec } => handle_submit(&cli.database, &spec).await,
        Command::Work { progress_interval } => {
            handle_work(&cli.database, progress_interval).await
        }
        Command::DryRun { spec } => handle_dry_run(&spec),
        Command::Stats { job_id } => handle_stats(&cli.database, &job_id).await,
        Command::Export { job_id } => handle_export(&cli.database, &job_id).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("scopecrawl=info,warn"),
            1 => EnvFilter::new("scopecrawl=debug,info"),
            2 => EnvFilter::new("scopecrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so `export` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_database(path: &Path) -> anyhow::Result<SqliteStore> {
    open_store(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles `run`: records a new job, runs it, prints its report
async fn handle_run(
    database: &Path,
    spec_path: &Path,
    progress_interval: u64,
) -> anyhow::Result<()> {
    let store: Arc<dyn ResultsStore> = Arc::new(open_database(database)?);
    let (job_id, spec) = submit_job(store.as_ref(), spec_path).await?;

    let fetcher = Arc::new(PooledHttpFetcher::new(&spec.request.user_agent)?);
    let cancel = cancel_on_ctrl_c();
    let controller = JobController::new(
        job_id,
        spec,
        fetcher,
        Arc::clone(&store),
        cancel.clone(),
    );

    let outcome = drive_job(controller, store.as_ref(), &cancel, progress_interval).await?;
    if outcome.status == JobStatus::Failed {
        bail!(
            "Job {} failed: {}",
            outcome.job_id,
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    Ok(())
}

/// Handles `submit`: records a queued job and prints its ID
async fn handle_submit(database: &Path, spec_path: &Path) -> anyhow::Result<()> {
    let store = open_database(database)?;
    let (job_id, _) = submit_job(&store, spec_path).await?;
    println!("{}", job_id);
    Ok(())
}

/// Handles `work`: runs queued jobs oldest first until none are left
async fn handle_work(database: &Path, progress_interval: u64) -> anyhow::Result<()> {
    let store: Arc<dyn ResultsStore> = Arc::new(open_database(database)?);
    let cancel = cancel_on_ctrl_c();
    let mut processed = HashSet::new();

    while !cancel.is_cancelled() {
        let next = JobController::next_queued(Arc::clone(&store), cancel.clone(), |spec| {
            let fetcher: Arc<dyn PageFetcher> =
                Arc::new(PooledHttpFetcher::new(&spec.request.user_agent)?);
            Ok(fetcher)
        })
        .await?;

        let Some(controller) = next else {
            tracing::info!("No queued jobs left");
            break;
        };

        // A job whose status could not be written stays queued
        if !processed.insert(controller.job_id().to_string()) {
            bail!("Job {} is still queued after running", controller.job_id());
        }

        drive_job(controller, store.as_ref(), &cancel, progress_interval).await?;
    }

    Ok(())
}

/// Loads a spec and records it as a new queued job
async fn submit_job(
    store: &dyn ResultsStore,
    spec_path: &Path,
) -> anyhow::Result<(String, CrawlSpec)> {
    let (spec, spec_hash) = load_spec_with_hash(spec_path)
        .with_context(|| format!("Failed to load spec {}", spec_path.display()))?;
    tracing::info!("Spec loaded (hash: {})", spec_hash);

    let job_id = uuid::Uuid::new_v4().to_string();
    let record = JobRecord::queued(job_id.clone(), &spec)?;
    store.create_job(&record).await?;
    tracing::info!("Created job {}", job_id);

    Ok((job_id, spec))
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            token.cancel();
        }
    });

    cancel
}

/// Runs one job with periodic progress logging and prints its report
async fn drive_job(
    controller: JobController,
    store: &dyn ResultsStore,
    cancel: &CancellationToken,
    progress_interval: u64,
) -> anyhow::Result<JobOutcome> {
    let reporter = (progress_interval > 0).then(|| {
        let progress = controller.progress();
        let done = cancel.child_token();
        let handle = tokio::spawn({
            let done = done.clone();
            async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(progress_interval));
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let stats = progress.snapshot();
                            tracing::info!(
                                "Progress: {} fetched, {} failed, {} seen, {} queued",
                                stats.pages_fetched,
                                stats.pages_failed,
                                stats.urls_seen,
                                progress.queued()
                            );
                        }
                        _ = done.cancelled() => break,
                    }
                }
            }
        });
        (done, handle)
    });

    let outcome = controller.run().await?;

    if let Some((done, handle)) = reporter {
        done.cancel();
        let _ = handle.await;
    }

    let report = load_job_report(store, &outcome.job_id).await?;
    print_job_report(&report);

    Ok(outcome)
}

/// Handles `dry-run`: validates the spec and shows what would be crawled
fn handle_dry_run(spec_path: &Path) -> anyhow::Result<()> {
    let (spec, spec_hash) = load_spec_with_hash(spec_path)
        .with_context(|| format!("Failed to load spec {}", spec_path.display()))?;

    print_plan(&spec, &spec_hash);
    Ok(())
}

fn print_plan(spec: &CrawlSpec, spec_hash: &str) {
    let scope = ScopeEvaluator::compile(&spec.scope.rules);
    let limit = |value: Option<String>| value.unwrap_or_else(|| "unlimited".to_string());

    println!("=== Scopecrawl Dry Run ===\n");
    println!("Spec hash: {}\n", spec_hash);

    println!("Seeds ({}):", spec.seeds.len());
    for seed in &spec.seeds {
        let verdict = if scope.in_scope(seed) { "in scope" } else { "excluded by scope" };
        println!("  - {} ({})", seed, verdict);
    }

    println!("\nScope:");
    println!("  Same domain only: {}", spec.same_domain_only);
    println!(
        "  Rules: {} ({} compiled)",
        spec.scope.rules.len(),
        scope.rule_count()
    );

    println!("\nLimits:");
    println!("  Max depth: {}", limit(spec.limits.max_depth.map(|v| v.to_string())));
    println!("  Max pages: {}", limit(spec.limits.max_pages.map(|v| v.to_string())));
    println!(
        "  Max duration: {}",
        limit(spec.limits.max_duration_seconds.map(|v| format!("{}s", v)))
    );

    println!("\nRequests:");
    println!("  Concurrency: {}", spec.request.concurrency);
    println!("  Delay: {}ms", spec.request.delay_ms);
    println!("  User agent: {}", spec.request.user_agent);
    println!("  Respect robots.txt: {}", spec.request.respect_robots);

    if !spec.extraction.selectors.is_empty() {
        println!("\nSelectors ({}):", spec.extraction.selectors.len());
        for selector in &spec.extraction.selectors {
            match &selector.attr {
                Some(attr) => println!("  - {}: {} @{}", selector.name, selector.selector, attr),
                None => println!("  - {}: {}", selector.name, selector.selector),
            }
        }
    }

    println!("\n✓ Spec is valid");
}

/// Handles `stats`: shows a stored job's report
async fn handle_stats(database: &Path, job_id: &str) -> anyhow::Result<()> {
    let store = open_database(database)?;
    let report = load_job_report(&store, job_id).await?;
    print_job_report(&report);
    Ok(())
}

/// Handles `export`: streams a stored job's results as NDJSON
async fn handle_export(database: &Path, job_id: &str) -> anyhow::Result<()> {
    let store = open_database(database)?;

    if store.get_job(job_id).await?.is_none() {
        bail!("Job not found: {}", job_id);
    }

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    let written = write_results_ndjson(&store, job_id, &mut out).await?;
    tracing::info!("Exported {} results", written);
    Ok(())
}
