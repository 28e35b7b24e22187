//! Job report generation from a results store
//!
//! This module provides functionality for summarizing a stored job and
//! displaying the summary.

use crate::state::{JobStats, JobStatus};
use crate::storage::{JobRecord, ResultsStore, StorageError};
use crate::CrawlError;

/// Summary of one stored job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: JobRecord,

    /// Page results actually stored for the job
    pub results_stored: u64,
}

impl JobReport {
    /// Final stats, or zeroed stats for a job that has not finished
    pub fn stats(&self) -> JobStats {
        self.job.stats.clone().unwrap_or_default()
    }

    /// Share of attempted pages that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        let stats = self.stats();
        let total = stats.pages_total();
        if total == 0 {
            0.0
        } else {
            (stats.pages_fetched as f64 / total as f64) * 100.0
        }
    }
}

/// Loads the report for `job_id`
///
/// # Returns
///
/// * `Ok(JobReport)` - The job and its stored result count
/// * `Err(CrawlError::Storage)` - The job does not exist or the store failed
pub async fn load_job_report(
    store: &dyn ResultsStore,
    job_id: &str,
) -> Result<JobReport, CrawlError> {
    let job = store
        .get_job(job_id)
        .await?
        .ok_or_else(|| StorageError::JobNotFound(job_id.to_string()))?;

    let results_stored = store.count_results(job_id).await?;

    Ok(JobReport {
        job,
        results_stored,
    })
}

/// Prints a report to stdout in a formatted manner
pub fn print_job_report(report: &JobReport) {
    let job = &report.job;
    let stats = report.stats();

    println!("=== Job {} ===\n", job.id);

    println!("Overview:");
    println!("  Status: {}", job.status);
    println!("  Created: {}", job.created_at.to_rfc3339());
    println!("  Spec hash: {}", job.spec_hash);
    if let Some(error) = &job.error {
        println!("  Error: {}", error);
    }
    println!();

    if job.status.is_terminal() && job.stats.is_some() {
        println!("Pages:");
        println!("  Fetched: {}", stats.pages_fetched);
        println!("  Failed: {}", stats.pages_failed);
        println!("  URLs seen: {}", stats.urls_seen);
        println!("  Results stored: {}", report.results_stored);
        println!("  Duration: {:.1}s", stats.duration_seconds);
        println!();

        println!(
            "Success Rate: {:.1}% ({} / {} pages fetched successfully)",
            report.success_rate(),
            stats.pages_fetched,
            stats.pages_total()
        );
    } else if job.status == JobStatus::Queued {
        println!("Job has not started yet.");
    } else {
        println!("Results stored so far: {}", report.results_stored);
    }
}
