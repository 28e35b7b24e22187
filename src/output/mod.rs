//! Output module for reporting on and exporting stored jobs
//!
//! This module handles:
//! - Summarizing a job's status and statistics
//! - Exporting a job's page results as newline-delimited JSON

pub mod stats;

pub use stats::{load_job_report, print_job_report, JobReport};

use crate::storage::ResultsStore;
use crate::CrawlError;
use std::io::Write;

/// Results fetched from the store per page of an export
pub const EXPORT_PAGE_SIZE: usize = 100;

/// Writes every stored result of a job as one JSON object per line
///
/// # Arguments
///
/// * `store` - The results store to read from
/// * `job_id` - The job to export
/// * `out` - Destination writer
///
/// # Returns
///
/// The number of results written
pub async fn write_results_ndjson<W: Write>(
    store: &dyn ResultsStore,
    job_id: &str,
    out: &mut W,
) -> Result<u64, CrawlError> {
    let mut offset = 0;
    let mut written = 0u64;

    loop {
        let page = store.list_results(job_id, EXPORT_PAGE_SIZE, offset).await?;
        if page.is_empty() {
            break;
        }

        for result in &page {
            serde_json::to_writer(&mut *out, result)?;
            out.write_all(b"\n")?;
            written += 1;
        }

        offset += page.len();
    }

    out.flush()?;
    Ok(written)
}
