//! Storage traits and error types
//!
//! This module defines the results-store contract the job controller relies
//! on and the records it exchanges.

use crate::config::{compute_spec_hash, CrawlSpec};
use crate::crawler::PageResult;
use crate::state::{JobStats, JobStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid spec: {0}")]
    Spec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A persisted crawl job
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,

    /// The job's spec as submitted, serialized to JSON
    pub spec_json: String,

    /// SHA-256 of `spec_json`
    pub spec_hash: String,

    /// Setup error text for failed jobs
    pub error: Option<String>,

    /// Set once the job reaches a terminal state
    pub stats: Option<JobStats>,
}

impl JobRecord {
    /// Creates a queued job record for `spec`
    pub fn queued(id: impl Into<String>, spec: &CrawlSpec) -> StorageResult<Self> {
        let spec_json = serde_json::to_string(spec)?;
        let spec_hash = compute_spec_hash(spec).map_err(|e| StorageError::Spec(e.to_string()))?;

        Ok(Self {
            id: id.into(),
            created_at: Utc::now(),
            status: JobStatus::Queued,
            spec_json,
            spec_hash,
            error: None,
            stats: None,
        })
    }

    /// Deserializes the stored spec
    pub fn spec(&self) -> StorageResult<CrawlSpec> {
        Ok(serde_json::from_str(&self.spec_json)?)
    }
}

/// Trait for results store implementations
///
/// Page results are append-only with at-least-once semantics: the store does
/// not deduplicate. Implementations must be safe to share between the
/// controller and its page tasks.
#[async_trait]
pub trait ResultsStore: Send + Sync {
    // ===== Job Management =====

    /// Persists a new job record
    async fn create_job(&self, job: &JobRecord) -> StorageResult<()>;

    /// Updates a job's status, replacing its error text
    ///
    /// # Arguments
    ///
    /// * `job_id` - The job to update
    /// * `status` - The new status
    /// * `error` - Setup error text, only meaningful for failed jobs
    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Records final aggregate statistics for a job
    async fn update_job_stats(&self, job_id: &str, stats: &JobStats) -> StorageResult<()>;

    /// Gets a job by ID
    async fn get_job(&self, job_id: &str) -> StorageResult<Option<JobRecord>>;

    /// Gets the oldest job still waiting to run
    async fn next_queued_job(&self) -> StorageResult<Option<JobRecord>>;

    // ===== Page Results =====

    /// Appends one page result to a job
    async fn append_page_result(&self, job_id: &str, result: &PageResult) -> StorageResult<()>;

    /// Lists a job's page results in insertion order
    async fn list_results(
        &self,
        job_id: &str,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<PageResult>>;

    /// Counts a job's page results
    async fn count_results(&self, job_id: &str) -> StorageResult<u64>;
}
