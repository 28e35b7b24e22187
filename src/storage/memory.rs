//! In-memory results store
//!
//! Keeps jobs and results in process memory. Used by tests and by embedders
//! that consume results directly instead of from a database.

use crate::crawler::PageResult;
use crate::state::{JobStats, JobStatus};
use crate::storage::traits::{JobRecord, ResultsStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    /// Jobs in creation order
    jobs: Vec<JobRecord>,
    results: HashMap<String, Vec<PageResult>>,
}

impl Inner {
    fn job_mut(&mut self, job_id: &str) -> StorageResult<&mut JobRecord> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| StorageError::JobNotFound(job_id.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every result appended for a job
    pub fn results(&self, job_id: &str) -> Vec<PageResult> {
        self.lock()
            .map(|inner| inner.results.get(job_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Database("memory store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl ResultsStore for MemoryStore {
    async fn create_job(&self, job: &JobRecord) -> StorageResult<()> {
        let mut inner = self.lock()?;
        if inner.jobs.iter().any(|j| j.id == job.id) {
            return Err(StorageError::Database(format!(
                "job '{}' already exists",
                job.id
            )));
        }
        inner.jobs.push(job.clone());
        Ok(())
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let mut inner = self.lock()?;
        let job = inner.job_mut(job_id)?;
        job.status = status;
        job.error = error.map(str::to_string);
        Ok(())
    }

    async fn update_job_stats(&self, job_id: &str, stats: &JobStats) -> StorageResult<()> {
        let mut inner = self.lock()?;
        inner.job_mut(job_id)?.stats = Some(stats.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> StorageResult<Option<JobRecord>> {
        let inner = self.lock()?;
        Ok(inner.jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn next_queued_job(&self) -> StorageResult<Option<JobRecord>> {
        let inner = self.lock()?;
        Ok(inner
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Queued)
            .min_by_key(|j| j.created_at)
            .cloned())
    }

    async fn append_page_result(&self, job_id: &str, result: &PageResult) -> StorageResult<()> {
        let mut inner = self.lock()?;
        inner.job_mut(job_id)?;
        inner
            .results
            .entry(job_id.to_string())
            .or_default()
            .push(result.clone());
        Ok(())
    }

    async fn list_results(
        &self,
        job_id: &str,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<PageResult>> {
        let inner = self.lock()?;
        Ok(inner
            .results
            .get(job_id)
            .map(|results| results.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn count_results(&self, job_id: &str) -> StorageResult<u64> {
        let inner = self.lock()?;
        Ok(inner.results.get(job_id).map_or(0, |r| r.len() as u64))
    }
}
