//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ResultsStore
//! trait. A single connection is shared behind a mutex. Statements run on the
//! blocking thread pool so page tasks never stall a runtime worker on disk I/O.

use crate::crawler::{PageOutcome, PageResult};
use crate::state::{JobStats, JobStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobRecord, ResultsStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite results store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates a results database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking thread pool
    async fn blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Database(format!("storage task failed: {}", e)))?
    }
}

/// Job row as stored, before text columns are decoded
struct JobRow {
    id: String,
    created_at: String,
    status: String,
    spec_json: String,
    spec_hash: String,
    error: Option<String>,
    stats_json: Option<String>,
}

impl JobRow {
    const COLUMNS: &'static str =
        "id, created_at, status, spec_json, spec_hash, error, stats_json";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            status: row.get(2)?,
            spec_json: row.get(3)?,
            spec_hash: row.get(4)?,
            error: row.get(5)?,
            stats_json: row.get(6)?,
        })
    }

    fn into_record(self) -> StorageResult<JobRecord> {
        let status = JobStatus::from_db_string(&self.status)
            .ok_or_else(|| StorageError::Database(format!("unknown job status '{}'", self.status)))?;

        let stats = match self.stats_json {
            Some(json) => Some(serde_json::from_str::<JobStats>(&json)?),
            None => None,
        };

        Ok(JobRecord {
            id: self.id,
            created_at: parse_timestamp(&self.created_at)?,
            status,
            spec_json: self.spec_json,
            spec_hash: self.spec_hash,
            error: self.error,
            stats,
        })
    }
}

/// Result row as stored, before JSON columns are decoded
struct ResultRow {
    url: String,
    outcome: String,
    status_code: i64,
    depth: i64,
    fetched_at: String,
    content_type: Option<String>,
    title: Option<String>,
    text: Option<String>,
    html: Option<String>,
    markdown: Option<String>,
    links_json: String,
    extracted_json: String,
    error: Option<String>,
}

impl ResultRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            outcome: row.get(1)?,
            status_code: row.get(2)?,
            depth: row.get(3)?,
            fetched_at: row.get(4)?,
            content_type: row.get(5)?,
            title: row.get(6)?,
            text: row.get(7)?,
            html: row.get(8)?,
            markdown: row.get(9)?,
            links_json: row.get(10)?,
            extracted_json: row.get(11)?,
            error: row.get(12)?,
        })
    }

    fn into_result(self) -> StorageResult<PageResult> {
        let outcome = PageOutcome::from_db_string(&self.outcome).ok_or_else(|| {
            StorageError::Database(format!("unknown page outcome '{}'", self.outcome))
        })?;

        Ok(PageResult {
            url: self.url,
            outcome,
            status_code: u16::try_from(self.status_code).unwrap_or_default(),
            depth: u32::try_from(self.depth).unwrap_or_default(),
            fetched_at: parse_timestamp(&self.fetched_at)?,
            content_type: self.content_type,
            title: self.title,
            text: self.text,
            html: self.html,
            markdown: self.markdown,
            links: serde_json::from_str(&self.links_json)?,
            extracted: serde_json::from_str(&self.extracted_json)?,
            error: self.error,
        })
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Database(format!("bad timestamp '{}': {}", value, e)))
}

#[async_trait]
impl ResultsStore for SqliteStore {
    // ===== Job Management =====

    async fn create_job(&self, job: &JobRecord) -> StorageResult<()> {
        let stats_json = job.stats.as_ref().map(serde_json::to_string).transpose()?;
        let job = job.clone();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO jobs (id, created_at, status, spec_json, spec_hash, error, stats_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    job.id,
                    job.created_at.to_rfc3339(),
                    job.status.to_db_string(),
                    job.spec_json,
                    job.spec_hash,
                    job.error,
                    stats_json,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let job_id = job_id.to_string();
        let error = error.map(str::to_string);

        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE jobs SET status = ?1, error = ?2 WHERE id = ?3",
                params![status.to_db_string(), error, job_id],
            )?;

            if updated == 0 {
                return Err(StorageError::JobNotFound(job_id));
            }
            Ok(())
        })
        .await
    }

    async fn update_job_stats(&self, job_id: &str, stats: &JobStats) -> StorageResult<()> {
        let stats_json = serde_json::to_string(stats)?;
        let job_id = job_id.to_string();

        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE jobs SET stats_json = ?1 WHERE id = ?2",
                params![stats_json, job_id],
            )?;

            if updated == 0 {
                return Err(StorageError::JobNotFound(job_id));
            }
            Ok(())
        })
        .await
    }

    async fn get_job(&self, job_id: &str) -> StorageResult<Option<JobRecord>> {
        let job_id = job_id.to_string();

        let row = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs WHERE id = ?1",
                    JobRow::COLUMNS
                ))?;
                Ok(stmt.query_row(params![job_id], JobRow::from_row).optional()?)
            })
            .await?;

        row.map(JobRow::into_record).transpose()
    }

    async fn next_queued_job(&self) -> StorageResult<Option<JobRecord>> {
        let row = self
            .blocking(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs WHERE status = ?1 ORDER BY created_at ASC, rowid ASC LIMIT 1",
                    JobRow::COLUMNS
                ))?;
                Ok(stmt
                    .query_row(params![JobStatus::Queued.to_db_string()], JobRow::from_row)
                    .optional()?)
            })
            .await?;

        row.map(JobRow::into_record).transpose()
    }

    // ===== Page Results =====

    async fn append_page_result(&self, job_id: &str, result: &PageResult) -> StorageResult<()> {
        let links_json = serde_json::to_string(&result.links)?;
        let extracted_json = serde_json::to_string(&result.extracted)?;
        let job_id = job_id.to_string();
        let result = result.clone();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO results (job_id, url, outcome, status_code, depth, fetched_at,
                                      content_type, title, text, html, markdown,
                                      links_json, extracted_json, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    job_id,
                    result.url,
                    result.outcome.to_db_string(),
                    i64::from(result.status_code),
                    i64::from(result.depth),
                    result.fetched_at.to_rfc3339(),
                    result.content_type,
                    result.title,
                    result.text,
                    result.html,
                    result.markdown,
                    links_json,
                    extracted_json,
                    result.error,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_results(
        &self,
        job_id: &str,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<PageResult>> {
        let job_id = job_id.to_string();

        let rows = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT url, outcome, status_code, depth, fetched_at, content_type, title,
                            text, html, markdown, links_json, extracted_json, error
                     FROM results WHERE job_id = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt
                    .query_map(
                        params![job_id, limit as i64, offset as i64],
                        ResultRow::from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(ResultRow::into_result).collect()
    }

    async fn count_results(&self, job_id: &str) -> StorageResult<u64> {
        let job_id = job_id.to_string();

        let count: i64 = self
            .blocking(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM results WHERE job_id = ?1",
                    params![job_id],
                    |row| row.get(0),
                )?)
            })
            .await?;
        Ok(count as u64)
    }
}
