//! Scopecrawl: a scoped, polite breadth-first crawl orchestrator
//!
//! This crate runs crawl jobs described by a [`CrawlSpec`]: starting from seed
//! URLs it walks reachable pages breadth-first, restricted by allow/deny
//! patterns, same-origin rules, depth/page/duration limits and robots.txt,
//! and persists one [`PageResult`](crawler::PageResult) per attempted URL.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("State error: {0}")]
    State(#[from] state::StateError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crawl spec loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read crawl spec: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in crawl spec: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use config::CrawlSpec;
pub use crawler::{JobController, JobOutcome, PageOutcome, PageResult};
pub use state::{JobState, JobStats, JobStatus, StateError};
pub use storage::{MemoryStore, ResultsStore, SqliteStore};
pub use tokio_util::sync::CancellationToken;
pub use url::{normalize_url, ScopeEvaluator};
