//! Crawler module for scoped breadth-first crawling
//!
//! This module contains the core crawling logic, including:
//! - The page fetch collaborator seam and its HTTP implementations
//! - HTML processing into per-page results
//! - The breadth-first frontier and seen-set
//! - Bounded concurrent dispatch of page tasks
//! - Job orchestration from queued to a terminal state

mod controller;
mod dispatcher;
mod fetcher;
mod frontier;
mod parser;
mod result;

pub use controller::{JobController, JobOutcome};
pub use dispatcher::{PageCounters, ProgressHandle};
pub use fetcher::{
    build_http_client, FetchError, FetchOutcome, FetchedPage, OneShotHttpFetcher, PageFetcher,
    PooledHttpFetcher,
};
pub use frontier::{Admission, Frontier, FrontierEntry, FrontierHandle};
pub use parser::{parse_html, process_page, ParsedPage, SelectorSet};
pub use result::{PageOutcome, PageResult, SYNTHETIC_FAILURE_STATUS};
