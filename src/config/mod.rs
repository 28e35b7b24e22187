//! Crawl spec module
//!
//! This module handles loading, parsing, and validating crawl job specs.
//! Specs are JSON documents (TOML is accepted by file extension).
//!
//! # Example
//!
//! ```no_run
//! use scopecrawl::config::load_spec;
//! use std::path::Path;
//!
//! let spec = load_spec(Path::new("job.json")).unwrap();
//! println!("Crawl will use concurrency: {}", spec.request.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CrawlSpec, ExtractionConfig, Limits, RequestConfig, RuleKind, ScopeConfig, ScopeRule,
    SelectorSpec, DEFAULT_CONCURRENCY, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_spec_hash, load_spec, load_spec_with_hash, parse_spec_json};
pub use validation::validate;
