//! Per-page result records
//!
//! Exactly one [`PageResult`] is produced for every URL a job attempts,
//! whether the fetch succeeded or not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status code recorded when no HTTP status is available
pub const SYNTHETIC_FAILURE_STATUS: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOutcome {
    Success,
    Failure,
}

impl PageOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

/// Outcome of attempting one URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub url: String,
    pub outcome: PageOutcome,

    /// HTTP status, or 0 for a synthesized failure
    pub status_code: u16,
    pub depth: u32,
    pub fetched_at: DateTime<Utc>,
    pub content_type: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub markdown: Option<String>,

    /// Absolute, fragment-free outbound links in first-seen order
    #[serde(default)]
    pub links: Vec<String>,

    /// Selector name -> matched values
    #[serde(default)]
    pub extracted: BTreeMap<String, Vec<String>>,
    pub error: Option<String>,
}

impl PageResult {
    /// Builds a failure record with every content field nulled
    pub fn failure(url: impl Into<String>, depth: u32, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: PageOutcome::Failure,
            status_code: SYNTHETIC_FAILURE_STATUS,
            depth,
            fetched_at: Utc::now(),
            content_type: None,
            title: None,
            text: None,
            html: None,
            markdown: None,
            links: Vec::new(),
            extracted: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == PageOutcome::Success
    }
}
