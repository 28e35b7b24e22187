//! Page fetch collaborators
//!
//! This module defines the [`PageFetcher`] seam the dispatcher fetches
//! through, and two HTTP implementations of it:
//! - [`PooledHttpFetcher`] shares one connection-pooled client across the job
//! - [`OneShotHttpFetcher`] builds a fresh client for every request
//!
//! Both bypass intermediate caches, treat non-2xx responses and non-HTML
//! content as failures, and derive markdown from the fetched markup.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by a fetcher outside of a single page fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("fetch service unreachable: {0}")]
    Unreachable(String),
}

/// Raw content of a successfully fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub html: String,
    pub markdown: Option<String>,
    pub content_type: Option<String>,
    pub status_code: Option<u16>,
}

impl FetchedPage {
    /// A bare HTML page with no collaborator-provided metadata
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            markdown: None,
            content_type: None,
            status_code: None,
        }
    }
}

/// Result of a single fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(FetchedPage),
    Failure {
        error: String,
        /// HTTP status when the server answered with a non-success code
        status_code: Option<u16>,
    },
}

impl FetchOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            status_code: None,
        }
    }
}

/// The collaborator that turns a URL into markup
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Probes the collaborator before a job starts
    ///
    /// An error here fails the job before any page is attempted.
    async fn startup(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Fetches one page; never panics or errors, failures are outcomes
    async fn fetch(&self, url: &Url) -> FetchOutcome;
}

/// Builds an HTTP client for page fetching
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher sharing one pooled client across every request of a job
#[derive(Debug, Clone)]
pub struct PooledHttpFetcher {
    client: Client,
}

impl PooledHttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_http_client(user_agent)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for PooledHttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchOutcome {
        fetch_with_client(&self.client, url).await
    }
}

/// Fetcher that builds a new client per request
///
/// Nothing is shared between requests, so no connection or cookie state
/// leaks from one page to the next.
#[derive(Debug, Clone)]
pub struct OneShotHttpFetcher {
    user_agent: String,
}

impl OneShotHttpFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl PageFetcher for OneShotHttpFetcher {
    async fn startup(&self) -> Result<(), FetchError> {
        build_http_client(&self.user_agent)?;
        Ok(())
    }

    async fn fetch(&self, url: &Url) -> FetchOutcome {
        match build_http_client(&self.user_agent) {
            Ok(client) => fetch_with_client(&client, url).await,
            Err(e) => FetchOutcome::failure(e.to_string()),
        }
    }
}

/// Returns true for content types that carry HTML markup
fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

async fn fetch_with_client(client: &Client, url: &Url) -> FetchOutcome {
    let response = match client.get(url.as_str()).send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => return FetchOutcome::failure("Request timeout"),
        Err(e) if e.is_connect() => {
            return FetchOutcome::failure(format!("Connection failed: {}", e))
        }
        Err(e) => return FetchOutcome::failure(e.to_string()),
    };

    let status = response.status();
    if !status.is_success() {
        return FetchOutcome::Failure {
            error: format!("HTTP {}", status),
            status_code: Some(status.as_u16()),
        };
    }

    // A missing header is treated as HTML
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "text/html".to_string());

    if !is_html(&content_type) {
        return FetchOutcome::Failure {
            error: format!("Unsupported content type: {}", content_type),
            status_code: Some(status.as_u16()),
        };
    }

    let html = match response.text().await {
        Ok(body) => body,
        Err(e) => return FetchOutcome::failure(format!("Failed to read body: {}", e)),
    };

    let markdown = match htmd::convert(&html) {
        Ok(markdown) => Some(markdown),
        Err(e) => {
            tracing::debug!("Markdown conversion failed for {}: {}", url, e);
            None
        }
    };

    FetchOutcome::Success(FetchedPage {
        html,
        markdown,
        content_type: Some(content_type),
        status_code: Some(status.as_u16()),
    })
}
