//! Robots.txt handling module
//!
//! This module provides the politeness gate consulted before every fetch:
//! robots.txt is fetched once per host through a [`RobotsSource`], parsed,
//! cached for the lifetime of the job, and used to decide whether a URL may
//! be fetched and how long to wait before fetching it.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::{ParsedRobots, MAX_CRAWL_DELAY};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Timeout for a single robots.txt request
pub const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Robots.txt retrieval errors
///
/// None of these are fatal; the gate falls back to a permissive policy.
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("robots.txt request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("robots.txt returned HTTP {0}")]
    Status(u16),

    #[error("robots.txt unavailable: {0}")]
    Unavailable(String),
}

/// Source of raw robots.txt content
#[async_trait]
pub trait RobotsSource: Send + Sync {
    /// Fetches `{scheme}://{host}/robots.txt`
    ///
    /// `host` includes a non-default port when the site uses one.
    async fn fetch_robots(&self, scheme: &str, host: &str) -> Result<String, RobotsError>;
}

/// Fetches robots.txt over HTTP with a short timeout
#[derive(Debug, Clone)]
pub struct HttpRobotsSource {
    client: reqwest::Client,
}

impl HttpRobotsSource {
    pub fn new(user_agent: &str) -> Result<Self, RobotsError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(ROBOTS_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RobotsSource for HttpRobotsSource {
    async fn fetch_robots(&self, scheme: &str, host: &str) -> Result<String, RobotsError> {
        let robots_url = format!("{}://{}/robots.txt", scheme, host);
        let response = self.client.get(&robots_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RobotsError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

/// Decides fetch permission and inter-request delay for a job
///
/// A disabled gate never touches the network: every URL is allowed and the
/// delay is the configured base delay.
pub struct PolitenessGate {
    /// None when robots.txt is not respected
    source: Option<Arc<dyn RobotsSource>>,
    cache: RobotsCache,
    base_delay: Duration,
}

impl PolitenessGate {
    /// Gate that consults robots.txt from `source`
    pub fn respecting(source: Arc<dyn RobotsSource>, base_delay: Duration) -> Self {
        Self {
            source: Some(source),
            cache: RobotsCache::new(),
            base_delay,
        }
    }

    /// Gate that only applies the configured delay
    pub fn disabled(base_delay: Duration) -> Self {
        Self {
            source: None,
            cache: RobotsCache::new(),
            base_delay,
        }
    }

    pub fn respects_robots(&self) -> bool {
        self.source.is_some()
    }

    /// Checks whether `url` may be fetched by `user_agent`
    ///
    /// Blocks on the robots.txt fetch the first time a host is seen.
    pub async fn allowed(&self, url: &Url, user_agent: &str) -> bool {
        match self.policy_for(url).await {
            Some(policy) => policy.is_allowed(url.as_str(), user_agent),
            None => true,
        }
    }

    /// Delay to apply before fetching `url`
    ///
    /// The configured delay, raised to the host's `Crawl-delay` for this agent
    /// when robots are respected.
    pub async fn delay_for(&self, url: &Url, user_agent: &str) -> Duration {
        let crawl_delay = self
            .policy_for(url)
            .await
            .and_then(|policy| policy.crawl_delay(user_agent));

        match crawl_delay {
            Some(delay) => delay.max(self.base_delay),
            None => self.base_delay,
        }
    }

    /// Number of hosts whose policy has been requested
    pub fn hosts_cached(&self) -> usize {
        self.cache.len()
    }

    async fn policy_for(&self, url: &Url) -> Option<Arc<ParsedRobots>> {
        let source = self.source.as_ref()?;
        let scheme = url.scheme().to_string();
        let host = crate::url::origin_key(url)?;
        let key = format!("{}://{}", scheme, host);

        let policy = self
            .cache
            .get_or_load(&key, || async {
                match source.fetch_robots(&scheme, &host).await {
                    Ok(content) => {
                        tracing::debug!("Loaded robots.txt for {}", key);
                        ParsedRobots::parse(&content)
                    }
                    Err(e) => {
                        tracing::warn!("Allowing all URLs on {}: {}", key, e);
                        ParsedRobots::permissive()
                    }
                }
            })
            .await;

        Some(policy)
    }
}
