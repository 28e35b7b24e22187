use serde::{Deserialize, Serialize};

/// Default number of in-flight fetches per job
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Default user agent sent with page and robots.txt requests
pub const DEFAULT_USER_AGENT: &str = "scopecrawl/0.1";

/// Complete description of one crawl job
///
/// A spec is immutable once a job has been created from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSpec {
    /// URLs the crawl starts from (depth 0)
    pub seeds: Vec<String>,

    #[serde(default)]
    pub scope: ScopeConfig,

    #[serde(default)]
    pub limits: Limits,

    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Only follow URLs whose host (and port) matches one of the seeds
    #[serde(default = "default_same_domain_only")]
    pub same_domain_only: bool,
}

impl CrawlSpec {
    /// Creates a spec with the given seeds and every other field defaulted
    pub fn with_seeds<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seeds: seeds.into_iter().map(Into::into).collect(),
            scope: ScopeConfig::default(),
            limits: Limits::default(),
            request: RequestConfig::default(),
            extraction: ExtractionConfig::default(),
            same_domain_only: default_same_domain_only(),
        }
    }
}

/// Ordered allow/deny rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default)]
    pub rules: Vec<ScopeRule>,
}

/// A single regex scope rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,

    /// Regular expression searched anywhere in the absolute URL
    pub pattern: String,
}

impl ScopeRule {
    pub fn allow(pattern: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Allow,
            pattern: pattern.into(),
        }
    }

    pub fn deny(pattern: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Deny,
            pattern: pattern.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Allow,
    Deny,
}

/// Global resource limits; `None` means unlimited
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_seconds: Option<u64>,
}

/// Concurrency and politeness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// Maximum number of in-flight fetches
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Delay applied before every fetch (milliseconds)
    #[serde(default)]
    pub delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Consult robots.txt before fetching
    #[serde(default)]
    pub respect_robots: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            delay_ms: 0,
            user_agent: default_user_agent(),
            respect_robots: false,
        }
    }
}

/// Named CSS selector extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub selectors: Vec<SelectorSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorSpec {
    /// Key under which matches are stored in the page's extraction map
    pub name: String,

    /// CSS selector
    pub selector: String,

    /// Attribute to collect; element text is collected when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

fn default_same_domain_only() -> bool {
    true
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
