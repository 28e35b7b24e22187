//! Robots.txt policy parsing
//!
//! Allow/disallow matching is delegated to the robotstxt crate; the
//! `Crawl-delay` extension is not part of its matcher, so it is extracted
//! here from the user-agent groups.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// One `User-agent` group and the crawl delay it declares
#[derive(Debug, Clone, PartialEq)]
struct AgentGroup {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
}

/// Upper bound on a host-declared `Crawl-delay`
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Parsed robots.txt policy for a single host
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    content: String,
    groups: Vec<AgentGroup>,
}

impl ParsedRobots {
    /// Parses raw robots.txt content
    pub fn parse(content: &str) -> Self {
        Self {
            content: content.to_string(),
            groups: parse_groups(content),
        }
    }

    /// Policy that allows everything and declares no delay
    ///
    /// Equivalent to an empty robots.txt; used whenever the real policy cannot
    /// be obtained.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Checks if an absolute URL may be fetched by `user_agent`
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, product_token(user_agent), url)
    }

    /// Gets the crawl delay declared for `user_agent`
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let token = product_token(user_agent).to_lowercase();

        let specific = self
            .groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a != "*" && token.contains(a.as_str())))
            .find_map(|g| g.crawl_delay);

        let delay = specific.or_else(|| {
            self.groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .find_map(|g| g.crawl_delay)
        })?;

        Duration::try_from_secs_f64(delay)
            .ok()
            .map(|delay| delay.min(MAX_CRAWL_DELAY))
    }
}

/// Strips the version and comment from a user agent ("bot/1.0 (+url)" -> "bot")
fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .filter(|t| !t.is_empty())
        .unwrap_or(user_agent)
}

/// Splits content into user-agent groups
///
/// Consecutive `User-agent` lines share a group; the first `User-agent` line
/// after any other directive starts a new one.
fn parse_groups(content: &str) -> Vec<AgentGroup> {
    let mut groups: Vec<AgentGroup> = Vec::new();
    let mut in_agent_run = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if !in_agent_run {
                    groups.push(AgentGroup {
                        agents: Vec::new(),
                        crawl_delay: None,
                    });
                }
                if let Some(group) = groups.last_mut() {
                    group.agents.push(value.to_lowercase());
                }
                in_agent_run = true;
            }
            "crawl-delay" => {
                in_agent_run = false;
                if let (Some(group), Ok(delay)) = (groups.last_mut(), value.parse::<f64>()) {
                    if delay >= 0.0 {
                        group.crawl_delay = Some(delay);
                    }
                }
            }
            _ => in_agent_run = false,
        }
    }

    groups
}
