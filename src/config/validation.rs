use crate::config::types::{CrawlSpec, ExtractionConfig, RequestConfig, ScopeConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire crawl spec
///
/// Rule patterns are only checked for emptiness here; patterns that fail to
/// compile are skipped later by the scope evaluator rather than rejected.
pub fn validate(spec: &CrawlSpec) -> Result<(), ConfigError> {
    validate_seeds(&spec.seeds)?;
    validate_request_config(&spec.request)?;
    validate_scope(&spec.scope)?;
    validate_extraction(&spec.extraction)?;
    Ok(())
}

/// Validates seed URLs: at least one, all absolute http(s)
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    if seeds.is_empty() {
        return Err(ConfigError::Validation(
            "crawl spec must contain at least one seed URL".to_string(),
        ));
    }

    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates concurrency and user agent settings
fn validate_request_config(config: &RequestConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "userAgent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_scope(scope: &ScopeConfig) -> Result<(), ConfigError> {
    if let Some(position) = scope.rules.iter().position(|r| r.pattern.is_empty()) {
        return Err(ConfigError::Validation(format!(
            "scope rule #{} has an empty pattern",
            position + 1
        )));
    }
    Ok(())
}

/// Validates selector names (non-empty, unique) and selectors (non-empty)
fn validate_extraction(extraction: &ExtractionConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for selector in &extraction.selectors {
        if selector.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "selector name cannot be empty".to_string(),
            ));
        }

        if selector.selector.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "selector '{}' has an empty CSS selector",
                selector.name
            )));
        }

        if !names.insert(selector.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate selector name '{}'",
                selector.name
            )));
        }
    }

    Ok(())
}
