use crate::config::types::CrawlSpec;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and validates a crawl spec from a file
///
/// Files ending in `.toml` are parsed as TOML; everything else is parsed as
/// JSON. Both formats use the same camelCase field names.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use scopecrawl::config::load_spec;
///
/// let spec = load_spec(Path::new("job.json")).unwrap();
/// println!("Seeds: {:?}", spec.seeds);
/// ```
pub fn load_spec(path: &Path) -> Result<CrawlSpec, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let spec: CrawlSpec = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    validate(&spec)?;

    Ok(spec)
}

/// Parses and validates a crawl spec from a JSON string
pub fn parse_spec_json(json: &str) -> Result<CrawlSpec, ConfigError> {
    let spec: CrawlSpec = serde_json::from_str(json)?;
    validate(&spec)?;
    Ok(spec)
}

/// Computes a SHA-256 hash of the spec's canonical JSON form
///
/// Stored on the job record so results can be traced back to the exact spec
/// that produced them.
pub fn compute_spec_hash(spec: &CrawlSpec) -> Result<String, ConfigError> {
    let canonical = serde_json::to_string(spec)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a spec and returns both the spec and its hash
pub fn load_spec_with_hash(path: &Path) -> Result<(CrawlSpec, String), ConfigError> {
    let spec = load_spec(path)?;
    let hash = compute_spec_hash(&spec)?;
    Ok((spec, hash))
}
