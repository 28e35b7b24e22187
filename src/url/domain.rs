use std::collections::HashSet;
use url::Url;

/// Returns the origin key used for same-domain checks
///
/// The key is the lowercase host followed by `:port` when the URL carries a
/// non-default port, so `https://a.test/` and `https://a.test:8443/` are
/// different origins while `https://a.test:443/` equals `https://a.test/`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use scopecrawl::url::origin_key;
///
/// let url = Url::parse("https://Example.com/path").unwrap();
/// assert_eq!(origin_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:3000/").unwrap();
/// assert_eq!(origin_key(&url), Some("127.0.0.1:3000".to_string()));
/// ```
pub fn origin_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Collects the origin keys of every parseable seed
pub fn seed_origins<S: AsRef<str>>(seeds: &[S]) -> HashSet<String> {
    seeds
        .iter()
        .filter_map(|seed| Url::parse(seed.as_ref()).ok())
        .filter_map(|url| origin_key(&url))
        .collect()
}
