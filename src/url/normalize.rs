use crate::UrlError;
use url::Url;

/// Normalizes a URL into the form used for frontier and seen-set keys
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or relative
/// 2. Require an http or https scheme
/// 3. Require a host
/// 4. Remove the fragment (everything after #)
///
/// Host lowercasing and default-port removal come from the URL parser itself.
/// Paths, trailing slashes and query strings are kept as-is: two URLs that
/// differ only there are different pages.
///
/// # Examples
///
/// ```
/// use scopecrawl::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.com:443/docs/#intro").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs/");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Resolves `href` against `base` and normalizes the result
///
/// Returns None for hrefs that cannot be resolved or that resolve to a
/// non-http(s) URL.
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let joined = base.join(href.trim()).ok()?;
    normalize_parsed(joined).ok()
}

fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    Ok(url)
}
