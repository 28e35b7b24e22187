//! HTML page processing
//!
//! This module turns fetched markup into a [`PageResult`]:
//! - Outbound links (resolved, fragment-free, http(s) only, de-duplicated)
//! - Named CSS selector extraction
//! - Page title and visible text

use crate::config::SelectorSpec;
use crate::crawler::fetcher::FetchedPage;
use crate::crawler::result::{PageOutcome, PageResult};
use crate::url::resolve_url;
use chrono::Utc;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Elements whose text never counts as page text
const NON_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// First `<title>`, trimmed; None when absent or empty
    pub title: Option<String>,

    /// Absolute outbound links in first-seen order
    pub links: Vec<String>,

    /// Document text without script/style content, whitespace collapsed
    pub text: String,

    /// Selector name -> matches
    pub extracted: BTreeMap<String, Vec<String>>,
}

/// A configured selector, compiled once per job
#[derive(Debug, Clone)]
struct CompiledSelector {
    name: String,
    /// None when the CSS failed to parse
    selector: Option<Selector>,
    attr: Option<String>,
}

/// The job's extraction selectors
#[derive(Debug, Clone, Default)]
pub struct SelectorSet {
    selectors: Vec<CompiledSelector>,
}

impl SelectorSet {
    /// Compiles the configured selectors
    ///
    /// A selector that fails to parse is kept so that its name still appears
    /// in every page's extraction map, always with an empty list.
    pub fn compile(specs: &[SelectorSpec]) -> Self {
        let selectors = specs
            .iter()
            .map(|spec| {
                let selector = match Selector::parse(&spec.selector) {
                    Ok(selector) => Some(selector),
                    Err(e) => {
                        tracing::warn!(
                            "Selector '{}' ({}) does not parse: {:?}",
                            spec.name,
                            spec.selector,
                            e
                        );
                        None
                    }
                };
                CompiledSelector {
                    name: spec.name.clone(),
                    selector,
                    attr: spec.attr.clone(),
                }
            })
            .collect();

        Self { selectors }
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    fn extract(&self, document: &Html) -> BTreeMap<String, Vec<String>> {
        self.selectors
            .iter()
            .map(|compiled| {
                let values = match &compiled.selector {
                    Some(selector) => document
                        .select(selector)
                        .filter_map(|element| match &compiled.attr {
                            Some(attr) => element.value().attr(attr).map(str::to_string),
                            None => Some(collapse_whitespace(element.text())),
                        })
                        .collect(),
                    None => Vec::new(),
                };
                (compiled.name.clone(), values)
            })
            .collect()
    }
}

/// Parses HTML content and extracts links, title, text and selector matches
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The page URL, used to resolve relative links
/// * `selectors` - The job's extraction selectors
///
/// # Example
///
/// ```
/// use scopecrawl::crawler::{parse_html, SelectorSet};
/// use url::Url;
///
/// let html = r#"<html><head><title> Test </title></head><body><a href="/page#top">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, &SelectorSet::default());
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page"]);
/// ```
pub fn parse_html(html: &str, base_url: &Url, selectors: &SelectorSet) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
        text: extract_text(&document),
        extracted: selectors.extract(&document),
    }
}

/// Builds the success record for a fetched page
pub fn process_page(url: &Url, depth: u32, page: FetchedPage, selectors: &SelectorSet) -> PageResult {
    let parsed = parse_html(&page.html, url, selectors);

    let markdown = page
        .markdown
        .or_else(|| htmd::convert(&page.html).ok());

    PageResult {
        url: url.to_string(),
        outcome: PageOutcome::Success,
        status_code: page.status_code.unwrap_or(200),
        depth,
        fetched_at: Utc::now(),
        content_type: Some(page.content_type.unwrap_or_else(|| "text/html".to_string())),
        title: parsed.title,
        text: Some(parsed.text),
        html: Some(page.html),
        markdown,
        links: parsed.links,
        extracted: parsed.extracted,
        error: None,
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(a_selector) = Selector::parse("a[href], area[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        // Fragment-only and empty hrefs resolve to the page itself
        if let Some(resolved) = resolve_url(base_url, href) {
            let resolved = resolved.to_string();
            if seen.insert(resolved.clone()) {
                links.push(resolved);
            }
        }
    }

    links
}

fn extract_text(document: &Html) -> String {
    let fragments = document.root_element().descendants().filter_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ElementRef::wrap(ancestor)
                .map_or(false, |el| NON_TEXT_ELEMENTS.contains(&el.value().name()))
        });

        if hidden {
            None
        } else {
            Some(&**text)
        }
    });

    collapse_whitespace(fragments)
}

fn collapse_whitespace<'a>(fragments: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for fragment in fragments {
        for word in fragment.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
    }
    out
}
