//! Link extraction from fetched HTML
//!
//! Pure function from page text to the list of same-origin absolute URLs it
//! links to. Safe to call concurrently from every worker loop.

use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::trace;
use url::Url;

/// Extract the followable links from `content`.
///
/// Anchor hrefs are collected case-insensitively, `mailto:` targets are
/// skipped, and relative hrefs are resolved against `current_url` (the page
/// they were found on, not the crawl origin). A href that cannot be
/// resolved is kept as-is rather than dropped. Only URLs prefixed by
/// `base_prefix` survive the same-origin filter; the caller is expected to
/// pass the origin with its trailing slash trimmed.
pub fn extract_links(content: &str, current_url: &str, base_prefix: &str) -> Vec<String> {
    let document = Html::parse_document(content);

    // "a[href]" cannot fail to parse; guard anyway rather than unwrap.
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let base = Url::parse(current_url).ok();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("mailto:")) {
            continue;
        }

        let resolved = resolve(href, base.as_ref());
        trace!(href, resolved = %resolved, "candidate link");

        if resolved.starts_with(base_prefix) && seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

/// Resolve a href against the page it appeared on. Absolute URLs pass
/// through untouched; unresolvable hrefs come back unchanged, best effort.
fn resolve(href: &str, base: Option<&Url>) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    match base.and_then(|b| b.join(href).ok()) {
        Some(joined) => joined.to_string(),
        None => href.to_string(),
    }
}
