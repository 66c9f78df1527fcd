//! Link discovery in archived HTML.
//!
//! Archived pages are scanned textually rather than parsed into a DOM: the
//! exact attribute text is needed later to rewrite it in place.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::wayback::{WaybackResolver, split_fragment};

/// `href`, `src`, `data-src` and `data-href` attribute values.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:href|src|data-src|data-href)\s*=\s*(?:"([^"\n]*)"|'([^'\n]*)')"#)
        .expect("valid regex")
});

/// `srcset` attribute values, which may span lines.
static SRCSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bsrcset\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

/// CSS `url(...)`, quoted or bare.
static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"\n]+?)"|'([^'\n]+?)'|([^"'\n]+?))\s*\)"#).expect("valid regex")
});

/// In-snapshot links found on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredLinks {
    /// Absolute archived URLs without fragments, deduplicated.
    pub links: BTreeSet<String>,
    /// Raw attribute text → absolute archived URL (fragment kept), for every
    /// raw form seen.
    pub raw_forms: BTreeMap<String, String>,
}

impl DiscoveredLinks {
    /// Number of distinct archived URLs.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether no in-snapshot link was found.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    fn add(&mut self, raw: &str, resolver: &WaybackResolver) {
        let Some(url) = resolver.normalize(raw) else {
            return;
        };
        if !resolver.in_snapshot(&url) {
            return;
        }
        // Anchors on the same page share one fetch
        let (page, _) = split_fragment(&url);
        self.links.insert(page.to_string());
        self.raw_forms.insert(raw.to_string(), url);
    }
}

/// Collect every in-snapshot link in `html`.
///
/// Covers link/source attributes, each candidate of a `srcset`, and CSS
/// `url(...)` references in style blocks or inline styles.
pub fn find_links_to_follow(html: &str, resolver: &WaybackResolver) -> DiscoveredLinks {
    let mut found = DiscoveredLinks::default();

    for caps in ATTR_RE.captures_iter(html) {
        if let Some(value) = caps.get(1).or_else(|| caps.get(2)) {
            found.add(value.as_str(), resolver);
        }
    }

    for caps in SRCSET_RE.captures_iter(html) {
        let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        for candidate in value.as_str().split(',') {
            if let Some(url) = candidate.split_whitespace().next() {
                found.add(url, resolver);
            }
        }
    }

    for caps in CSS_URL_RE.captures_iter(html) {
        if let Some(value) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            found.add(value.as_str(), resolver);
        }
    }

    found
}
