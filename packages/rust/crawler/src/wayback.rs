//! Mapping between archived Wayback URLs and the live URLs they capture.
//!
//! Archived URLs look like
//! `https://web.archive.org/web/20250408214013/https://jamstash.io/` or, for
//! raw assets, `https://web.archive.org/web/20250408214013im_/https://…`.

use regex::Regex;
use warpcrawler_shared::{Result, Snapshot, WarpError};

/// Resolves raw link values against a single snapshot.
#[derive(Debug, Clone)]
pub struct WaybackResolver {
    snapshot: Snapshot,
    origin: String,
    prefix: String,
    scheme_relative: String,
    original_re: Regex,
}

impl WaybackResolver {
    /// Build a resolver for `snapshot`.
    pub fn new(snapshot: Snapshot) -> Result<Self> {
        let authority = snapshot.authority();
        let pattern = format!(
            r"^https?://{}/web/\d{{14}}[a-z_\-]*/(https?://.+)$",
            regex::escape(&authority)
        );
        let original_re = Regex::new(&pattern)
            .map_err(|e| WarpError::validation(format!("archive host pattern: {e}")))?;

        Ok(Self {
            origin: snapshot.origin(),
            prefix: snapshot.prefix(),
            scheme_relative: format!("//{authority}/"),
            original_re,
            snapshot,
        })
    }

    /// The snapshot this resolver filters on.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// `<origin>/web/<timestamp>`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Turn a raw attribute value into an absolute archived URL.
    ///
    /// Accepts scheme-relative (`//web.archive.org/…`), root-relative
    /// (`/web/…`) and absolute archive URLs. Everything else, including links
    /// to the live site, yields `None`.
    pub fn normalize(&self, value: &str) -> Option<String> {
        if value.is_empty() {
            return None;
        }
        if value.starts_with(&self.scheme_relative) {
            return Some(format!("{}:{value}", self.snapshot.scheme()));
        }
        if value.starts_with("/web/") {
            return Some(format!("{}{value}", self.origin));
        }
        if value
            .strip_prefix(self.origin.as_str())
            .is_some_and(|rest| rest.starts_with("/web/"))
        {
            return Some(value.to_string());
        }
        None
    }

    /// Recover the live URL embedded in an archived URL.
    pub fn original_url(&self, archived: &str) -> Option<String> {
        self.original_re
            .captures(archived)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Whether `url` belongs to this snapshot, modifiers included.
    pub fn in_snapshot(&self, url: &str) -> bool {
        url.starts_with(&self.prefix)
    }
}

/// Split `url` into the part that identifies a resource and its `#fragment`.
pub(crate) fn split_fragment(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    }
}
