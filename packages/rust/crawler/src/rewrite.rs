//! Rewrite archived links in a saved page to relative local paths.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::trace;
use url::Url;

use crate::links::DiscoveredLinks;
use crate::paths::{guess_local_path, relative_path};
use crate::wayback::{WaybackResolver, split_fragment};

/// Content type assumed for link targets that have not been fetched yet.
const ASSUMED_PAGE_TYPE: &str = "text/html";

/// Archived link text → relative local path, longest key first.
pub type Replacements = Vec<(String, String)>;

/// Build the replacement table for a page saved at `current_file`.
///
/// Every raw form of a link (root-relative, scheme-relative, absolute) maps to
/// the same local target. The target's content type is unknown until it is
/// fetched, so extension-less targets are assumed to be HTML pages, matching
/// where [`guess_local_path`] stores them. Links whose live URL cannot be
/// recovered are left untouched. A `#fragment` is carried over to the local
/// link.
pub fn build_replacements(
    links: &DiscoveredLinks,
    resolver: &WaybackResolver,
    root: &Path,
    current_file: &Path,
) -> Replacements {
    let current_dir = current_file.parent().unwrap_or(Path::new("."));
    let mut table: BTreeMap<String, String> = BTreeMap::new();

    for (raw, archived) in &links.raw_forms {
        let (page, fragment) = split_fragment(archived);
        let Some(original) = resolver.original_url(page) else {
            continue;
        };
        let Ok(original) = Url::parse(&original) else {
            continue;
        };
        let target = guess_local_path(root, &original, Some(ASSUMED_PAGE_TYPE));
        let mut rel = relative_path(current_dir, &target);
        if let Some(fragment) = fragment {
            rel.push('#');
            rel.push_str(fragment);
        }

        table.insert(archived.clone(), rel.clone());
        table.insert(raw.clone(), rel);
    }

    let mut replacements: Replacements = table.into_iter().collect();
    replacements.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    replacements
}

/// Apply `replacements` to `html`. Longer keys go first so a link that is a
/// prefix of another never corrupts it.
pub fn rewrite_html(html: &str, replacements: &Replacements) -> String {
    let mut rewritten = html.to_string();
    for (archived, local) in replacements {
        if rewritten.contains(archived.as_str()) {
            trace!(%archived, %local, "rewriting link");
            rewritten = rewritten.replace(archived.as_str(), local);
        }
    }
    rewritten
}
