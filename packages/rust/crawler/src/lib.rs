//! Wayback Machine snapshot mirroring.
//!
//! This crate provides:
//! - [`wayback`] — archived URL normalization and live-URL recovery
//! - [`links`] — in-snapshot link discovery in archived HTML
//! - [`paths`] — local file layout of a mirror
//! - [`rewrite`] — offline rewriting of archived links
//! - [`engine`] — the snapshot-bounded BFS crawler

pub mod engine;
pub mod links;
pub mod paths;
pub mod rewrite;
pub mod wayback;

pub use engine::{CrawlProgress, CrawlSummary, Crawler, MANIFEST_FILE_NAME, SilentProgress};
pub use links::{DiscoveredLinks, find_links_to_follow};
pub use paths::{entry_hint, guess_local_path, relative_path};
pub use rewrite::{Replacements, build_replacements, rewrite_html};
pub use wayback::WaybackResolver;
