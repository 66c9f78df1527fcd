//! Shared types, error model, and configuration for warpcrawler.
//!
//! This crate is the foundation depended on by all other warpcrawler crates.
//! It provides:
//! - [`WarpError`] — the unified error type
//! - Domain types ([`Snapshot`], [`MirrorManifest`], [`MirroredFile`], [`CrawlId`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BootstrapConfig, CrawlConfig, CrawlSection, FailurePolicy, PublishConfig,
    SnapshotConfig, config_dir, config_file_path, init_config, init_config_at, load_config,
    load_config_from, resolve_config_path,
};
pub use error::{Result, WarpError};
pub use types::{
    CURRENT_SCHEMA_VERSION, CrawlId, DEFAULT_ARCHIVE_ORIGIN, DEFAULT_TIMESTAMP, MirrorManifest,
    MirroredFile, Snapshot,
};
