//! Application configuration for warpcrawler.
//!
//! Lookup order: `--config <path>`, `./warpcrawler.toml`, then
//! `~/.warpcrawler/warpcrawler.toml`. Missing files fall back to defaults,
//! which reproduce the original hardcoded crawl and publish parameters.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WarpError};
use crate::types::{DEFAULT_ARCHIVE_ORIGIN, DEFAULT_TIMESTAMP, Snapshot};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "warpcrawler.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".warpcrawler";

// ---------------------------------------------------------------------------
// Config structs (matching warpcrawler.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which capture to mirror, and where.
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Native crawler tuning.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// Python environment used by the external crawler engine.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Git publishing of the mirror directory.
    #[serde(default)]
    pub publish: PublishConfig,
}

impl AppConfig {
    /// Build the [`Snapshot`] described by the `[snapshot]` section.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::new(&self.snapshot.archive_origin, &self.snapshot.timestamp)
    }

    /// Archived URL the crawl starts from: `start_url` if set, otherwise
    /// `site_url` inside the configured snapshot.
    pub fn start_url(&self) -> Result<String> {
        match &self.snapshot.start_url {
            Some(url) => Ok(url.clone()),
            None => Ok(self.snapshot()?.archived_url(&self.snapshot.site_url)),
        }
    }
}

/// `[snapshot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Scheme + host of the archive service.
    #[serde(default = "default_archive_origin")]
    pub archive_origin: String,

    /// 14-digit capture timestamp every followed link must share.
    #[serde(default = "default_timestamp")]
    pub timestamp: String,

    /// Live URL of the mirrored site's entry page.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Archived URL the crawl starts from. When unset, `site_url` inside the
    /// configured snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,

    /// Directory the mirror is written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            archive_origin: default_archive_origin(),
            timestamp: default_timestamp(),
            site_url: default_site_url(),
            start_url: None,
            output_dir: default_output_dir(),
        }
    }
}

fn default_archive_origin() -> String {
    DEFAULT_ARCHIVE_ORIGIN.into()
}
fn default_timestamp() -> String {
    DEFAULT_TIMESTAMP.into()
}
fn default_site_url() -> String {
    "https://jamstash.io/".into()
}
fn default_output_dir() -> String {
    "jamstash_site".into()
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// User-Agent header sent to the archive.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause before every fetch, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Maximum concurrent requests. 1 keeps the crawl strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Stop after saving this many files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,

    /// Write `mirror-manifest.json` at the mirror root.
    #[serde(default = "default_true")]
    pub write_manifest: bool,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            delay_ms: default_delay_ms(),
            concurrency: default_concurrency(),
            max_pages: None,
            write_manifest: true,
        }
    }
}

fn default_user_agent() -> String {
    concat!("WarpCrawler/", env!("CARGO_PKG_VERSION"), " (+local)").into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_delay_ms() -> u64 {
    100
}
fn default_concurrency() -> u32 {
    1
}
fn default_true() -> bool {
    true
}

/// `[bootstrap]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Interpreter used to create the virtual environment.
    #[serde(default = "default_python")]
    pub python: String,

    /// Virtual environment directory. Created only when missing.
    #[serde(default = "default_venv_dir")]
    pub venv_dir: String,

    /// Packages installed into the environment before every crawl.
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,

    /// Crawler script run by the external engine.
    #[serde(default = "default_script")]
    pub script: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            venv_dir: default_venv_dir(),
            packages: default_packages(),
            script: default_script(),
        }
    }
}

fn default_python() -> String {
    "python".into()
}
fn default_venv_dir() -> String {
    "venv".into()
}
fn default_packages() -> Vec<String> {
    vec!["requests".into()]
}
fn default_script() -> String {
    "scripts/crawl_wayback.py".into()
}

/// What the publish sequence does when a git step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failing step and report it.
    #[default]
    Halt,
    /// Attempt every step regardless of failures and report success.
    KeepGoing,
}

/// `[publish]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// `user.name` written to the repository config.
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// `user.email` written to the repository config.
    #[serde(default = "default_user_email")]
    pub user_email: String,

    /// Directory staged for the commit.
    #[serde(default = "default_output_dir")]
    pub path: String,

    /// Commit message.
    #[serde(default = "default_message")]
    pub message: String,

    /// Remote pushed to.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch the current branch is renamed to, then pushed.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Overwrite the remote branch history.
    #[serde(default = "default_true")]
    pub force: bool,

    /// Failure handling for the git sequence.
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            user_name: default_user_name(),
            user_email: default_user_email(),
            path: default_output_dir(),
            message: default_message(),
            remote: default_remote(),
            branch: default_branch(),
            force: true,
            on_failure: FailurePolicy::default(),
        }
    }
}

fn default_user_name() -> String {
    "warpcrawler".into()
}
fn default_user_email() -> String {
    "warpcrawler@users.noreply.github.com".into()
}
fn default_message() -> String {
    "Add Wayback Machine mirror".into()
}
fn default_remote() -> String {
    "origin".into()
}
fn default_branch() -> String {
    "main".into()
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration, merged from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// User-Agent header.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Pause before every fetch, in ms.
    pub delay_ms: u64,
    /// Maximum concurrent HTTP requests.
    pub concurrency: u32,
    /// Stop after saving this many files.
    pub max_pages: Option<usize>,
    /// Write `mirror-manifest.json` at the mirror root.
    pub write_manifest: bool,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.crawl.user_agent.clone(),
            timeout: Duration::from_secs(config.crawl.timeout_secs),
            delay_ms: config.crawl.delay_ms,
            concurrency: config.crawl.concurrency.max(1),
            max_pages: config.crawl.max_pages,
            write_manifest: config.crawl.write_manifest,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.warpcrawler/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| WarpError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.warpcrawler/warpcrawler.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Find the config file to load, if any.
///
/// An explicit path must exist. Otherwise `./warpcrawler.toml` wins over the
/// user config file.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(WarpError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(Some(local));
    }

    match config_file_path() {
        Ok(user) if user.exists() => Ok(Some(user)),
        _ => Ok(None),
    }
}

/// Load the application config. Returns defaults if no config file exists.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match resolve_config_path(explicit)? {
        Some(path) => load_config_from(&path),
        None => {
            tracing::debug!("config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| WarpError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| WarpError::config(format!("failed to parse {}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "loaded config");

    config.snapshot()?;
    Ok(config)
}

/// Write a default config file into the user config directory.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_at(&config_file_path()?)
}

/// Write a default config file at `path`. Refuses to overwrite an existing file.
pub fn init_config_at(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(WarpError::config(format!(
            "{} already exists; remove it first to regenerate defaults",
            path.display()
        )));
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| WarpError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| WarpError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| WarpError::io(path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(path.to_path_buf())
}
