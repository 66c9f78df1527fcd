//! Bootstrap-and-crawl pipeline: prepare → crawl → check exit code → hint.
//!
//! Both engines share one contract: a failed crawl surfaces as a
//! [`StageFailure`] whose exit code the CLI passes through unchanged, and a
//! successful crawl yields the path of the mirror's entry file.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};
use url::Url;

use warpcrawler_crawler::{CrawlProgress, CrawlSummary, Crawler, WaybackResolver, entry_hint};
use warpcrawler_shared::{CrawlConfig, Snapshot};

use crate::environment::PythonEnv;
use crate::process::{CommandRunner, CommandSpec, SPAWN_FAILURE_EXIT_CODE};

/// Which crawler produces the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    /// The in-process crawler.
    #[default]
    Native,
    /// A Python crawler script run inside a bootstrapped venv.
    External,
}

/// A pipeline step that can fail with an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `python -m venv`.
    CreateVenv,
    /// `pip install`.
    InstallPackages,
    /// The crawler itself.
    Crawl,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateVenv => "virtual environment creation",
            Self::InstallPackages => "package installation",
            Self::Crawl => "crawler",
        })
    }
}

/// A stage that exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    /// Failing stage.
    pub stage: Stage,
    /// Exit code to hand back to the shell.
    pub code: i32,
    /// Extra context (spawn error, crawl error message).
    pub detail: Option<String>,
}

impl StageFailure {
    /// Failure of `stage` with exit `code`.
    pub fn new(stage: Stage, code: i32) -> Self {
        Self {
            stage,
            code,
            detail: None,
        }
    }

    /// Attach extra context.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed with exit code {}", self.stage, self.code)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// What to crawl and where to put it.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Archived URL of the start page.
    pub snapshot_url: String,
    /// Mirror root directory.
    pub output_dir: PathBuf,
}

/// Final state of the pipeline.
#[derive(Debug)]
pub enum CrawlOutcome {
    /// The crawler exited 0.
    Completed {
        /// File to open in a browser.
        entry_hint: PathBuf,
        /// Crawl statistics (native engine only).
        summary: Option<CrawlSummary>,
    },
    /// A stage exited non-zero.
    Failed(StageFailure),
}

impl CrawlOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { .. } => 0,
            Self::Failed(failure) => failure.code,
        }
    }
}

/// Where the entry page of a mirror of `snapshot_url` lands:
/// `<output_dir>/<host>/index.html`.
pub fn expected_entry(snapshot: &Snapshot, snapshot_url: &str, output_dir: &Path) -> PathBuf {
    WaybackResolver::new(snapshot.clone())
        .ok()
        .and_then(|resolver| {
            let archived = resolver
                .normalize(snapshot_url)
                .unwrap_or_else(|| snapshot_url.to_string());
            resolver.original_url(&archived)
        })
        .and_then(|original| Url::parse(&original).ok())
        .map(|original| entry_hint(output_dir, &original))
        .unwrap_or_else(|| output_dir.join("index.html"))
}

/// Mirror the snapshot with the in-process crawler.
///
/// Any fatal error (start URL outside the snapshot, unwritable output
/// directory) is reported as a crawl failure with the error's exit code.
#[instrument(skip_all, fields(url = %request.snapshot_url))]
pub async fn run_native(
    request: &CrawlRequest,
    snapshot: Snapshot,
    config: CrawlConfig,
    progress: &dyn CrawlProgress,
) -> CrawlOutcome {
    let crawler = match Crawler::new(config, snapshot) {
        Ok(crawler) => crawler,
        Err(e) => {
            return CrawlOutcome::Failed(
                StageFailure::new(Stage::Crawl, e.exit_code()).with_detail(e.to_string()),
            );
        }
    };

    match crawler
        .crawl(&request.snapshot_url, &request.output_dir, progress)
        .await
    {
        Ok(summary) => CrawlOutcome::Completed {
            entry_hint: summary.entry_hint.clone(),
            summary: Some(summary),
        },
        Err(e) => {
            warn!(error = %e, "crawl aborted");
            CrawlOutcome::Failed(
                StageFailure::new(Stage::Crawl, e.exit_code()).with_detail(e.to_string()),
            )
        }
    }
}

/// Bootstrap the Python environment, then run the external crawler script
/// as `<venv-python> <script> <snapshot_url> <output_dir>`.
///
/// The script's exit code is the pipeline's exit code. No retries.
#[instrument(skip_all, fields(url = %request.snapshot_url, script = %script.display()))]
pub fn run_external(
    request: &CrawlRequest,
    snapshot: &Snapshot,
    env: &PythonEnv,
    script: &Path,
    runner: &dyn CommandRunner,
) -> CrawlOutcome {
    match env.ensure(runner) {
        Ok(ready) => info!(created = ready.created, "environment ready"),
        Err(failure) => return CrawlOutcome::Failed(failure),
    }

    let crawl = CommandSpec::new(env.interpreter().to_string_lossy())
        .arg(script.to_string_lossy())
        .arg(request.snapshot_url.as_str())
        .arg(request.output_dir.to_string_lossy());

    match runner.run(&crawl) {
        Ok(0) => CrawlOutcome::Completed {
            entry_hint: expected_entry(snapshot, &request.snapshot_url, &request.output_dir),
            summary: None,
        },
        Ok(code) => CrawlOutcome::Failed(StageFailure::new(Stage::Crawl, code)),
        Err(e) => CrawlOutcome::Failed(
            StageFailure::new(Stage::Crawl, SPAWN_FAILURE_EXIT_CODE).with_detail(e.to_string()),
        ),
    }
}
