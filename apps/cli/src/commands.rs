//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use warpcrawler_core::{
    CrawlOutcome, CrawlRequest, Engine, Publisher, PythonEnv, StepStatus, SystemRunner,
    run_external, run_native,
};
use warpcrawler_crawler::{CrawlProgress, CrawlSummary};
use warpcrawler_shared::{
    AppConfig, CrawlConfig, FailurePolicy, init_config, init_config_at, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// warpcrawler — mirror a Wayback Machine snapshot for offline browsing.
#[derive(Parser)]
#[command(
    name = "warpcrawler",
    version,
    about = "Mirror a Wayback Machine snapshot to disk and publish it with git.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./warpcrawler.toml, then ~/.warpcrawler/warpcrawler.toml).
    #[arg(long, global = true, env = "WARPCRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Crawler implementation used by `crawl`.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub(crate) enum EngineArg {
    /// Built-in crawler.
    #[default]
    Native,
    /// Python script in a bootstrapped virtual environment.
    External,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Native => Engine::Native,
            EngineArg::External => Engine::External,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Mirror a snapshot into a local directory.
    Crawl {
        /// Archived start URL (defaults to [snapshot].start_url, else site_url in the snapshot).
        snapshot_url: Option<String>,

        /// Output directory (defaults to [snapshot].output_dir).
        out_dir: Option<PathBuf>,

        /// Crawler engine.
        #[arg(long, value_enum, default_value_t = EngineArg::Native)]
        engine: EngineArg,

        /// Snapshot timestamp links must share (14 digits).
        #[arg(long)]
        timestamp: Option<String>,

        /// Maximum concurrent requests.
        #[arg(long)]
        concurrency: Option<u32>,

        /// Pause before every request, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Stop after saving this many files.
        #[arg(long)]
        max_pages: Option<usize>,

        /// Do not write mirror-manifest.json.
        #[arg(long)]
        no_manifest: bool,
    },

    /// Create the Python virtual environment and install its packages.
    Bootstrap,

    /// Commit the mirror directory and force-push it.
    Publish {
        /// Directory to stage (defaults to [publish].path).
        #[arg(long)]
        dir: Option<String>,

        /// Commit message.
        #[arg(short, long)]
        message: Option<String>,

        /// Remote to push to.
        #[arg(long)]
        remote: Option<String>,

        /// Branch to rename to and push.
        #[arg(long)]
        branch: Option<String>,

        /// Repository to run git in (defaults to the current directory).
        #[arg(long)]
        repo: Option<PathBuf>,

        /// Attempt every git step even after a failure, and exit 0.
        #[arg(long)]
        keep_going: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults (to --config, or the user config dir).
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "warpcrawler=info",
        1 => "warpcrawler=debug",
        _ => "warpcrawler=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command and return the process exit code.
pub(crate) async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Crawl {
            snapshot_url,
            out_dir,
            engine,
            timestamp,
            concurrency,
            delay_ms,
            max_pages,
            no_manifest,
        } => {
            let mut config = load_config(config_path)?;
            if let Some(ts) = timestamp {
                config.snapshot.timestamp = ts;
            }
            if let Some(n) = concurrency {
                config.crawl.concurrency = n;
            }
            if let Some(ms) = delay_ms {
                config.crawl.delay_ms = ms;
            }
            if max_pages.is_some() {
                config.crawl.max_pages = max_pages;
            }
            if no_manifest {
                config.crawl.write_manifest = false;
            }
            cmd_crawl(&config, snapshot_url, out_dir, engine.into()).await
        }
        Command::Bootstrap => cmd_bootstrap(config_path),
        Command::Publish {
            dir,
            message,
            remote,
            branch,
            repo,
            keep_going,
        } => {
            let mut config = load_config(config_path)?;
            let publish = &mut config.publish;
            if let Some(dir) = dir {
                publish.path = dir;
            }
            if let Some(message) = message {
                publish.message = message;
            }
            if let Some(remote) = remote {
                publish.remote = remote;
            }
            if let Some(branch) = branch {
                publish.branch = branch;
            }
            if keep_going {
                publish.on_failure = FailurePolicy::KeepGoing;
            }
            cmd_publish(&config, repo)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_crawl(
    config: &AppConfig,
    snapshot_url: Option<String>,
    out_dir: Option<PathBuf>,
    engine: Engine,
) -> Result<i32> {
    let snapshot = config.snapshot()?;
    let request = CrawlRequest {
        snapshot_url: match snapshot_url {
            Some(url) => url,
            None => config.start_url()?,
        },
        output_dir: out_dir.unwrap_or_else(|| PathBuf::from(&config.snapshot.output_dir)),
    };

    info!(
        url = %request.snapshot_url,
        out_dir = %request.output_dir.display(),
        ?engine,
        "mirroring snapshot"
    );

    let outcome = match engine {
        Engine::Native => {
            let reporter = CliProgress::new();
            run_native(&request, snapshot, CrawlConfig::from(config), &reporter).await
        }
        Engine::External => run_external(
            &request,
            &snapshot,
            &PythonEnv::from_config(&config.bootstrap),
            Path::new(&config.bootstrap.script),
            &SystemRunner,
        ),
    };

    match &outcome {
        CrawlOutcome::Completed {
            entry_hint,
            summary,
        } => {
            if let Some(summary) = summary {
                print_summary(summary);
            }
            println!("Done. Open {} in your browser.", entry_hint.display());
        }
        CrawlOutcome::Failed(failure) => {
            eprintln!("Error: {failure}");
        }
    }

    Ok(outcome.exit_code())
}

fn print_summary(summary: &CrawlSummary) {
    println!();
    println!("  Snapshot mirrored.");
    println!("  Saved:    {}", summary.pages_saved);
    println!("  Skipped:  {}", summary.pages_skipped);
    if let Some(manifest) = &summary.manifest_path {
        println!("  Manifest: {}", manifest.display());
    }
    println!("  Time:     {:.1}s", summary.duration.as_secs_f64());
    println!();
}

fn cmd_bootstrap(config_path: Option<&Path>) -> Result<i32> {
    let config = load_config(config_path)?;
    let env = PythonEnv::from_config(&config.bootstrap);

    match env.ensure(&SystemRunner) {
        Ok(ready) => {
            let verb = if ready.created { "created" } else { "reused" };
            println!(
                "Environment {verb} at {}; packages installed.",
                env.venv_dir().display()
            );
            Ok(0)
        }
        Err(failure) => {
            eprintln!("Error: {failure}");
            Ok(failure.code)
        }
    }
}

fn cmd_publish(config: &AppConfig, repo: Option<PathBuf>) -> Result<i32> {
    info!(
        path = %config.publish.path,
        remote = %config.publish.remote,
        branch = %config.publish.branch,
        policy = ?config.publish.on_failure,
        "publishing mirror"
    );

    let report = Publisher::from_config(&config.publish)
        .with_repo_dir(repo)
        .run(&SystemRunner);

    for result in &report.results {
        match &result.status {
            StepStatus::Succeeded => println!("  ok      {}", result.step),
            StepStatus::Failed { code } => println!("  FAILED  {} (exit code {code})", result.step),
            StepStatus::SpawnFailed { message } => {
                println!("  FAILED  {} ({message})", result.step)
            }
        }
    }
    for step in &report.skipped {
        println!("  skipped {step}");
    }

    match report.first_failure() {
        Some(failure) if report.policy == FailurePolicy::Halt => {
            eprintln!(
                "Error: git {} failed with exit code {}",
                failure.step,
                failure.status.code()
            );
        }
        Some(_) => {
            let failed = report
                .results
                .iter()
                .filter(|r| !r.status.is_success())
                .count();
            eprintln!("Warning: {failed} git step(s) failed; continuing (keep-going).");
        }
        None => println!(
            "Published {} to {}/{}.",
            config.publish.path, config.publish.remote, config.publish.branch
        ),
    }

    Ok(report.exit_code())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<i32> {
    let path = match config_path {
        Some(path) => init_config_at(path)?,
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(0)
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<i32> {
    let config = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(0)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl CrawlProgress for CliProgress {
    fn page_saved(&self, url: &str, saved: usize, queued: usize) {
        self.spinner
            .set_message(format!("Saved [{saved}, {queued} queued] {url}"));
    }

    fn page_skipped(&self, url: &str, reason: &str) {
        self.spinner.println(format!("  skipped {url} ({reason})"));
    }

    fn done(&self, _summary: &CrawlSummary) {
        self.spinner.finish_and_clear();
    }
}
