//! Pipeline orchestration for warpcrawler.
//!
//! This crate ties the crawler and external tooling together into the two
//! operator workflows:
//! - [`pipeline`] — bootstrap-and-crawl with the exit-code contract
//! - [`publish`] — the git publish sequence
//!
//! External programs run through [`process::CommandRunner`]; the Python
//! environment used by the external engine lives in [`environment`].

pub mod environment;
pub mod pipeline;
pub mod process;
pub mod publish;

pub use environment::{EnvReady, PythonEnv};
pub use pipeline::{
    CrawlOutcome, CrawlRequest, Engine, Stage, StageFailure, expected_entry, run_external,
    run_native,
};
pub use process::{CommandRunner, CommandSpec, SPAWN_FAILURE_EXIT_CODE, SystemRunner};
pub use publish::{GitStep, PublishReport, Publisher, StepResult, StepStatus};
