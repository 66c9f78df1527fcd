//! Publish a mirror directory to a git remote.
//!
//! The sequence is fixed: identity, stage, commit, rename branch, push with
//! upstream set. Under [`FailurePolicy::Halt`] it stops at the first failing
//! step; under [`FailurePolicy::KeepGoing`] every step is attempted and the
//! run is reported as successful regardless.

use std::fmt;
use std::path::PathBuf;

use tracing::{info, instrument, warn};
use warpcrawler_shared::{FailurePolicy, PublishConfig};

use crate::process::{CommandRunner, CommandSpec, SPAWN_FAILURE_EXIT_CODE};

/// One git invocation of the publish sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitStep {
    /// `git config user.name <name>`
    SetUserName(String),
    /// `git config user.email <email>`
    SetUserEmail(String),
    /// `git add <path>`
    Stage(String),
    /// `git commit -m <message>`
    Commit(String),
    /// `git branch -M <branch>`
    RenameBranch(String),
    /// `git push -u <remote> <branch> [--force]`
    Push {
        remote: String,
        branch: String,
        force: bool,
    },
}

impl GitStep {
    /// Arguments passed to `git`.
    pub fn args(&self) -> Vec<String> {
        fn owned(parts: &[&str]) -> Vec<String> {
            parts.iter().map(|s| s.to_string()).collect()
        }

        match self {
            Self::SetUserName(name) => owned(&["config", "user.name", name.as_str()]),
            Self::SetUserEmail(email) => owned(&["config", "user.email", email.as_str()]),
            Self::Stage(path) => owned(&["add", path.as_str()]),
            Self::Commit(message) => owned(&["commit", "-m", message.as_str()]),
            Self::RenameBranch(branch) => owned(&["branch", "-M", branch.as_str()]),
            Self::Push {
                remote,
                branch,
                force,
            } => {
                let mut args = owned(&["push", "-u", remote.as_str(), branch.as_str()]);
                if *force {
                    args.push("--force".into());
                }
                args
            }
        }
    }

    /// Short name for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetUserName(_) => "set user.name",
            Self::SetUserEmail(_) => "set user.email",
            Self::Stage(_) => "stage",
            Self::Commit(_) => "commit",
            Self::RenameBranch(_) => "rename branch",
            Self::Push { .. } => "push",
        }
    }
}

impl fmt::Display for GitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a single step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// git exited 0.
    Succeeded,
    /// git exited non-zero.
    Failed { code: i32 },
    /// git could not be started.
    SpawnFailed { message: String },
}

impl StepStatus {
    /// Exit code equivalent of this status.
    pub fn code(&self) -> i32 {
        match self {
            Self::Succeeded => 0,
            Self::Failed { code } => *code,
            Self::SpawnFailed { .. } => SPAWN_FAILURE_EXIT_CODE,
        }
    }

    /// Whether git exited 0.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Outcome of one attempted step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub step: GitStep,
    pub status: StepStatus,
}

/// Outcome of the whole sequence.
#[derive(Debug, Clone)]
pub struct PublishReport {
    /// Policy the sequence ran under.
    pub policy: FailurePolicy,
    /// Attempted steps, in order.
    pub results: Vec<StepResult>,
    /// Steps never attempted because the sequence halted.
    pub skipped: Vec<GitStep>,
}

impl PublishReport {
    /// First step that did not succeed.
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.results.iter().find(|r| !r.status.is_success())
    }

    /// Whether every step succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.first_failure().is_none()
    }

    /// Process exit code: the first failing step's code under `halt`,
    /// always 0 under `keep-going`.
    pub fn exit_code(&self) -> i32 {
        match self.policy {
            FailurePolicy::KeepGoing => 0,
            FailurePolicy::Halt => self.first_failure().map_or(0, |r| r.status.code()),
        }
    }
}

/// The git publish sequence for one mirror directory.
#[derive(Debug, Clone)]
pub struct Publisher {
    git: String,
    repo_dir: Option<PathBuf>,
    policy: FailurePolicy,
    steps: Vec<GitStep>,
}

impl Publisher {
    /// Sequence described by `[publish]`.
    pub fn from_config(config: &PublishConfig) -> Self {
        let steps = vec![
            GitStep::SetUserName(config.user_name.clone()),
            GitStep::SetUserEmail(config.user_email.clone()),
            GitStep::Stage(config.path.clone()),
            GitStep::Commit(config.message.clone()),
            GitStep::RenameBranch(config.branch.clone()),
            GitStep::Push {
                remote: config.remote.clone(),
                branch: config.branch.clone(),
                force: config.force,
            },
        ];

        Self {
            git: "git".into(),
            repo_dir: None,
            policy: config.on_failure,
            steps,
        }
    }

    /// Run git inside `dir` instead of the current directory.
    pub fn with_repo_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.repo_dir = dir;
        self
    }

    /// Override the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a different git executable.
    pub fn with_git(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[GitStep] {
        &self.steps
    }

    /// Run the sequence.
    #[instrument(skip_all, fields(policy = ?self.policy))]
    pub fn run(&self, runner: &dyn CommandRunner) -> PublishReport {
        let mut results = Vec::with_capacity(self.steps.len());
        let mut skipped = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            let cmd = CommandSpec::new(&self.git)
                .args(step.args())
                .current_dir(self.repo_dir.as_deref());

            let status = match runner.run(&cmd) {
                Ok(0) => StepStatus::Succeeded,
                Ok(code) => StepStatus::Failed { code },
                Err(e) => StepStatus::SpawnFailed {
                    message: e.to_string(),
                },
            };

            let failed = !status.is_success();
            if failed {
                warn!(step = %step, code = status.code(), "git step failed");
            } else {
                info!(step = %step, "git step done");
            }
            results.push(StepResult {
                step: step.clone(),
                status,
            });

            if failed && self.policy == FailurePolicy::Halt {
                skipped.extend(self.steps[index + 1..].iter().cloned());
                break;
            }
        }

        PublishReport {
            policy: self.policy,
            results,
            skipped,
        }
    }
}
