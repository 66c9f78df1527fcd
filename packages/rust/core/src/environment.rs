//! Python virtual environment for the external crawler engine.
//!
//! The environment is created once and reused; its packages are installed on
//! every bootstrap. The venv interpreter is invoked directly, which has the
//! same effect as activating the environment first.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};
use warpcrawler_shared::BootstrapConfig;

use crate::pipeline::{Stage, StageFailure};
use crate::process::{CommandRunner, CommandSpec};

/// A virtual environment plus the packages it must contain.
#[derive(Debug, Clone)]
pub struct PythonEnv {
    python: String,
    venv_dir: PathBuf,
    packages: Vec<String>,
}

/// Result of a successful bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvReady {
    /// Whether the venv directory was created by this bootstrap.
    pub created: bool,
}

impl PythonEnv {
    /// Environment described by `[bootstrap]`.
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            python: config.python.clone(),
            venv_dir: PathBuf::from(&config.venv_dir),
            packages: config.packages.clone(),
        }
    }

    /// The venv directory.
    pub fn venv_dir(&self) -> &Path {
        &self.venv_dir
    }

    /// The interpreter inside the venv.
    pub fn interpreter(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_dir.join("Scripts").join("python.exe")
        } else {
            self.venv_dir.join("bin").join("python")
        }
    }

    /// Create the venv if it is missing, then install the packages.
    ///
    /// An existing venv directory is never recreated. A non-zero exit from
    /// either step, or a program that cannot be started, is reported as a
    /// [`StageFailure`] for the step that failed.
    #[instrument(skip_all, fields(venv = %self.venv_dir.display()))]
    pub fn ensure(&self, runner: &dyn CommandRunner) -> Result<EnvReady, StageFailure> {
        let created = if self.venv_dir.exists() {
            info!("virtual environment exists, reusing it");
            false
        } else {
            info!(python = %self.python, "creating virtual environment");
            let create = CommandSpec::new(&self.python)
                .args(["-m", "venv"])
                .arg(self.venv_dir.to_string_lossy());
            run_stage(runner, &create, Stage::CreateVenv)?;
            true
        };

        if !self.packages.is_empty() {
            info!(packages = ?self.packages, "installing packages");
            let install = CommandSpec::new(self.interpreter().to_string_lossy())
                .args(["-m", "pip", "install"])
                .args(self.packages.iter().cloned());
            run_stage(runner, &install, Stage::InstallPackages)?;
        }

        Ok(EnvReady { created })
    }
}

/// Run one bootstrap command, attributing any failure to `stage`.
fn run_stage(
    runner: &dyn CommandRunner,
    cmd: &CommandSpec,
    stage: Stage,
) -> Result<(), StageFailure> {
    match runner.run(cmd) {
        Ok(0) => Ok(()),
        Ok(code) => Err(StageFailure::new(stage, code)),
        Err(e) => Err(StageFailure::new(stage, e.exit_code()).with_detail(e.to_string())),
    }
}
