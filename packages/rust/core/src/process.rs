//! External process invocation.
//!
//! Every external program (python, pip, the external crawler, git) is run
//! through [`CommandRunner`], so pipelines can be exercised with a scripted
//! runner instead of real binaries.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};
use warpcrawler_shared::{Result, WarpError};

/// Exit code reported when a program cannot be spawned at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Positional arguments, passed verbatim.
    pub args: Vec<String>,
    /// Working directory, if not the current one.
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Start a command for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run inside `dir`.
    pub fn current_dir(mut self, dir: Option<&Path>) -> Self {
        self.current_dir = dir.map(Path::to_path_buf);
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Runs external programs to completion and reports their exit code.
pub trait CommandRunner: Send + Sync {
    /// Run `cmd`, blocking until it exits.
    ///
    /// A non-zero exit is a normal `Ok` value; `Err` means the program could
    /// not be started or waited on.
    fn run(&self, cmd: &CommandSpec) -> Result<i32>;
}

/// Runs commands as real child processes with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<i32> {
        info!(command = %cmd, "running");

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &cmd.current_dir {
            command.current_dir(dir);
        }

        let status = command
            .status()
            .map_err(|e| WarpError::process(&cmd.program, e.to_string()))?;

        // No code means the child was killed by a signal
        let code = status.code().unwrap_or(-1);
        debug!(command = %cmd, code, "exited");
        Ok(code)
    }
}
