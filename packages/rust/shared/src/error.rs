//! Error types for warpcrawler.
//!
//! Library crates use [`WarpError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all warpcrawler operations.
#[derive(Debug, thiserror::Error)]
pub enum WarpError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during a crawl.
    #[error("network error: {0}")]
    Network(String),

    /// The requested start URL does not belong to the configured snapshot.
    #[error("start URL is not within the snapshot {prefix}: {url}")]
    Snapshot { url: String, prefix: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An external program could not be spawned or waited on.
    #[error("failed to run {program}: {message}")]
    Process { program: String, message: String },

    /// Data validation error (bad timestamp, malformed URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WarpError>;

impl WarpError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a process error for `program`.
    pub fn process(program: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Process {
            program: program.into(),
            message: msg.into(),
        }
    }

    /// Exit code reported to the shell when this error aborts a crawl.
    ///
    /// Spawn failures use 127, the conventional "command not found" code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Process { .. } => 127,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = WarpError::config("missing [snapshot] section");
        assert_eq!(err.to_string(), "config error: missing [snapshot] section");

        let err = WarpError::validation("timestamp must be 14 digits");
        assert!(err.to_string().contains("14 digits"));
    }

    #[test]
    fn snapshot_error_names_prefix() {
        let err = WarpError::Snapshot {
            url: "https://example.com/".into(),
            prefix: "https://web.archive.org/web/20250408214013".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("not within the snapshot"));
        assert!(msg.contains("20250408214013"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn process_error_exit_code() {
        let err = WarpError::process("git", "No such file or directory");
        assert_eq!(err.exit_code(), 127);
        assert_eq!(err.to_string(), "failed to run git: No such file or directory");
    }
}
