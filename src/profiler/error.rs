//! Error types for the profiler.
//!
//! [`ProfilerError`] covers configuration, secret capture and persistence
//! failures. [`ExecError`] classifies failures of a single external command
//! invocation; those never abort the worker pool.

use std::path::PathBuf;

/// Errors raised while configuring the profiler or persisting its results.
#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    /// TOML parse failure -- the config file contains invalid TOML syntax
    /// or does not match the expected schema.
    #[error("Failed to parse config TOML: {source}")]
    ConfigParse {
        #[from]
        source: toml::de::Error,
    },

    /// The config file could not be read from disk.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigIo {
        source: std::io::Error,
        path: String,
    },

    /// The merged configuration contains an invalid combination of values.
    #[error("Config validation error: {message}")]
    ConfigValidation { message: String },

    /// Reading the secret from piped standard input failed.
    #[error("Failed to read secret from stdin: {source}")]
    SecretIo { source: std::io::Error },

    /// The execution log could not be written to (or read from) disk.
    #[error("Failed to persist execution log to '{}': {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A persisted execution log could not be parsed back.
    #[error("Malformed execution log '{}' at line {line}: {message}", path.display())]
    MalformedLog {
        path: PathBuf,
        line: u64,
        message: String,
    },
}

impl ProfilerError {
    /// Shorthand for a [`ProfilerError::ConfigValidation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}

/// Failure of a single external command invocation.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ExecError {
    /// The shell could not be started.
    #[error("failed to spawn command: {message}")]
    Spawn { message: String },

    /// Writing the secret to the child's stdin or collecting its output failed.
    #[error("i/o error talking to command: {message}")]
    Io { message: String },

    /// The command ran but exited unsuccessfully.
    #[error("command exited with {}: {stderr}", exit_label(*code))]
    NonZeroExit { code: Option<i32>, stderr: String },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl ExecError {
    /// Returns the error category as a static string for failure counting.
    ///
    /// Categories: `"spawn"`, `"io"`, `"exit"`.
    pub fn error_category(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::Io { .. } => "io",
            Self::NonZeroExit { .. } => "exit",
        }
    }
}
