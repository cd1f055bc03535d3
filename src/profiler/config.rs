//! Typed profiler configuration.
//!
//! A configuration is assembled from an optional TOML file and CLI flag
//! overrides, then validated once before any worker starts. Every field has
//! a default, so an empty file (or no file at all) is a valid starting point.
//!
//! # Example TOML
//!
//! ```toml
//! [pool]
//! max_workers = 4
//! # Per worker, not global: 4 workers x 2 ops/s = 8 ops/s aggregate.
//! max_ops_per_second = 2
//!
//! [target]
//! mode = "addpkg+call"
//! operation_name = "Render"
//! endpoint = "localhost:26657"
//! credential_holder = "Dev"
//! source_directory = "./counter"
//! network_id = "dev"
//!
//! [run]
//! duration_secs = 300
//! checkpoint_interval_secs = 30
//! output = "pc_profiler.csv"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::profiler::error::ProfilerError;

/// Network identifier assumed when none is configured.
pub const DEFAULT_NETWORK_ID: &str = "dev";

/// Package source directory assumed when none is configured.
pub const DEFAULT_SOURCE_DIRECTORY: &str = ".";

/// File the execution log is persisted to unless overridden.
pub const DEFAULT_OUTPUT_FILE: &str = "pc_profiler.csv";

/// What each worker cycle does against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub enum TaskMode {
    /// Register (deploy) a package under a fresh or pinned name.
    #[serde(rename = "addpkg")]
    Register,
    /// Call a function on an already registered package.
    #[default]
    #[serde(rename = "call")]
    Invoke,
    /// Register a package, then call into it, as one measured cycle.
    #[serde(rename = "addpkg+call")]
    RegisterAndInvoke,
    /// Query a fixed account balance.
    #[serde(rename = "balanceQuery")]
    BalanceQuery,
    /// Query a package's rendered output.
    #[serde(rename = "qrender")]
    RenderQuery,
}

impl TaskMode {
    /// All modes, in CLI help order.
    pub const ALL: [TaskMode; 5] = [
        TaskMode::Register,
        TaskMode::RegisterAndInvoke,
        TaskMode::Invoke,
        TaskMode::BalanceQuery,
        TaskMode::RenderQuery,
    ];

    /// The CLI / TOML spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "addpkg",
            Self::Invoke => "call",
            Self::RegisterAndInvoke => "addpkg+call",
            Self::BalanceQuery => "balanceQuery",
            Self::RenderQuery => "qrender",
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskMode {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(TaskMode::as_str).collect();
                ProfilerError::validation(format!(
                    "Unknown mode '{s}'; expected one of: {}",
                    names.join(", ")
                ))
            })
    }
}

/// Top-level profiler configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Worker pool sizing and throttling.
    pub pool: PoolConfig,
    /// What to run and where.
    pub target: TargetConfig,
    /// Stop conditions and output.
    pub run: RunSettings,
}

/// Worker pool sizing. Immutable once the engine starts.
///
/// The rate cap applies to each worker independently. The pool as a whole
/// can therefore complete up to `max_workers * max_ops_per_second`
/// operations per second; see [`PoolConfig::aggregate_ceiling`].
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent workers (fixed for the whole run).
    pub max_workers: u32,
    /// Maximum operations each worker starts per one-second window.
    pub max_ops_per_second: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            max_ops_per_second: 1,
        }
    }
}

impl PoolConfig {
    /// Aggregate operations-per-second ceiling across all workers.
    pub fn aggregate_ceiling(&self) -> u64 {
        u64::from(self.max_workers) * u64::from(self.max_ops_per_second)
    }
}

/// Target endpoint and task parameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TargetConfig {
    /// Client binary invoked for every task.
    pub client: String,
    /// Task mode.
    pub mode: TaskMode,
    /// Package name; a random one is generated per cycle when unset.
    pub subject_name: Option<String>,
    /// Function to call; `Main` when unset.
    pub operation_name: Option<String>,
    /// Remote RPC endpoint.
    pub endpoint: String,
    /// Name of the signing key.
    pub credential_holder: String,
    /// Package source directory for registration.
    pub source_directory: String,
    /// Chain identifier.
    pub network_id: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            client: "gnokey".to_string(),
            mode: TaskMode::default(),
            subject_name: None,
            operation_name: None,
            endpoint: "localhost:26657".to_string(),
            credential_holder: "Dev".to_string(),
            source_directory: DEFAULT_SOURCE_DIRECTORY.to_string(),
            network_id: DEFAULT_NETWORK_ID.to_string(),
        }
    }
}

/// Stop conditions, checkpointing and output location.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunSettings {
    /// Stop after this many seconds. Runs until interrupted when unset.
    pub duration_secs: Option<u64>,
    /// Stop after this many cycles across all workers.
    pub iterations: Option<u64>,
    /// Persist the log every N seconds while running.
    pub checkpoint_interval_secs: Option<u64>,
    /// How long to wait for in-flight cycles after a stop request.
    pub drain_grace_secs: u64,
    /// CSV file the execution log is written to.
    pub output: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            duration_secs: None,
            iterations: None,
            checkpoint_interval_secs: None,
            drain_grace_secs: 5,
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }
}

impl RunSettings {
    /// Run duration, if bounded.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    /// Checkpoint interval, if enabled.
    pub fn checkpoint_interval(&self) -> Option<Duration> {
        self.checkpoint_interval_secs.map(Duration::from_secs)
    }

    /// Drain grace period as a [`Duration`].
    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }
}

impl ProfilerConfig {
    /// Parse a TOML string into a validated [`ProfilerConfig`].
    pub fn from_toml(content: &str) -> Result<Self, ProfilerError> {
        let mut config: Self = toml::from_str(content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load a [`ProfilerConfig`] from a file path without validating it.
    ///
    /// CLI overrides are usually applied on top, so validation is left to
    /// the caller once the final values are known.
    pub fn load(path: &Path) -> Result<Self, ProfilerError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProfilerError::ConfigIo {
            source,
            path: path.display().to_string(),
        })?;
        let mut config: Self = toml::from_str(&content)?;
        config.normalize();
        Ok(config)
    }

    /// Treat empty names as unset.
    pub fn normalize(&mut self) {
        if self.target.subject_name.as_deref() == Some("") {
            self.target.subject_name = None;
        }
        if self.target.operation_name.as_deref() == Some("") {
            self.target.operation_name = None;
        }
    }

    /// Validate the merged configuration.
    ///
    /// Checks:
    /// - pool sizing and rate cap are at least 1
    /// - `addpkg` takes no function name
    /// - `call` requires a package name
    /// - `balanceQuery` takes no package, no function and the default pkgdir
    /// - `qrender` requires a package name and the default chain id
    pub fn validate(&self) -> Result<(), ProfilerError> {
        if self.pool.max_workers == 0 {
            return Err(ProfilerError::validation("max_workers must be at least 1"));
        }
        if self.pool.max_ops_per_second == 0 {
            return Err(ProfilerError::validation(
                "max_ops_per_second must be at least 1",
            ));
        }
        if self.target.client.trim().is_empty() {
            return Err(ProfilerError::validation("client binary must not be empty"));
        }

        let target = &self.target;
        match target.mode {
            TaskMode::Register => {
                if target.operation_name.is_some() {
                    return Err(ProfilerError::validation(
                        "function argument should not be provided in addpkg mode",
                    ));
                }
            }
            TaskMode::Invoke => {
                if target.subject_name.is_none() {
                    return Err(ProfilerError::validation(
                        "package argument must be specified in call mode",
                    ));
                }
            }
            TaskMode::RegisterAndInvoke => {}
            TaskMode::BalanceQuery => {
                if target.subject_name.is_some() {
                    return Err(ProfilerError::validation(
                        "cannot specify package in balanceQuery mode",
                    ));
                }
                if target.operation_name.is_some() {
                    return Err(ProfilerError::validation(
                        "cannot specify function in balanceQuery mode",
                    ));
                }
                if target.source_directory != DEFAULT_SOURCE_DIRECTORY {
                    return Err(ProfilerError::validation(
                        "cannot specify pkgdir in balanceQuery mode",
                    ));
                }
            }
            TaskMode::RenderQuery => {
                if target.subject_name.is_none() {
                    return Err(ProfilerError::validation(
                        "package must be specified in qrender mode",
                    ));
                }
                if target.network_id != DEFAULT_NETWORK_ID {
                    return Err(ProfilerError::validation(
                        "chain id cannot be specified in qrender mode",
                    ));
                }
            }
        }

        if self.run.checkpoint_interval_secs == Some(0) {
            return Err(ProfilerError::validation(
                "checkpoint_interval_secs must be greater than 0",
            ));
        }

        Ok(())
    }
}
