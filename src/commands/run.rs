//! `pc-profiler run` command implementation.

use anyhow::{Context, Result};
use clap::Args;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use pc_profiler::profiler::config::{ProfilerConfig, TaskMode};
use pc_profiler::profiler::engine::ProfilerEngine;
use pc_profiler::profiler::executor::ShellExecutor;
use pc_profiler::profiler::persist::CsvPersister;
use pc_profiler::profiler::secret::capture_stdin_secret;
use pc_profiler::profiler::summary::render_run_summary;

/// Flags for `pc-profiler run`. Every flag overrides the config file.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Path to a TOML config file
    #[arg(long, env = "PC_PROFILER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers [default: 1]
    #[arg(long, alias = "maxThreads")]
    pub max_workers: Option<u32>,

    /// Maximum cycles per second, per worker [default: 1]
    #[arg(long, alias = "maxQueriesPerSec")]
    pub max_qps: Option<u32>,

    /// Task mode: addpkg, addpkg+call, call, balanceQuery, qrender [default: call]
    #[arg(long)]
    pub mode: Option<TaskMode>,

    /// Package name (random per cycle when unset)
    #[arg(long)]
    pub package: Option<String>,

    /// Function to call [default: Main]
    #[arg(long)]
    pub function: Option<String>,

    /// Remote RPC endpoint [default: localhost:26657]
    #[arg(long, env = "PC_PROFILER_REMOTE")]
    pub remote: Option<String>,

    /// Signing key name [default: Dev]
    #[arg(long)]
    pub keyname: Option<String>,

    /// Package source directory for addpkg [default: .]
    #[arg(long)]
    pub pkgdir: Option<String>,

    /// Chain id [default: dev]
    #[arg(long)]
    pub chainid: Option<String>,

    /// Client binary to invoke [default: gnokey]
    #[arg(long, env = "PC_PROFILER_CLIENT")]
    pub client: Option<String>,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// Stop after this many cycles across all workers
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Rewrite the CSV every N seconds while running
    #[arg(long)]
    pub checkpoint_interval: Option<u64>,

    /// Seconds to wait for in-flight cycles after a stop [default: 5]
    #[arg(long)]
    pub drain_grace: Option<u64>,

    /// Output CSV path [default: pc_profiler.csv]
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Do not print the summary after the run
    #[arg(long)]
    pub no_summary: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Execute the `run` command.
///
/// Loads config (file or defaults), applies CLI overrides, validates the
/// result, captures the key password from piped stdin, then runs the
/// engine and prints the summary.
pub async fn execute_run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            ProfilerConfig::load(path)
                .with_context(|| format!("Failed to load config '{}'", path.display()))?
        },
        None => ProfilerConfig::default(),
    };

    apply_overrides(&mut config, &args);
    config.normalize();
    config.validate().context("Invalid configuration")?;

    let secret = capture_stdin_secret()?;
    let executor = Arc::new(ShellExecutor::new(secret));
    let persister = Arc::new(CsvPersister::new(config.run.output.clone()));
    let engine = ProfilerEngine::new(config, executor, persister);

    let result = engine.run().await;

    if args.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
    if !args.no_summary {
        println!("{}", render_run_summary(&result, engine.config()));
    }

    // A failed write is already logged; the run itself still completed.
    Ok(())
}

/// Apply CLI flag overrides to a loaded config.
fn apply_overrides(config: &mut ProfilerConfig, args: &RunArgs) {
    if let Some(n) = args.max_workers {
        config.pool.max_workers = n;
    }
    if let Some(n) = args.max_qps {
        config.pool.max_ops_per_second = n;
    }

    let target = &mut config.target;
    if let Some(mode) = args.mode {
        target.mode = mode;
    }
    if let Some(package) = &args.package {
        target.subject_name = Some(package.clone());
    }
    if let Some(function) = &args.function {
        target.operation_name = Some(function.clone());
    }
    if let Some(remote) = &args.remote {
        target.endpoint = remote.clone();
    }
    if let Some(keyname) = &args.keyname {
        target.credential_holder = keyname.clone();
    }
    if let Some(pkgdir) = &args.pkgdir {
        target.source_directory = pkgdir.clone();
    }
    if let Some(chainid) = &args.chainid {
        target.network_id = chainid.clone();
    }
    if let Some(client) = &args.client {
        target.client = client.clone();
    }

    let run = &mut config.run;
    if args.duration.is_some() {
        run.duration_secs = args.duration;
    }
    if args.iterations.is_some() {
        run.iterations = args.iterations;
    }
    if args.checkpoint_interval.is_some() {
        run.checkpoint_interval_secs = args.checkpoint_interval;
    }
    if let Some(grace) = args.drain_grace {
        run.drain_grace_secs = grace;
    }
    if let Some(output) = &args.output {
        run.output = output.clone();
    }
}
