//! pc-profiler: throughput profiler for a CLI-driven blockchain client.
//!
//! Drives the client binary from a fixed pool of rate-limited workers,
//! records one latency sample per cycle and writes them to CSV on exit.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// Rate-limited throughput profiler for a blockchain client CLI
#[derive(Parser)]
#[command(name = "pc-profiler")]
#[command(about = "Profile transaction and query throughput of a blockchain client", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the profiler until interrupted or a stop condition is reached
    ///
    /// Spawns a fixed pool of workers, each starting at most --max-qps
    /// cycles per second. The pool as a whole can therefore reach
    /// --max-workers x --max-qps cycles per second. Samples are written to
    /// the output CSV once, at shutdown.
    Run(commands::run::RunArgs),

    /// Print latency statistics for a previously written CSV log
    Summarize {
        /// Path to the CSV log
        file: std::path::PathBuf,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute_command(cli.command)
}

fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::run::execute_run(args))?;
        },
        Commands::Summarize { file, no_color } => {
            commands::summarize::execute_summarize(&file, no_color)?;
        },
    }
    Ok(())
}

/// Log to stderr so the summary on stdout stays machine-friendly.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "pc_profiler=debug"
    } else {
        "pc_profiler=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
