//! `pc-profiler summarize` command implementation.

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::Path;

use pc_profiler::profiler::persist::read_samples;
use pc_profiler::profiler::summary::render_file_summary;

/// Read a CSV log written by `run` and print its latency summary.
pub fn execute_summarize(file: &Path, no_color: bool) -> Result<()> {
    let samples = read_samples(file)
        .with_context(|| format!("Failed to read execution log '{}'", file.display()))?;

    if no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
    println!("{}", render_file_summary(file, &samples));
    Ok(())
}
