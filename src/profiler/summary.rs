//! Terminal summary of a profiling run or a persisted execution log.
//!
//! Both renderers are pure: they take structured data and return a
//! `String`. Colors come from the `colored` crate and honor the global
//! override set with `colored::control::set_override(false)` when
//! `--no-color` is active or stdout is not a terminal.
//!
//! ```text
//!    .-----.    |  pc-profiler
//!   /   |   \   |
//!  |    o--  |  |  mode:      call
//!   \       /   |  remote:    localhost:26657
//!    '-----'    |  workers:   4 x 1 ops/s (4 ops/s ceiling)
//!
//!   cycle_duration..........................: p50=1520ms  p95=1710ms  p99=1802ms
//!   cycle_duration_range....................: min=1390ms  mean=1531.4ms  max=1830ms
//!   cycles_recorded.........................: 238
//!   cycles_failed...........................: 2
//!   cycle_failure_rate......................: 0.8%
//!   cycle_throughput........................: 3.9 cycles/s
//!   run_elapsed.............................: 60.2s
//!   output..................................: pc_profiler.csv
//!
//!   errors:
//!     exit..................................: 2
//! ```

use chrono::{DateTime, Utc};
use colored::Colorize;
use std::path::Path;
use std::time::Duration;

use crate::profiler::config::ProfilerConfig;
use crate::profiler::engine::ProfileResult;
use crate::profiler::log::ExecutionSample;
use crate::profiler::metrics::{LatencyRecorder, LatencySnapshot};

/// Width for dotted metric row padding.
const PAD_WIDTH: usize = 40;

/// Render the summary printed after a run.
pub fn render_run_summary(result: &ProfileResult, config: &ProfilerConfig) -> String {
    let pool = &config.pool;
    let mut lines = vec![render_header(&[
        ("mode", config.target.mode.to_string()),
        ("remote", config.target.endpoint.clone()),
        (
            "workers",
            format!(
                "{} x {} ops/s ({} ops/s ceiling)",
                pool.max_workers,
                pool.max_ops_per_second,
                pool.aggregate_ceiling()
            ),
        ),
    ])];

    push_latency_rows(&mut lines, &result.snapshot);

    let recorded = result.samples.len() as u64;
    lines.push(format_metric_row(
        "cycles_recorded",
        &recorded.to_string().green().to_string(),
        PAD_WIDTH,
    ));

    let failed_str = if result.failed_cycles > 0 {
        result.failed_cycles.to_string().red().to_string()
    } else {
        result.failed_cycles.to_string()
    };
    lines.push(format_metric_row("cycles_failed", &failed_str, PAD_WIDTH));

    let failure_pct = if result.completed_cycles > 0 {
        result.failed_cycles as f64 / result.completed_cycles as f64 * 100.0
    } else {
        0.0
    };
    let failure_str = format!("{failure_pct:.1}%");
    let failure_colored = if failure_pct > 5.0 {
        failure_str.red().to_string()
    } else if failure_pct > 1.0 {
        failure_str.yellow().to_string()
    } else {
        failure_str.green().to_string()
    };
    lines.push(format_metric_row(
        "cycle_failure_rate",
        &failure_colored,
        PAD_WIDTH,
    ));

    lines.push(throughput_row(recorded, result.elapsed));
    lines.push(format_metric_row(
        "run_elapsed",
        &format!("{:.1}s", result.elapsed.as_secs_f64()),
        PAD_WIDTH,
    ));

    if result.abandoned_workers > 0 {
        lines.push(format_metric_row(
            "cycles_abandoned",
            &result.abandoned_workers.to_string().yellow().to_string(),
            PAD_WIDTH,
        ));
    }

    let output_str = match &result.flush {
        Ok(_) => result.output.clone(),
        Err(_) => format!("{} (write failed)", result.output).red().to_string(),
    };
    lines.push(format_metric_row("output", &output_str, PAD_WIDTH));

    if !result.error_categories.is_empty() {
        lines.push(String::new());
        lines.push("  errors:".to_string());
        for (category, count) in &result.error_categories {
            lines.push(format_metric_row(
                &format!("    {category}"),
                &count.to_string().red().to_string(),
                PAD_WIDTH,
            ));
        }
    }

    lines.join("\n")
}

/// Render the summary of a persisted execution log.
pub fn render_file_summary(path: &Path, samples: &[ExecutionSample]) -> String {
    let mut lines = vec![render_header(&[
        ("file", path.display().to_string()),
        ("samples", samples.len().to_string()),
    ])];

    let snapshot = LatencyRecorder::from_samples(samples).snapshot();
    push_latency_rows(&mut lines, &snapshot);

    let span = recorded_span(samples);
    lines.push(format_metric_row(
        "cycles_recorded",
        &samples.len().to_string(),
        PAD_WIDTH,
    ));
    lines.push(throughput_row(samples.len() as u64, span));
    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        lines.push(format_metric_row(
            "first_completed",
            &format_instant(&first.timestamp),
            PAD_WIDTH,
        ));
        lines.push(format_metric_row(
            "last_completed",
            &format_instant(&last.timestamp),
            PAD_WIDTH,
        ));
    }

    lines.join("\n")
}

/// Time between the first and last recorded completion.
fn recorded_span(samples: &[ExecutionSample]) -> Duration {
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}

fn format_instant(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn push_latency_rows(lines: &mut Vec<String>, snap: &LatencySnapshot) {
    let latency_value = format!("p50={}ms  p95={}ms  p99={}ms", snap.p50, snap.p95, snap.p99);
    let latency_colored = if snap.p99 < 5000 {
        latency_value.green().to_string()
    } else {
        latency_value.yellow().to_string()
    };
    lines.push(format_metric_row("cycle_duration", &latency_colored, PAD_WIDTH));
    lines.push(format_metric_row(
        "cycle_duration_range",
        &format!("min={}ms  mean={:.1}ms  max={}ms", snap.min, snap.mean, snap.max),
        PAD_WIDTH,
    ));
}

fn throughput_row(count: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let throughput = if secs > 0.0 { count as f64 / secs } else { 0.0 };
    format_metric_row(
        "cycle_throughput",
        &format!("{throughput:.1} cycles/s").green().to_string(),
        PAD_WIDTH,
    )
}

/// Render the stopwatch header with up to three detail rows.
fn render_header(details: &[(&str, String)]) -> String {
    const ART: [&str; 5] = [
        "   .-----.   ",
        "  /   |   \\  ",
        " |    o--  | ",
        "  \\       /  ",
        "   '-----'   ",
    ];

    let mut text: Vec<String> = vec!["pc-profiler".bold().to_string(), String::new()];
    for (label, value) in details {
        let label = format!("{label}:");
        text.push(format!("{label:<11}{value}"));
    }

    let mut out = String::from("\n");
    for (i, art) in ART.iter().enumerate() {
        let detail = text.get(i).map(String::as_str).unwrap_or("");
        out.push_str(format!("{art} |  {detail}").trim_end());
        out.push('\n');
    }
    out
}

/// Format a single metric row with dot-padding.
///
/// Produces: `"  metric_name..................: value_string"`
fn format_metric_row(name: &str, value: &str, pad_width: usize) -> String {
    format!("  {name:.<pad_width$}: {value}")
}
