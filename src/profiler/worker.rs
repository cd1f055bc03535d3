//! Worker task loop for profiling runs.
//!
//! Each worker owns its own [`TaskGenerator`] and [`ThrottleWindow`] and
//! loops: throttle, generate a cycle, execute it, append one sample to the
//! shared [`ExecutionLog`]. Command failures are logged and counted; they
//! never stop the loop.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::profiler::config::TargetConfig;
use crate::profiler::error::ExecError;
use crate::profiler::executor::TaskExecutor;
use crate::profiler::log::{ExecutionLog, ExecutionSample};
use crate::profiler::metrics::CycleStats;
use crate::profiler::task::{Cycle, TaskGenerator};
use crate::profiler::throttle::ThrottleWindow;

/// Atomic counter tracking the number of currently running workers.
///
/// Lightweight wrapper around `Arc<AtomicU32>` for clone-friendly sharing
/// across worker tasks and the engine.
#[derive(Clone)]
pub struct ActiveWorkerCounter(Arc<AtomicU32>);

impl ActiveWorkerCounter {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU32::new(0)))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    /// Returns the current number of running workers.
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ActiveWorkerCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a worker shares with the engine and its siblings.
#[derive(Clone)]
pub struct WorkerContext {
    pub target: TargetConfig,
    pub max_ops_per_second: u32,
    pub executor: Arc<dyn TaskExecutor>,
    pub log: ExecutionLog,
    pub stats: CycleStats,
    pub cancel: CancellationToken,
    /// Shared cycle counter; only set when `max_iterations` is.
    pub iteration_counter: Option<Arc<AtomicU64>>,
    pub max_iterations: Option<u64>,
    pub active_workers: ActiveWorkerCounter,
}

/// Main worker loop.
///
/// Runs until the cancellation token fires, the shared iteration limit is
/// reached, or the log is sealed underneath it. The `active_workers`
/// counter is incremented on entry and decremented on every exit path.
pub async fn worker_loop(worker_id: u32, ctx: WorkerContext) {
    ctx.active_workers.increment();
    run_cycles(worker_id, &ctx).await;
    ctx.active_workers.decrement();
    debug!(worker_id, "Worker stopped");
}

async fn run_cycles(worker_id: u32, ctx: &WorkerContext) {
    let mut generator = TaskGenerator::new(ctx.target.clone());
    let mut throttle = ThrottleWindow::new(ctx.max_ops_per_second, Instant::now());

    loop {
        if !throttle.acquire(&ctx.cancel).await {
            return;
        }

        // First limit wins. The slot is claimed before the cycle starts.
        if let (Some(counter), Some(max)) = (&ctx.iteration_counter, ctx.max_iterations) {
            let prev = counter.fetch_add(1, Ordering::Relaxed);
            if prev >= max {
                ctx.cancel.cancel();
                return;
            }
        }

        let cycle = generator.next_cycle();
        if generator.cycles() == 1 {
            for task in cycle.tasks() {
                info!(worker_id, command = %task.render_command(), "Executing");
            }
        }

        let response_time = execute_cycle(worker_id, ctx, &cycle).await;
        debug!(
            worker_id,
            cycle = generator.cycles(),
            seconds = response_time.as_secs_f64(),
            "Completed"
        );

        if !ctx.log.append(ExecutionSample::completed_now(response_time)) {
            debug!(worker_id, "Execution log already flushed, dropping late sample");
            return;
        }
    }
}

/// Execute every task of `cycle` in order and return the summed elapsed
/// time. Later legs run even if an earlier one failed.
async fn execute_cycle(worker_id: u32, ctx: &WorkerContext, cycle: &Cycle) -> Duration {
    let mut total = Duration::ZERO;
    let mut failed = false;

    for task in cycle.tasks() {
        let execution = ctx.executor.execute(task).await;
        total += execution.elapsed;
        trace!(worker_id, stdout = %execution.stdout.trim_end(), "Command output");
        if let Err(err) = &execution.result {
            failed = true;
            ctx.stats.record_error(err.error_category());
            warn!(
                worker_id,
                kind = ?task.kind,
                subject = %task.subject_name,
                "Command failed: {}",
                failure_message(err)
            );
        }
    }

    ctx.stats.record_completed(failed);
    total
}

/// One-line description of a failed command. `NonZeroExit` already
/// carries the child's stderr.
fn failure_message(err: &ExecError) -> String {
    err.to_string().trim_end().to_string()
}
