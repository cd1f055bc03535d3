//! Profiling engine with a fixed worker pool and a single guaranteed flush.
//!
//! [`ProfilerEngine`] is the top-level orchestrator that:
//! - Spawns exactly `max_workers` worker tasks via [`TaskTracker`]
//! - Stops on the first of: run duration, iteration limit, stop signal
//! - Optionally checkpoints the execution log while running
//! - Drains in-flight cycles for up to the grace period, then seals and
//!   flushes the log exactly once
//!
//! Workers are never spawned after start, so at most `max_workers` cycles
//! are ever in flight.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::profiler::config::ProfilerConfig;
use crate::profiler::error::ProfilerError;
use crate::profiler::executor::TaskExecutor;
use crate::profiler::log::{ExecutionLog, ExecutionSample, FlushOutcome};
use crate::profiler::metrics::{CycleStats, LatencyRecorder, LatencySnapshot};
use crate::profiler::persist::LogPersister;
use crate::profiler::shutdown::ShutdownSignal;
use crate::profiler::worker::{worker_loop, ActiveWorkerCounter, WorkerContext};

/// Top-level profiling engine.
pub struct ProfilerEngine {
    config: ProfilerConfig,
    executor: Arc<dyn TaskExecutor>,
    persister: Arc<dyn LogPersister>,
    log: ExecutionLog,
}

/// Outcome of a completed profiling run.
#[derive(Debug)]
pub struct ProfileResult {
    /// Every sample recorded before the final flush, in completion order.
    pub samples: Vec<ExecutionSample>,
    /// Latency statistics over `samples`.
    pub snapshot: LatencySnapshot,
    /// Cycles that finished executing, including ones whose sample arrived
    /// too late to be recorded.
    pub completed_cycles: u64,
    /// Cycles with at least one failed command.
    pub failed_cycles: u64,
    /// Failed commands by error category, largest first.
    pub error_categories: Vec<(String, u64)>,
    /// Wall-clock time from start to final flush.
    pub elapsed: Duration,
    /// Workers still busy when the log was flushed; their cycles are abandoned.
    pub abandoned_workers: u32,
    /// Result of the final flush.
    pub flush: Result<FlushOutcome, ProfilerError>,
    /// Where the log was written.
    pub output: String,
}

impl ProfileResult {
    pub fn flush_succeeded(&self) -> bool {
        self.flush.is_ok()
    }
}

impl ProfilerEngine {
    pub fn new(
        config: ProfilerConfig,
        executor: Arc<dyn TaskExecutor>,
        persister: Arc<dyn LogPersister>,
    ) -> Self {
        Self {
            config,
            executor,
            persister,
            log: ExecutionLog::new(),
        }
    }

    /// Set the cycle limit across all workers.
    pub fn with_iterations(mut self, n: u64) -> Self {
        self.config.run.iterations = Some(n);
        self
    }

    /// Set the run duration (whole seconds).
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.config.run.duration_secs = Some(duration.as_secs());
        self
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Handle to the shared execution log.
    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    /// Run until a stop condition or SIGINT/SIGTERM.
    pub async fn run(&self) -> ProfileResult {
        let shutdown = ShutdownSignal::new();
        let listener = shutdown.start_signal_listener();
        let result = self.run_until(shutdown).await;
        listener.abort();
        result
    }

    /// Run until a stop condition or a stop request on `shutdown`.
    pub async fn run_until(&self, shutdown: ShutdownSignal) -> ProfileResult {
        let pool = self.config.pool;
        let cancel = shutdown.token();
        let tracker = TaskTracker::new();
        let active_workers = ActiveWorkerCounter::new();
        let stats = CycleStats::new();

        info!(
            workers = pool.max_workers,
            per_worker_ops = pool.max_ops_per_second,
            aggregate_ceiling = pool.aggregate_ceiling(),
            mode = %self.config.target.mode,
            "Starting profiler ({} ops/s aggregate ceiling)",
            pool.aggregate_ceiling()
        );

        let ctx = WorkerContext {
            target: self.config.target.clone(),
            max_ops_per_second: pool.max_ops_per_second,
            executor: self.executor.clone(),
            log: self.log.clone(),
            stats: stats.clone(),
            cancel: cancel.clone(),
            iteration_counter: self
                .config
                .run
                .iterations
                .map(|_| Arc::new(AtomicU64::new(0))),
            max_iterations: self.config.run.iterations,
            active_workers: active_workers.clone(),
        };

        let start = Instant::now();
        for worker_id in 0..pool.max_workers {
            tracker.spawn(worker_loop(worker_id, ctx.clone()));
        }
        tracker.close();

        self.wait_for_stop(&shutdown).await;
        cancel.cancel();

        let grace = self.config.run.drain_grace();
        let drained = tokio::select! {
            _ = tracker.wait() => true,
            _ = tokio::time::sleep(grace) => false,
            _ = shutdown.forced() => false,
        };
        let abandoned_workers = active_workers.get();
        if !drained {
            warn!(
                abandoned = abandoned_workers,
                "Drain did not finish; flushing without in-flight cycles"
            );
        }

        let elapsed = start.elapsed();
        let output = self.persister.location();
        let flush = self.log.seal_and_flush(self.persister.as_ref());
        match &flush {
            Ok(FlushOutcome::Written { rows }) => {
                info!(rows, output = %output, "Execution log written")
            }
            Ok(FlushOutcome::AlreadyFlushed) => debug!("Execution log was already flushed"),
            Err(e) => error!("{e}"),
        }

        let samples = self.log.snapshot();
        let snapshot = LatencyRecorder::from_samples(&samples).snapshot();

        ProfileResult {
            samples,
            snapshot,
            completed_cycles: stats.completed(),
            failed_cycles: stats.failed(),
            error_categories: stats.error_categories(),
            elapsed,
            abandoned_workers,
            flush,
            output,
        }
    }

    /// Block until the first stop condition, checkpointing along the way.
    async fn wait_for_stop(&self, shutdown: &ShutdownSignal) {
        let cancel = shutdown.token();
        // A limit too far out to represent as an instant never fires.
        let deadline = self
            .config
            .run
            .duration()
            .and_then(|d| Instant::now().checked_add(d));
        let mut checkpoints = self.config.run.checkpoint_interval().and_then(|period| {
            let first = Instant::now().checked_add(period)?;
            let mut interval = tokio::time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(interval)
        });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep_until_deadline(deadline) => {
                    info!("Run duration elapsed");
                    return;
                }
                _ = next_tick(&mut checkpoints) => self.checkpoint(),
            }
        }
    }

    fn checkpoint(&self) {
        match self.log.checkpoint(self.persister.as_ref()) {
            Ok(Some(rows)) => debug!(rows, "Checkpoint written"),
            Ok(None) => {}
            Err(e) => warn!("Checkpoint failed: {e}"),
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
