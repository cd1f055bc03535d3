//! Latency statistics over execution samples.
//!
//! [`LatencyRecorder`] folds response times into an HdrHistogram at
//! millisecond resolution and produces a [`LatencySnapshot`] with the usual
//! percentiles. [`CycleStats`] is the lock-light counter set workers update
//! while running: cycles completed, cycles failed and failures by category.

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::profiler::log::ExecutionSample;

/// Point-in-time latency statistics, all in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySnapshot {
    pub count: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// HdrHistogram-backed response time recorder.
pub struct LatencyRecorder {
    histogram: Histogram<u64>,
}

impl LatencyRecorder {
    /// Histograms use 3 significant figures and auto-resize.
    pub fn new() -> Self {
        let mut histogram = Histogram::<u64>::new(3).expect("3 sigfigs is always valid");
        histogram.auto(true);
        Self { histogram }
    }

    /// Build a recorder holding every sample's response time.
    pub fn from_samples(samples: &[ExecutionSample]) -> Self {
        let mut recorder = Self::new();
        for sample in samples {
            recorder.record(sample.response_time);
        }
        recorder
    }

    pub fn record(&mut self, response_time: Duration) {
        let ms = u64::try_from(response_time.as_millis()).unwrap_or(u64::MAX);
        // Auto-resizing histograms only reject values they cannot represent at all.
        let _ = self.histogram.record(ms);
    }

    fn quantile(&self, q: f64) -> u64 {
        if self.histogram.is_empty() {
            return 0;
        }
        self.histogram.value_at_quantile(q)
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let empty = self.histogram.is_empty();
        LatencySnapshot {
            count: self.histogram.len(),
            p50: self.quantile(0.50),
            p95: self.quantile(0.95),
            p99: self.quantile(0.99),
            min: if empty { 0 } else { self.histogram.min() },
            max: if empty { 0 } else { self.histogram.max() },
            mean: if empty { 0.0 } else { self.histogram.mean() },
        }
    }
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct CycleStatsInner {
    completed: AtomicU64,
    failed: AtomicU64,
    categories: Mutex<HashMap<&'static str, u64>>,
}

/// Shared cycle counters updated by every worker.
///
/// A cycle counts as failed if any of its commands failed; each failing
/// command adds one to its error category.
#[derive(Clone, Default)]
pub struct CycleStats(Arc<CycleStatsInner>);

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_completed(&self, failed: bool) {
        self.0.completed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.0.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self, category: &'static str) {
        *self.0.categories.lock().entry(category).or_insert(0) += 1;
    }

    pub fn completed(&self) -> u64 {
        self.0.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.0.failed.load(Ordering::Relaxed)
    }

    /// Error counts by category, largest first (ties by name).
    pub fn error_categories(&self) -> Vec<(String, u64)> {
        let mut categories: Vec<(String, u64)> = self
            .0
            .categories
            .lock()
            .iter()
            .map(|(name, count)| ((*name).to_string(), *count))
            .collect();
        categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        categories
    }
}
