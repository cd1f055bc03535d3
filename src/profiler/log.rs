//! Shared in-memory execution log.
//!
//! [`ExecutionLog`] is a cheaply clonable handle to one append-only sequence
//! of [`ExecutionSample`]s. Workers append under a single mutex and the
//! final flush writes while holding it, so the flushed file never contains a
//! partially appended sample. A periodic checkpoint only copies the samples
//! under that mutex and writes after releasing it, so appends never wait on
//! disk. A separate write lock orders checkpoint writes against the final
//! flush, so a stale checkpoint can never overwrite the flushed file.
//!
//! The final flush seals the log. Sealing is one-way: later appends are
//! rejected and later flushes report [`FlushOutcome::AlreadyFlushed`]
//! without touching the file.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::profiler::error::ProfilerError;
use crate::profiler::persist::LogPersister;

/// One completed cycle: when it finished and how long it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSample {
    pub timestamp: DateTime<Utc>,
    pub response_time: Duration,
}

impl ExecutionSample {
    /// A sample completed now.
    pub fn completed_now(response_time: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            response_time,
        }
    }
}

/// Result of [`ExecutionLog::seal_and_flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// This call sealed the log and wrote `rows` samples.
    Written { rows: usize },
    /// The log had already been sealed by an earlier call.
    AlreadyFlushed,
}

#[derive(Debug, Default)]
struct LogState {
    samples: Vec<ExecutionSample>,
    sealed: bool,
}

/// Append-only execution log shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    inner: Arc<Mutex<LogState>>,
    write_lock: Arc<Mutex<()>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample. Returns `false` if the log is already sealed.
    pub fn append(&self, sample: ExecutionSample) -> bool {
        let mut state = self.inner.lock();
        if state.sealed {
            return false;
        }
        state.samples.push(sample);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().samples.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Copy of all samples recorded so far, in completion order.
    pub fn snapshot(&self) -> Vec<ExecutionSample> {
        self.inner.lock().samples.clone()
    }

    /// Persist the current contents without sealing.
    ///
    /// Returns `Ok(None)` once the log is sealed, since the final flush has
    /// already written everything there is.
    pub fn checkpoint(&self, persister: &dyn LogPersister) -> Result<Option<usize>, ProfilerError> {
        let _write = self.write_lock.lock();
        let samples = {
            let state = self.inner.lock();
            if state.sealed {
                return Ok(None);
            }
            state.samples.clone()
        };
        persister.persist(&samples).map(Some)
    }

    /// Seal the log and persist everything appended so far.
    ///
    /// Only the first call writes. The log stays sealed even if the write
    /// fails, so a failed flush is never retried with a different row set.
    pub fn seal_and_flush(&self, persister: &dyn LogPersister) -> Result<FlushOutcome, ProfilerError> {
        let _write = self.write_lock.lock();
        let mut state = self.inner.lock();
        if state.sealed {
            return Ok(FlushOutcome::AlreadyFlushed);
        }
        state.sealed = true;
        let rows = persister.persist(&state.samples)?;
        Ok(FlushOutcome::Written { rows })
    }
}
