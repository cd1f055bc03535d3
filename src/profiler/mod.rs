//! Rate-limited throughput profiler for a CLI-driven blockchain client.
//!
//! A fixed pool of workers repeatedly invokes the external client (one
//! transaction or query per cycle), each worker capped at a number of
//! cycles per one-second window. Every completed cycle is recorded as a
//! (timestamp, response time) sample in a shared execution log, which is
//! written to CSV exactly once at shutdown and optionally checkpointed
//! while running.
//!
//! Provides typed TOML configuration, a shell-backed task executor,
//! HdrHistogram-based latency statistics and a terminal summary renderer.

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod log;
pub mod metrics;
pub mod persist;
pub mod secret;
pub mod shutdown;
pub mod summary;
pub mod task;
pub mod throttle;
pub mod worker;
