//! # pc-profiler
//!
//! Throughput and latency profiler for a command-line blockchain client.
//! See [`profiler`] for the engine; the `pc-profiler` binary wraps it in a
//! CLI.

pub mod profiler;
