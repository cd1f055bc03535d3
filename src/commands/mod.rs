//! `pc-profiler` CLI subcommands.

pub mod run;
pub mod summarize;
