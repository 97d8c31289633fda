//! Per-file extraction pipeline
//!
//! This module handles:
//! - Running the producer (archive reader + classifier) and consumer (sink
//!   writer) for one input file
//! - Sink failure propagation and early termination
//! - Lock-free progress counters and the end-of-run summary

mod coordinator;
mod stats;

pub use coordinator::{process_file, FilePipeline, FileReport};
pub use stats::{print_statistics, PipelineStats, StatsSnapshot};
