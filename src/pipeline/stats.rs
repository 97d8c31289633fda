//! Pipeline statistics
//!
//! Counters are shared between the producer and consumer threads and updated
//! without locking.

use crate::diagnostics::ReporterSummary;
use crate::extract::Classification;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters for one file pipeline
#[derive(Debug, Default)]
pub struct PipelineStats {
    records_read: AtomicU64,
    responses: AtomicU64,
    rejected: AtomicU64,
    pages_extracted: AtomicU64,
    links: AtomicU64,
    markers: AtomicU64,
    chunks: AtomicU64,
    records_written: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub records_read: u64,
    pub responses: u64,
    pub rejected: u64,
    pub pages_extracted: u64,
    pub links: u64,
    pub markers: u64,
    pub chunks: u64,
    pub records_written: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one record pulled from the archive and what it produced
    pub fn record_classified(&self, classification: &Classification) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
        match classification {
            Classification::Skipped => {}
            Classification::Rejected(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
            Classification::Page { html, links, .. } => {
                self.responses.fetch_add(1, Ordering::Relaxed);
                if *html {
                    self.pages_extracted.fetch_add(1, Ordering::Relaxed);
                }
                self.links.fetch_add(*links as u64, Ordering::Relaxed);
                self.markers.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn chunk_handed_off(&self) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_read: self.records_read.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            pages_extracted: self.pages_extracted.load(Ordering::Relaxed),
            links: self.links.load(Ordering::Relaxed),
            markers: self.markers.load(Ordering::Relaxed),
            chunks: self.chunks.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Records emitted by the classifier (links plus markers)
    pub fn records_emitted(&self) -> u64 {
        self.links + self.markers
    }
}

/// Prints the run summary to stdout
pub fn print_statistics(
    label: &str,
    stats: &StatsSnapshot,
    diagnostics: &ReporterSummary,
    elapsed: Duration,
) {
    println!("=== Link Extraction Statistics: {} ===\n", label);

    println!("Input:");
    println!("  Archive records read: {}", stats.records_read);
    println!("  Responses processed: {}", stats.responses);
    println!("  Responses rejected: {}", stats.rejected);
    println!("  HTML pages extracted: {}", stats.pages_extracted);
    println!();

    println!("Output:");
    println!("  Records emitted: {}", stats.records_emitted());
    println!("  Links emitted: {}", stats.links);
    println!("  Page markers emitted: {}", stats.markers);
    println!("  Chunks handed off: {}", stats.chunks);
    println!("  Records written: {}", stats.records_written);
    println!();

    println!("Diagnostics:");
    println!("  Written: {}", diagnostics.written);
    if diagnostics.dropped > 0 {
        println!("  Dropped (buffer full): {}", diagnostics.dropped);
    }
    println!();

    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        stats.records_read as f64 / secs
    } else {
        0.0
    };
    println!("Elapsed: {:.1}s ({:.0} records/s)", secs, rate);
}
