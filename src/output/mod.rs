//! Output sinks for link records
//!
//! This module handles:
//! - The `RecordSink` abstraction the pipeline writes through
//! - A batched SQLite sink
//! - A gzip JSON-lines sink

mod jsonl;
mod schema;
mod sqlite_output;
mod traits;

pub use jsonl::JsonLinesSink;
pub use schema::{get_schema_version, initialize_schema, SCHEMA_VERSION};
pub use sqlite_output::SqliteSink;
pub use traits::{RecordSink, SinkError, SinkResult};

use crate::config::OutputFormat;
use std::path::Path;

/// Opens the sink for an output format
///
/// # Arguments
///
/// * `format` - Output format
/// * `path` - Output file path
/// * `batch_size` - Rows per transaction (SQLite only)
pub fn open_sink(
    format: OutputFormat,
    path: &Path,
    batch_size: usize,
) -> SinkResult<Box<dyn RecordSink + Send>> {
    match format {
        OutputFormat::Sqlite => Ok(Box::new(SqliteSink::open(path, batch_size)?)),
        OutputFormat::Jsonl => Ok(Box::new(JsonLinesSink::create(path)?)),
    }
}
