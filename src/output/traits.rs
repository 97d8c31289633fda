//! Record sink trait and errors

use crate::record::LinkRecord;
use thiserror::Error;

/// Errors that can occur while persisting records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink already finalized")]
    Closed,
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for link records
///
/// A sink receives records one at a time in pipeline order and must be
/// finalized exactly once when the input is exhausted. Records written before
/// a failure stay written.
pub trait RecordSink {
    /// Persists one record
    fn write(&mut self, record: &LinkRecord) -> SinkResult<()>;

    /// Flushes buffered records and closes the output
    ///
    /// Calling it again is a no-op; writing afterwards fails with
    /// [`SinkError::Closed`].
    fn finalize(&mut self) -> SinkResult<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write(&mut self, record: &LinkRecord) -> SinkResult<()> {
        (**self).write(record)
    }

    fn finalize(&mut self) -> SinkResult<()> {
        (**self).finalize()
    }
}
