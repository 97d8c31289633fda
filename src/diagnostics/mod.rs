//! Structured diagnostics
//!
//! Every stage of the pipeline reports recoverable problems as [`Diagnostic`]
//! values through a cloneable [`DiagnosticSender`]. A single [`ErrorReporter`]
//! task persists them as JSON lines.

mod reporter;

pub use reporter::{DiagnosticSender, ErrorReporter, ReporterSummary};

use serde::Serialize;
use std::fmt;

/// Closed set of diagnostic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// `WARC-Date` header missing or not RFC 3339
    RecordDateError,

    /// `WARC-Target-URI` missing, unparseable or hostless
    #[serde(rename = "RecordURLError")]
    RecordUrlError,

    /// An anchor `href` could not be resolved
    LinkNormalizationFailure,

    /// Body or archive bytes could not be decoded
    StreamDecodeError,

    SinkOpenError,
    SinkWriteError,
    SinkFinalizeError,

    /// The producer stopped early after observing a sink failure
    ReaderAbortedByWriter,
}

impl ErrorKind {
    /// Name written to the diagnostics file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecordDateError => "RecordDateError",
            Self::RecordUrlError => "RecordURLError",
            Self::LinkNormalizationFailure => "LinkNormalizationFailure",
            Self::StreamDecodeError => "StreamDecodeError",
            Self::SinkOpenError => "SinkOpenError",
            Self::SinkWriteError => "SinkWriteError",
            Self::SinkFinalizeError => "SinkFinalizeError",
            Self::ReaderAbortedByWriter => "ReaderAbortedByWriter",
        }
    }

    /// Returns true for kinds that mark the whole file as failed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SinkOpenError | Self::SinkWriteError | Self::SinkFinalizeError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One diagnostic line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Page URL or input file the problem belongs to
    pub source: String,
    pub error_kind: ErrorKind,
    pub message: String,
    /// Underlying error text, if any
    pub original_message: String,
}

impl Diagnostic {
    pub fn new(
        source: impl Into<String>,
        error_kind: ErrorKind,
        message: impl Into<String>,
        original_message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            error_kind,
            message: message.into(),
            original_message: original_message.into(),
        }
    }
}
