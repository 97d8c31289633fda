//! Archive record access
//!
//! A [`RecordSource`] yields archive records one at a time: a header map plus a
//! content stream that is only valid until the next record is requested.
//! [`WarcReader`] implements it over any buffered byte stream, and
//! [`open_warc`] wires it to local files, gzip members and HTTP downloads.

mod input;
mod warc;

pub use input::{input_file_name, open_input, open_warc};
pub use warc::WarcReader;

use crate::ArchiveError;
use std::collections::HashMap;
use std::io::{self, BufRead, Read};

/// Header block of one archive record
///
/// Lookups are ASCII case-insensitive; names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHeaders {
    fields: HashMap<String, String>,
}

impl RecordHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any earlier value of the same name
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.trim().to_ascii_lowercase(), value.into());
    }

    /// Looks up a header by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// `WARC-Type`
    pub fn record_type(&self) -> Option<&str> {
        self.get("warc-type")
    }

    /// `Content-Type`
    pub fn content_type(&self) -> Option<&str> {
        self.get("content-type")
    }

    /// `WARC-Date`
    pub fn date(&self) -> Option<&str> {
        self.get("warc-date")
    }

    /// `WARC-Target-URI`, with the angle brackets of older writers removed
    pub fn target_uri(&self) -> Option<&str> {
        self.get("warc-target-uri").map(|uri| {
            let uri = uri.trim();
            uri.strip_prefix('<')
                .and_then(|inner| inner.strip_suffix('>'))
                .unwrap_or(uri)
        })
    }

    /// `Content-Length`, if present and numeric
    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length")
            .and_then(|value| value.trim().parse().ok())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RecordHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

/// One archive record
pub struct ArchiveRecord<'a> {
    pub headers: RecordHeaders,

    /// Raw record content, bounded to this record
    pub content: Box<dyn Read + 'a>,
}

/// Pull-based supplier of archive records
pub trait RecordSource {
    /// Returns the next record, or `None` once the input is exhausted
    ///
    /// The returned content stream borrows the source; any part of it left
    /// unread is skipped on the next call.
    fn next_record(&mut self) -> Result<Option<ArchiveRecord<'_>>, ArchiveError>;
}

/// Reads one `\n`-terminated line of at most `limit` bytes into `buf`
///
/// Returns the number of bytes read; zero means end of stream. A line longer
/// than `limit` is returned in pieces.
pub(crate) fn read_line_limited<R: BufRead + ?Sized>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: u64,
) -> io::Result<usize> {
    buf.clear();
    reader.take(limit).read_until(b'\n', buf)
}

/// Strips trailing `\r\n` / `\n` from a line
pub(crate) fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
