use crate::archive::{read_line_limited, trim_line_end, ArchiveRecord, RecordHeaders, RecordSource};
use crate::record::repair_utf8;
use crate::ArchiveError;
use std::io::{self, BufRead, Read};

/// Longest header line accepted in a record header block
const MAX_HEADER_LINE: u64 = 64 * 1024;

/// Streaming reader for WARC files
///
/// Parses the version line, the header block and `Content-Length` of each
/// record, and exposes the content as a stream that never reads past the
/// record boundary. Unread content and the separator lines are skipped when
/// the next record is requested.
pub struct WarcReader<R> {
    reader: R,
    pending: u64,
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, pending: 0 }
    }

    fn skip_pending(&mut self) -> io::Result<()> {
        if self.pending > 0 {
            io::copy(&mut (&mut self.reader).take(self.pending), &mut io::sink())?;
            self.pending = 0;
        }
        Ok(())
    }

    fn read_headers(&mut self, line: &mut Vec<u8>) -> Result<RecordHeaders, ArchiveError> {
        let mut headers = RecordHeaders::new();
        let mut last_name: Option<String> = None;

        loop {
            let n = read_line_limited(&mut self.reader, line, MAX_HEADER_LINE)?;
            if n == 0 {
                return Err(ArchiveError::Malformed(
                    "unexpected end of input in header block".to_string(),
                ));
            }
            if n as u64 == MAX_HEADER_LINE && !line.ends_with(b"\n") {
                return Err(ArchiveError::Malformed("header line too long".to_string()));
            }

            let text = repair_utf8(trim_line_end(line));
            if text.is_empty() {
                return Ok(headers);
            }

            // Folded continuation of the previous header
            if text.starts_with([' ', '\t']) {
                if let Some(name) = &last_name {
                    let folded = format!(
                        "{} {}",
                        headers.get(name).unwrap_or_default(),
                        text.trim()
                    );
                    headers.insert(name, folded);
                }
                continue;
            }

            let (name, value) = text.split_once(':').ok_or_else(|| {
                ArchiveError::Malformed(format!("header line without a colon: {:?}", text))
            })?;
            headers.insert(name, value.trim());
            last_name = Some(name.trim().to_string());
        }
    }
}

impl<R: BufRead> RecordSource for WarcReader<R> {
    fn next_record(&mut self) -> Result<Option<ArchiveRecord<'_>>, ArchiveError> {
        self.skip_pending()?;

        // Skip the blank separator lines between records
        let mut line = Vec::new();
        loop {
            let n = read_line_limited(&mut self.reader, &mut line, MAX_HEADER_LINE)?;
            if n == 0 {
                return Ok(None);
            }
            if !trim_line_end(&line).is_empty() {
                break;
            }
        }

        if !line.starts_with(b"WARC/") {
            return Err(ArchiveError::Malformed(format!(
                "expected a WARC version line, found {:?}",
                repair_utf8(trim_line_end(&line))
            )));
        }

        let headers = self.read_headers(&mut line)?;
        let length = headers
            .content_length()
            .ok_or_else(|| ArchiveError::Malformed("missing Content-Length".to_string()))?;

        self.pending = length;

        Ok(Some(ArchiveRecord {
            headers,
            content: Box::new(RecordContent {
                reader: &mut self.reader,
                remaining: &mut self.pending,
            }),
        }))
    }
}

/// Content stream of the current record
struct RecordContent<'a, R> {
    reader: &'a mut R,
    remaining: &'a mut u64,
}

impl<R: Read> Read for RecordContent<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if *self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(*self.remaining).unwrap_or(usize::MAX));
        let n = self.reader.read(&mut buf[..max])?;
        *self.remaining -= n as u64;
        Ok(n)
    }
}
