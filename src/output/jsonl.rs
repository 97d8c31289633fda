use crate::output::traits::{RecordSink, SinkError, SinkResult};
use crate::record::LinkRecord;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Sink writing one JSON object per record to a gzip-compressed file
pub struct JsonLinesSink {
    encoder: Option<GzEncoder<BufWriter<File>>>,
}

impl JsonLinesSink {
    /// Creates (or truncates) the output file
    pub fn create(path: &Path) -> SinkResult<Self> {
        let file = File::create(path)?;
        Ok(Self {
            encoder: Some(GzEncoder::new(BufWriter::new(file), Compression::default())),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn write(&mut self, record: &LinkRecord) -> SinkResult<()> {
        let encoder = self.encoder.as_mut().ok_or(SinkError::Closed)?;
        serde_json::to_writer(&mut *encoder, record)?;
        encoder.write_all(b"\n")?;
        Ok(())
    }

    fn finalize(&mut self) -> SinkResult<()> {
        if let Some(encoder) = self.encoder.take() {
            encoder.finish()?.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PageContext;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_writes_gzip_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("links.jsonl.gz");
        let page = PageContext {
            date: 1,
            source_host: "com.example".to_string(),
            secure: true,
            source: "http://example.com/".to_string(),
            data_origin: "origin".to_string(),
        };

        let mut sink = JsonLinesSink::create(&path).unwrap();
        sink.write(&page.link(
            "http://example.com/next".to_string(),
            "top".to_string(),
            "a",
            String::new(),
            true,
        ))
        .unwrap();
        sink.write(&page.marker("301", "http://example.com/moved".to_string()))
            .unwrap();
        sink.finalize().unwrap();

        let mut text = String::new();
        MultiGzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["link"], "http://example.com/next");
        assert_eq!(lines[0]["fragment"], "top");
        assert_eq!(lines[1]["tag"], "301");
        assert_eq!(lines[1]["link"], "");
        assert_eq!(lines[1]["extras"], "http://example.com/moved");
    }

    #[test]
    fn test_write_after_finalize_fails() {
        let dir = TempDir::new().unwrap();
        let mut sink = JsonLinesSink::create(&dir.path().join("x.jsonl.gz")).unwrap();
        sink.finalize().unwrap();
        assert!(sink.finalize().is_ok());

        let page = PageContext {
            date: 0,
            source_host: String::new(),
            secure: false,
            source: String::new(),
            data_origin: String::new(),
        };
        assert!(matches!(
            sink.write(&page.marker("200", String::new())),
            Err(SinkError::Closed)
        ));
    }
}
