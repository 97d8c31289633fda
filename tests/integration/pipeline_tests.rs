//! Integration tests for the file pipeline
//!
//! These tests build small WARC files in memory and run them through the
//! full reader → classifier → sink path, including the SQLite and JSON-lines
//! sinks, the diagnostics file and remote inputs served by wiremock.

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use link_sequencer::archive::{open_warc, WarcReader};
use link_sequencer::config::{InputConfig, OutputFormat, PipelineConfig};
use link_sequencer::diagnostics::{DiagnosticSender, ErrorReporter};
use link_sequencer::output::{open_sink, RecordSink, SinkResult};
use link_sequencer::pipeline::FilePipeline;
use link_sequencer::{FileState, LinkRecord};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds WARC files record by record
#[derive(Default)]
struct WarcBuilder {
    bytes: Vec<u8>,
}

impl WarcBuilder {
    fn record(mut self, record_type: &str, uri: &str, date: &str, payload: &str) -> Self {
        let content_type = if record_type == "response" {
            "application/http; msgtype=response"
        } else {
            "application/warc-fields"
        };
        let header = format!(
            "WARC/1.0\r\nWARC-Type: {}\r\nWARC-Date: {}\r\nWARC-Target-URI: {}\r\n\
             Content-Type: {}\r\nContent-Length: {}\r\n\r\n",
            record_type,
            date,
            uri,
            content_type,
            payload.len()
        );
        self.bytes.extend(header.as_bytes());
        self.bytes.extend(payload.as_bytes());
        self.bytes.extend(b"\r\n\r\n");
        self
    }

    fn html(self, uri: &str, body: &str) -> Self {
        let payload = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{}",
            body
        );
        self.record("response", uri, "2019-07-15T10:30:00Z", &payload)
    }

    fn redirect(self, uri: &str, location: &str) -> Self {
        let payload = format!(
            "HTTP/1.1 301 Moved Permanently\r\nLocation: {}\r\n\r\n",
            location
        );
        self.record("response", uri, "2019-07-15T10:30:00Z", &payload)
    }

    fn status(self, uri: &str, status: &str) -> Self {
        let payload = format!("HTTP/1.1 {} Whatever\r\n\r\n", status);
        self.record("response", uri, "2019-07-15T10:30:00Z", &payload)
    }

    fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// Sink keeping every record in memory
#[derive(Clone, Default)]
struct MemorySink {
    records: Arc<Mutex<Vec<LinkRecord>>>,
}

impl RecordSink for MemorySink {
    fn write(&mut self, record: &LinkRecord) -> SinkResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn finalize(&mut self) -> SinkResult<()> {
        Ok(())
    }
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        chunk_size: 3,
        queue_capacity: 2,
        ..PipelineConfig::default()
    }
}

async fn run_in_memory(warc: Vec<u8>) -> (FileState, Vec<LinkRecord>) {
    let (diagnostics, _rx) = DiagnosticSender::channel(64);
    let sink = MemorySink::default();
    let handle = sink.clone();

    let report = FilePipeline::new("test.warc", "CC-TEST", test_config(), diagnostics)
        .run(WarcReader::new(Cursor::new(warc)), move || Ok(sink))
        .await
        .expect("pipeline should finish");

    let records = handle.records.lock().unwrap().clone();
    (report.outcome, records)
}

fn read_gzip_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    let mut text = String::new();
    MultiGzDecoder::new(File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_single_page_end_to_end() {
    let warc = WarcBuilder::default()
        .html(
            "http://a.com/page",
            r#"<html><body><a href="/x">Go <b>here</b></a></body></html>"#,
        )
        .build();

    let (state, records) = run_in_memory(warc).await;

    assert_eq!(state, FileState::Completed);
    assert_eq!(records.len(), 2);

    let link = records.iter().find(|r| !r.is_marker()).unwrap();
    assert_eq!(link.tag, "a");
    assert_eq!(link.link, "http://a.com/x");
    assert_eq!(link.extras, "Go here");
    assert_eq!(link.source, "http://a.com/page");
    assert_eq!(link.source_host, "com.a");
    assert_eq!(link.date, 1563186600);
    assert_eq!(link.data_origin, "CC-TEST");

    let marker = records.iter().find(|r| r.is_marker()).unwrap();
    assert_eq!(marker.tag, "200");
    assert_eq!(marker.link, "");
    assert_eq!(marker.source, "http://a.com/page");
}

#[tokio::test]
async fn test_one_marker_per_response_plus_one_record_per_link() {
    let warc = WarcBuilder::default()
        .record("warcinfo", "", "2019-07-15T10:30:00Z", "software: test\r\n")
        .html(
            "http://a.com/",
            r#"<a href="/1">one</a><a href="/2">two</a><a href="https://b.com/">b</a>"#,
        )
        .html("https://b.com/", r#"<p>no links</p><a href="javascript:void(0)">js</a>"#)
        .redirect("http://c.com/old", "/new")
        .status("http://d.com/missing", "404")
        .html("http://e.com/", r##"<a href="#top">top</a><a href="/about">about</a>"##)
        .build();

    let (state, records) = run_in_memory(warc).await;

    assert_eq!(state, FileState::Completed);

    let markers: Vec<&LinkRecord> = records.iter().filter(|r| r.is_marker()).collect();
    let links: Vec<&LinkRecord> = records.iter().filter(|r| !r.is_marker()).collect();

    // Five response records, the warcinfo record contributes nothing
    assert_eq!(markers.len(), 5);
    assert_eq!(links.len(), 4);
    assert_eq!(records.len(), markers.len() + links.len());

    let redirect = markers.iter().find(|m| m.tag == "301").unwrap();
    assert_eq!(redirect.extras, "http://c.com/new");
    assert_eq!(redirect.source_host, "com.c");

    let secure_link = links.iter().find(|l| l.link == "http://b.com/").unwrap();
    assert!(secure_link.secure);

    // Records keep source order across chunks
    let sources: Vec<&str> = records.iter().map(|r| r.source.as_str()).collect();
    let first_e = sources.iter().position(|s| *s == "http://e.com/").unwrap();
    assert!(sources[..first_e].iter().all(|s| *s != "http://e.com/"));
    assert!(sources[first_e..].iter().all(|s| *s == "http://e.com/"));
}

#[tokio::test]
async fn test_sqlite_output() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("links.db");

    let warc = WarcBuilder::default()
        .html("http://a.com/", r#"<a href="/x">x</a><img src="/logo.png">"#)
        .status("http://a.com/gone", "410")
        .build();

    let (diagnostics, _rx) = DiagnosticSender::channel(16);
    let output = db_path.clone();
    let report = FilePipeline::new("test.warc", "CC-TEST", test_config(), diagnostics)
        .run(WarcReader::new(Cursor::new(warc)), move || {
            open_sink(OutputFormat::Sqlite, &output, 2)
        })
        .await
        .unwrap();

    assert_eq!(report.outcome, FileState::Completed);

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))
        .unwrap();
    assert_eq!(total as u64, report.records_written);

    let markers: i64 = conn
        .query_row("SELECT COUNT(*) FROM links WHERE link = ''", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(markers, 2);

    let anchor: String = conn
        .query_row("SELECT link FROM links WHERE tag = 'a'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(anchor, "http://a.com/x");
}

#[tokio::test]
async fn test_jsonl_output() {
    let dir = TempDir::new().unwrap();
    let out_path = dir.path().join("links.jsonl.gz");

    let warc = WarcBuilder::default()
        .html("http://a.com/", r#"<a href="/x#frag">x</a>"#)
        .build();

    let (diagnostics, _rx) = DiagnosticSender::channel(16);
    let output = out_path.clone();
    let report = FilePipeline::new("test.warc", "CC-TEST", test_config(), diagnostics)
        .run(WarcReader::new(Cursor::new(warc)), move || {
            open_sink(OutputFormat::Jsonl, &output, 1)
        })
        .await
        .unwrap();

    assert_eq!(report.outcome, FileState::Completed);

    let lines = read_gzip_lines(&out_path);
    assert_eq!(lines.len(), 2);
    let link = lines.iter().find(|l| l["tag"] == "a").unwrap();
    assert_eq!(link["link"], "http://a.com/x");
    assert_eq!(link["fragment"], "frag");
    assert_eq!(link["data_origin"], "CC-TEST");
}

#[tokio::test]
async fn test_diagnostics_file_and_sink_open_failure() {
    let dir = TempDir::new().unwrap();
    let errors_dir = dir.path().join("errors");
    std::fs::create_dir_all(&errors_dir).unwrap();

    let warc = WarcBuilder::default()
        .record("response", "http://a.com/", "not a date", "HTTP/1.1 200 OK\r\n\r\n")
        .html("http://b.com/", "<p>fine</p>")
        .build();

    let reporter = ErrorReporter::create(&errors_dir, "input.warc", 100).unwrap();
    let missing = dir.path().join("no/such/dir/links.db");

    let report = FilePipeline::new("input.warc", "CC-TEST", test_config(), reporter.sender())
        .run(WarcReader::new(Cursor::new(warc)), move || {
            open_sink(OutputFormat::Sqlite, &missing, 10)
        })
        .await
        .unwrap();

    assert_eq!(report.outcome, FileState::Failed);
    assert_eq!(report.records_written, 0);

    let summary = reporter.shutdown().await.unwrap();
    assert_eq!(summary.written, 2);
    assert_eq!(summary.dropped, 0);

    let lines = read_gzip_lines(&errors_dir.join("input.warc.json.gz"));
    let kinds: Vec<&str> = lines
        .iter()
        .map(|l| l["errorKind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"RecordDateError"));
    assert!(kinds.contains(&"SinkOpenError"));

    let date_error = lines
        .iter()
        .find(|l| l["errorKind"] == "RecordDateError")
        .unwrap();
    assert_eq!(date_error["source"], "http://a.com/");
}

#[tokio::test]
async fn test_gzipped_input_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("segment.warc.gz");

    // One gzip member per record
    let mut bytes = Vec::new();
    for uri in ["http://a.com/", "http://b.com/"] {
        let record = WarcBuilder::default()
            .html(uri, r#"<a href="/next">next</a>"#)
            .build();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&record).unwrap();
        bytes.extend(encoder.finish().unwrap());
    }
    std::fs::write(&input, bytes).unwrap();

    let source = open_warc(input.to_str().unwrap(), &InputConfig::default()).unwrap();

    let (diagnostics, _rx) = DiagnosticSender::channel(16);
    let sink = MemorySink::default();
    let handle = sink.clone();
    let report = FilePipeline::new("segment.warc.gz", "CC-TEST", test_config(), diagnostics)
        .run(source, move || Ok(sink))
        .await
        .unwrap();

    assert_eq!(report.outcome, FileState::Completed);
    assert_eq!(handle.records.lock().unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remote_input() {
    let mock_server = MockServer::start().await;

    let warc = WarcBuilder::default()
        .html("http://a.com/", r#"<a href="http://b.com/">b</a>"#)
        .build();

    Mock::given(method("GET"))
        .and(path("/crawl/segment.warc"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(warc))
        .mount(&mock_server)
        .await;

    let location = format!("{}/crawl/segment.warc", mock_server.uri());
    let source = tokio::task::spawn_blocking(move || open_warc(&location, &InputConfig::default()))
        .await
        .unwrap()
        .unwrap();

    let (diagnostics, _rx) = DiagnosticSender::channel(16);
    let sink = MemorySink::default();
    let handle = sink.clone();
    let report = FilePipeline::new("segment.warc", "CC-TEST", test_config(), diagnostics)
        .run(source, move || Ok(sink))
        .await
        .unwrap();

    assert_eq!(report.outcome, FileState::Completed);
    let records = handle.records.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|r| r.link == "http://b.com/"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remote_input_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let location = format!("{}/missing.warc.gz", mock_server.uri());
    let result = tokio::task::spawn_blocking(move || open_warc(&location, &InputConfig::default()))
        .await
        .unwrap();

    assert!(matches!(
        result,
        Err(link_sequencer::ArchiveError::Http { .. })
    ));
}
