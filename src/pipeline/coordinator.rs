//! File pipeline coordinator
//!
//! One input file is processed by two blocking tasks joined by a bounded
//! queue of [`ChunkBuffer`]s:
//! - The producer pulls archive records, classifies them and hands off a chunk
//!   every time the buffer reaches the chunk-size threshold
//! - The consumer opens the sink, writes every record it receives and
//!   finalizes the sink once the queue closes
//!
//! A sink failure sets a shared flag. The producer checks it at each chunk
//! boundary and stops reading early; the consumer keeps draining the queue so
//! the producer never blocks on a dead writer.

use crate::archive::RecordSource;
use crate::config::PipelineConfig;
use crate::diagnostics::{DiagnosticSender, ErrorKind};
use crate::extract::{CharsetDetector, PageClassifier};
use crate::output::{RecordSink, SinkResult};
use crate::pipeline::stats::PipelineStats;
use crate::record::ChunkBuffer;
use crate::state::FileState;
use crate::{PipelineError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Outcome of processing one input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileReport {
    /// Terminal state of the file, `Completed` or `Failed`
    pub outcome: FileState,

    /// Records the sink accepted before finalizing
    pub records_written: u64,

    /// True if the producer stopped reading after observing a sink failure
    pub aborted: bool,
}

/// Producer/consumer pipeline for one input file
pub struct FilePipeline {
    label: String,
    data_origin: String,
    detector: Option<Arc<dyn CharsetDetector>>,
    config: PipelineConfig,
    diagnostics: DiagnosticSender,
    stats: Arc<PipelineStats>,
    state: FileState,
}

impl FilePipeline {
    /// Creates a pipeline in the `Idle` state
    ///
    /// # Arguments
    ///
    /// * `label` - Name of the input, used as the source of file-level diagnostics
    /// * `data_origin` - Crawl-batch identifier stamped on every record
    /// * `config` - Pipeline settings
    /// * `diagnostics` - Handle to the error reporter
    pub fn new(
        label: impl Into<String>,
        data_origin: impl Into<String>,
        config: PipelineConfig,
        diagnostics: DiagnosticSender,
    ) -> Self {
        Self {
            label: label.into(),
            data_origin: data_origin.into(),
            detector: None,
            config,
            diagnostics,
            stats: Arc::new(PipelineStats::new()),
            state: FileState::Idle,
        }
    }

    /// Replaces the default charset detector
    pub fn with_charset_detector(mut self, detector: Arc<dyn CharsetDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Shared counters, readable while the pipeline runs
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    fn transition(&mut self, next: FileState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if next.is_terminal() {
            tracing::info!("{}: finished ({})", self.label, next);
        } else {
            tracing::debug!("{}: {} -> {}", self.label, self.state, next);
        }
        self.state = next;
        Ok(())
    }

    /// Runs the file to completion
    ///
    /// `open_sink` is called on the consumer thread before the first chunk is
    /// written. The returned future resolves only after the sink has been
    /// finalized (or failed to open).
    ///
    /// # Returns
    ///
    /// * `Ok(FileReport)` - The file reached a terminal state
    /// * `Err(PipelineError)` - A pipeline task panicked or the pipeline was reused
    pub async fn run<S, F, K>(mut self, source: S, open_sink: F) -> Result<FileReport>
    where
        S: RecordSource + Send + 'static,
        F: FnOnce() -> SinkResult<K> + Send + 'static,
        K: RecordSink,
    {
        self.transition(FileState::Running)?;

        let failed = Arc::new(AtomicBool::new(false));
        let (chunk_tx, chunk_rx) = mpsc::channel::<ChunkBuffer>(self.config.queue_capacity.max(1));
        let (done_tx, done_rx) = oneshot::channel::<u64>();

        let consumer = {
            let writer = Writer {
                label: self.label.clone(),
                failed: Arc::clone(&failed),
                diagnostics: self.diagnostics.clone(),
                stats: Arc::clone(&self.stats),
            };
            tokio::task::spawn_blocking(move || {
                let written = writer.drain(chunk_rx, open_sink);
                // Completion signal, posted exactly once
                let _ = done_tx.send(written);
            })
        };

        let producer = {
            let mut classifier = PageClassifier::new(
                self.data_origin.as_str(),
                &self.config,
                self.diagnostics.clone(),
            );
            if let Some(detector) = self.detector.take() {
                classifier = classifier.with_charset_detector(detector);
            }
            let reader = Reader {
                label: self.label.clone(),
                classifier,
                chunk_size: self.config.chunk_size.max(1),
                failed: Arc::clone(&failed),
                diagnostics: self.diagnostics.clone(),
                stats: Arc::clone(&self.stats),
            };
            tokio::task::spawn_blocking(move || reader.fill(source, chunk_tx))
        };

        let aborted = producer.await?;
        let signal = done_rx.await;
        consumer.await?;
        let records_written = signal.unwrap_or_default();

        let outcome = if failed.load(Ordering::Acquire) {
            FileState::Failed
        } else {
            FileState::Completed
        };

        self.transition(outcome)?;

        Ok(FileReport {
            outcome,
            records_written,
            aborted,
        })
    }
}

/// Producer half: archive records in, chunks out
struct Reader {
    label: String,
    classifier: PageClassifier,
    chunk_size: usize,
    failed: Arc<AtomicBool>,
    diagnostics: DiagnosticSender,
    stats: Arc<PipelineStats>,
}

impl Reader {
    /// Classifies every record, returning true if reading stopped early
    fn fill<S: RecordSource>(self, mut source: S, tx: mpsc::Sender<ChunkBuffer>) -> bool {
        let mut buffer = ChunkBuffer::new();
        let mut aborted = false;

        loop {
            let record = match source.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    // Broken framing ends the input like a normal EOF
                    tracing::warn!("{}: archive stream ended early: {}", self.label, e);
                    self.diagnostics.report(
                        self.label.as_str(),
                        ErrorKind::StreamDecodeError,
                        "Archive stream ended unexpectedly",
                        e.to_string(),
                    );
                    break;
                }
            };

            let classification = self.classifier.classify(record, &mut buffer);
            self.stats.record_classified(&classification);

            if buffer.len() >= self.chunk_size {
                if self.failed.load(Ordering::Acquire) {
                    tracing::warn!("{}: sink failed, stopping input", self.label);
                    self.diagnostics.report(
                        self.label.as_str(),
                        ErrorKind::ReaderAbortedByWriter,
                        "Stopped reading after a sink failure",
                        "",
                    );
                    aborted = true;
                    break;
                }
                if !self.hand_off(&tx, buffer.take()) {
                    break;
                }
            }
        }

        // The final partial chunk goes out regardless of the failure flag
        if !buffer.is_empty() {
            self.hand_off(&tx, buffer.take());
        }
        aborted
    }

    /// Moves a chunk onto the queue, waiting while it is full
    ///
    /// Returns false if the consumer is gone.
    fn hand_off(&self, tx: &mpsc::Sender<ChunkBuffer>, chunk: ChunkBuffer) -> bool {
        let len = chunk.len();
        match tx.blocking_send(chunk) {
            Ok(()) => {
                self.stats.chunk_handed_off();
                tracing::debug!("{}: handed off chunk of {} records", self.label, len);
                true
            }
            Err(_) => {
                tracing::warn!("{}: writer closed, dropping {} records", self.label, len);
                false
            }
        }
    }
}

/// Consumer half: chunks in, sink rows out
struct Writer {
    label: String,
    failed: Arc<AtomicBool>,
    diagnostics: DiagnosticSender,
    stats: Arc<PipelineStats>,
}

impl Writer {
    /// Writes every received record and finalizes the sink
    ///
    /// Keeps receiving after a failure until the queue closes. Returns the
    /// number of records the sink accepted.
    fn drain<F, K>(&self, mut rx: mpsc::Receiver<ChunkBuffer>, open_sink: F) -> u64
    where
        F: FnOnce() -> SinkResult<K>,
        K: RecordSink,
    {
        let mut sink = match open_sink() {
            Ok(sink) => Some(sink),
            Err(e) => {
                self.fail(ErrorKind::SinkOpenError, "Failed to open sink", e.to_string());
                None
            }
        };

        let mut written = 0u64;
        while let Some(chunk) = rx.blocking_recv() {
            let Some(active) = sink.as_mut() else {
                continue;
            };
            if self.failed.load(Ordering::Acquire) {
                tracing::debug!("{}: discarding chunk of {} records", self.label, chunk.len());
                continue;
            }

            for record in &chunk {
                if let Err(e) = active.write(record) {
                    self.fail(ErrorKind::SinkWriteError, "Failed to write record", e.to_string());
                    break;
                }
                written += 1;
                self.stats.record_written();
            }
        }

        if let Some(mut sink) = sink {
            if let Err(e) = sink.finalize() {
                self.fail(
                    ErrorKind::SinkFinalizeError,
                    "Failed to finalize sink",
                    e.to_string(),
                );
            }
        }

        written
    }

    /// Reports a sink problem, marking the file failed for fatal kinds
    fn fail(&self, kind: ErrorKind, message: &str, original: String) {
        tracing::warn!("{}: {}: {}", self.label, message, original);
        self.diagnostics
            .report(self.label.as_str(), kind, message, original);
        if kind.is_fatal() {
            self.failed.store(true, Ordering::Release);
        }
    }
}

/// Processes one input file into an already opened sink
///
/// # Returns
///
/// * `Ok(FileState::Completed)` - Every record was written and the sink finalized
/// * `Ok(FileState::Failed)` - The sink failed; rows written before the failure remain
/// * `Err(PipelineError)` - A pipeline task panicked
pub async fn process_file<S, K>(
    label: &str,
    data_origin: &str,
    config: PipelineConfig,
    diagnostics: DiagnosticSender,
    source: S,
    sink: K,
) -> Result<FileState>
where
    S: RecordSource + Send + 'static,
    K: RecordSink + Send + 'static,
{
    let report = FilePipeline::new(label, data_origin, config, diagnostics)
        .run(source, move || Ok(sink))
        .await?;
    Ok(report.outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::WarcReader;
    use crate::output::SinkError;
    use crate::record::LinkRecord;
    use encoding_rs::{Encoding, WINDOWS_1252};
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn response(uri: &str, http: &str) -> Vec<u8> {
        format!(
            "WARC/1.0\r\nWARC-Type: response\r\nWARC-Date: 2019-07-15T10:30:00Z\r\n\
             WARC-Target-URI: {}\r\nContent-Type: application/http; msgtype=response\r\n\
             Content-Length: {}\r\n\r\n{}\r\n\r\n",
            uri,
            http.len(),
            http
        )
        .into_bytes()
    }

    fn html_page(uri: &str, body: &str) -> Vec<u8> {
        response(
            uri,
            &format!("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n{}", body),
        )
    }

    fn reader(bytes: Vec<u8>) -> WarcReader<Cursor<Vec<u8>>> {
        WarcReader::new(Cursor::new(bytes))
    }

    #[derive(Clone, Default)]
    struct MemorySink {
        records: Arc<Mutex<Vec<LinkRecord>>>,
        finalized: Arc<AtomicBool>,
        fail_after: Option<usize>,
    }

    impl RecordSink for MemorySink {
        fn write(&mut self, record: &LinkRecord) -> SinkResult<()> {
            let mut records = self.records.lock().unwrap();
            if self.fail_after.is_some_and(|n| records.len() >= n) {
                return Err(SinkError::Closed);
            }
            records.push(record.clone());
            Ok(())
        }

        fn finalize(&mut self) -> SinkResult<()> {
            self.finalized.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config(chunk_size: usize) -> PipelineConfig {
        PipelineConfig {
            chunk_size,
            queue_capacity: 1,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_completed_run_writes_everything() {
        let mut input = html_page(
            "http://a.com/page",
            r#"<a href="/x">x</a><a href="/y">y</a>"#,
        );
        input.extend(response(
            "http://a.com/old",
            "HTTP/1.1 301 Moved\r\nLocation: /new\r\n\r\n",
        ));

        let (diagnostics, _rx) = DiagnosticSender::channel(16);
        let sink = MemorySink::default();
        let handle = sink.clone();

        let pipeline = FilePipeline::new("test.warc", "origin", config(2), diagnostics);
        let stats = pipeline.stats();
        let report = pipeline.run(reader(input), move || Ok(sink)).await.unwrap();

        assert_eq!(report.outcome, FileState::Completed);
        assert!(!report.aborted);
        assert_eq!(report.records_written, 4);
        assert!(handle.finalized.load(Ordering::SeqCst));

        let records = handle.records.lock().unwrap();
        let tags: Vec<&str> = records.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["a", "a", "200", "301"]);
        assert_eq!(records[3].extras, "http://a.com/new");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_read, 2);
        assert_eq!(snapshot.records_written, 4);
        assert_eq!(snapshot.chunks, 2);
    }

    #[tokio::test]
    async fn test_sink_open_failure_marks_file_failed() {
        let (diagnostics, mut rx) = DiagnosticSender::channel(16);
        let pipeline = FilePipeline::new("test.warc", "origin", config(1), diagnostics);

        let report = pipeline
            .run(
                reader(html_page("http://a.com/", "<p>none</p>")),
                || -> SinkResult<MemorySink> { Err(SinkError::Closed) },
            )
            .await
            .unwrap();

        assert_eq!(report.outcome, FileState::Failed);
        assert_eq!(report.records_written, 0);

        let diagnostic = rx.recv().await.unwrap();
        assert_eq!(diagnostic.error_kind, ErrorKind::SinkOpenError);
        assert_eq!(diagnostic.source, "test.warc");
    }

    #[tokio::test]
    async fn test_write_failure_aborts_reader() {
        let mut input = Vec::new();
        for i in 0..50 {
            input.extend(response(
                &format!("http://a.com/{}", i),
                "HTTP/1.1 404 Not Found\r\n\r\n",
            ));
        }

        let (diagnostics, mut rx) = DiagnosticSender::channel(64);
        let sink = MemorySink {
            fail_after: Some(1),
            ..MemorySink::default()
        };
        let handle = sink.clone();

        let pipeline = FilePipeline::new("test.warc", "origin", config(1), diagnostics);
        let stats = pipeline.stats();
        let report = pipeline.run(reader(input), move || Ok(sink)).await.unwrap();

        assert_eq!(report.outcome, FileState::Failed);
        assert_eq!(report.records_written, 1);
        assert!(handle.finalized.load(Ordering::SeqCst));
        assert_eq!(handle.records.lock().unwrap().len(), 1);
        assert!(stats.snapshot().records_read < 50);

        let mut kinds = Vec::new();
        while let Ok(diagnostic) = rx.try_recv() {
            kinds.push(diagnostic.error_kind);
        }
        assert!(kinds.contains(&ErrorKind::SinkWriteError));
        assert!(report.aborted);
        assert!(kinds.contains(&ErrorKind::ReaderAbortedByWriter));
    }

    #[tokio::test]
    async fn test_reader_stops_within_one_chunk_of_failure() {
        let mut input = Vec::new();
        for i in 0..200 {
            input.extend(response(
                &format!("http://a.com/{}", i),
                "HTTP/1.1 404 Not Found\r\n\r\n",
            ));
        }

        let (diagnostics, mut rx) = DiagnosticSender::channel(256);
        let sink = MemorySink {
            fail_after: Some(0),
            ..MemorySink::default()
        };

        let pipeline = FilePipeline::new("test.warc", "origin", config(1), diagnostics);
        let stats = pipeline.stats();
        let report = pipeline.run(reader(input), move || Ok(sink)).await.unwrap();

        assert_eq!(report.outcome, FileState::Failed);
        assert!(report.aborted);
        assert_eq!(report.records_written, 0);

        // One marker per record, so every record read fills a chunk: the last
        // one read is the record that saw the flag, handed off as the final
        // partial chunk.
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_read, snapshot.chunks);
        // The failing chunk, the one queued behind it, at most one more sent
        // before the flag was visible, and the final chunk
        assert!(snapshot.chunks >= 2, "chunks = {}", snapshot.chunks);
        assert!(snapshot.chunks <= 4, "chunks = {}", snapshot.chunks);

        let mut write_errors = 0;
        let mut aborts = 0;
        while let Ok(diagnostic) = rx.try_recv() {
            match diagnostic.error_kind {
                ErrorKind::SinkWriteError => write_errors += 1,
                ErrorKind::ReaderAbortedByWriter => aborts += 1,
                _ => {}
            }
        }
        assert_eq!(write_errors, 1);
        assert_eq!(aborts, 1);
    }

    #[tokio::test]
    async fn test_custom_charset_detector_is_used() {
        struct AlwaysLatin1 {
            calls: Arc<AtomicUsize>,
        }

        impl CharsetDetector for AlwaysLatin1 {
            fn detect(&self, _prefix: &[u8], _content_type: &str) -> &'static Encoding {
                self.calls.fetch_add(1, Ordering::SeqCst);
                WINDOWS_1252
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let (diagnostics, _rx) = DiagnosticSender::channel(16);
        let sink = MemorySink::default();
        let handle = sink.clone();

        let report = FilePipeline::new("test.warc", "origin", config(10), diagnostics)
            .with_charset_detector(Arc::new(AlwaysLatin1 {
                calls: Arc::clone(&calls),
            }))
            .run(
                reader(html_page("http://a.com/", "<a href=\"/x\">café</a>")),
                move || Ok(sink),
            )
            .await
            .unwrap();

        assert_eq!(report.outcome, FileState::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let records = handle.records.lock().unwrap();
        assert_eq!(records[0].tag, "a");
        assert_eq!(records[0].extras, "cafÃ©");
    }

    #[tokio::test]
    async fn test_malformed_archive_ends_input() {
        let mut input = html_page("http://a.com/", r#"<a href="/x">x</a>"#);
        input.extend(b"garbage that is not a record\r\n");

        let (diagnostics, mut rx) = DiagnosticSender::channel(16);
        let sink = MemorySink::default();
        let handle = sink.clone();

        let state = process_file("bad.warc", "origin", config(100), diagnostics, reader(input), sink)
            .await
            .unwrap();

        assert_eq!(state, FileState::Completed);
        assert_eq!(handle.records.lock().unwrap().len(), 2);
        assert_eq!(
            rx.recv().await.unwrap().error_kind,
            ErrorKind::StreamDecodeError
        );
    }

    #[tokio::test]
    async fn test_empty_input_completes() {
        let (diagnostics, _rx) = DiagnosticSender::channel(4);
        let sink = MemorySink::default();
        let handle = sink.clone();

        let state = process_file("empty.warc", "origin", config(10), diagnostics, reader(Vec::new()), sink)
            .await
            .unwrap();

        assert_eq!(state, FileState::Completed);
        assert!(handle.records.lock().unwrap().is_empty());
        assert!(handle.finalized.load(Ordering::SeqCst));
    }
}
