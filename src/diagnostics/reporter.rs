use crate::diagnostics::{Diagnostic, ErrorKind};
use crate::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
}

/// Non-blocking handle for reporting diagnostics
///
/// Cheap to clone. Sending never waits: when the reporter's buffer is full, or
/// the reporter is gone, the diagnostic is dropped and counted instead.
#[derive(Debug, Clone)]
pub struct DiagnosticSender {
    tx: mpsc::Sender<Diagnostic>,
    counters: Arc<Counters>,
}

impl DiagnosticSender {
    /// Creates a sender and the receiving end of its buffer
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Diagnostic>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sender = Self {
            tx,
            counters: Arc::new(Counters::default()),
        };
        (sender, rx)
    }

    /// Reports one diagnostic
    pub fn report(
        &self,
        source: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        original_message: impl Into<String>,
    ) {
        self.send(Diagnostic::new(source, kind, message, original_message));
    }

    /// Queues a diagnostic without waiting
    pub fn send(&self, diagnostic: Diagnostic) {
        debug!(
            kind = %diagnostic.error_kind,
            source = %diagnostic.source,
            "{}: {}",
            diagnostic.message,
            diagnostic.original_message
        );

        match self.tx.try_send(diagnostic) {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of diagnostics accepted by the buffer
    pub fn sent(&self) -> u64 {
        self.counters.sent.load(Ordering::Relaxed)
    }

    /// Number of diagnostics dropped on overflow
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

/// Totals reported when the reporter shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterSummary {
    pub written: u64,
    pub dropped: u64,
}

/// Single consumer that persists diagnostics as JSON lines
pub struct ErrorReporter {
    sender: DiagnosticSender,
    handle: JoinHandle<io::Result<u64>>,
    path: Option<PathBuf>,
}

impl ErrorReporter {
    /// Creates the gzip-compressed diagnostics file for one input
    ///
    /// The file is written to `<dir>/<input_name>.json.gz`.
    ///
    /// # Arguments
    ///
    /// * `dir` - The errors directory (must exist)
    /// * `input_name` - File name of the input archive
    /// * `capacity` - Number of diagnostics buffered before new ones are dropped
    pub fn create(dir: &Path, input_name: &str, capacity: usize) -> Result<Self> {
        let path = dir.join(format!("{}.json.gz", input_name));
        let file = File::create(&path)?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

        info!("Writing diagnostics to {}", path.display());

        let mut reporter = Self::spawn_with(encoder, capacity, |encoder| {
            let mut inner = encoder.finish()?;
            inner.flush()
        });
        reporter.path = Some(path);
        Ok(reporter)
    }

    /// Starts a reporter writing plain JSON lines to `writer`
    pub fn spawn<W>(writer: W, capacity: usize) -> Self
    where
        W: Write + Send + 'static,
    {
        Self::spawn_with(writer, capacity, |mut writer| writer.flush())
    }

    fn spawn_with<W, F>(mut writer: W, capacity: usize, finish: F) -> Self
    where
        W: Write + Send + 'static,
        F: FnOnce(W) -> io::Result<()> + Send + 'static,
    {
        let (sender, mut rx) = DiagnosticSender::channel(capacity);

        let handle = tokio::task::spawn_blocking(move || -> io::Result<u64> {
            let mut written = 0u64;
            while let Some(diagnostic) = rx.blocking_recv() {
                serde_json::to_writer(&mut writer, &diagnostic)?;
                writer.write_all(b"\n")?;
                written += 1;
            }
            finish(writer)?;
            Ok(written)
        });

        Self {
            sender,
            handle,
            path: None,
        }
    }

    /// Returns a new handle for reporting diagnostics
    pub fn sender(&self) -> DiagnosticSender {
        self.sender.clone()
    }

    /// Path of the diagnostics file, when writing to one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flushes and closes the diagnostics output
    ///
    /// Waits until every other [`DiagnosticSender`] clone has been dropped,
    /// so call this after all pipelines using it have finished.
    pub async fn shutdown(self) -> Result<ReporterSummary> {
        let Self { sender, handle, .. } = self;
        let counters = Arc::clone(&sender.counters);
        drop(sender);

        let written = match handle.await? {
            Ok(written) => written,
            Err(e) => {
                warn!("Diagnostics output failed: {}", e);
                return Err(e.into());
            }
        };

        Ok(ReporterSummary {
            written,
            dropped: counters.dropped.load(Ordering::Relaxed),
        })
    }
}
