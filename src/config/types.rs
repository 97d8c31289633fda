use serde::Deserialize;
use std::fmt;

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 150;
pub const DEFAULT_ANCHOR_TEXT_LIMIT: usize = 256;
pub const DEFAULT_CHARSET_SNIFF_BYTES: usize = 1024;
pub const DEFAULT_ERRORS_PATH: &str = "./errors/";
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 50_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Main configuration structure for link-sequencer
///
/// Every section is optional; missing keys take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub diagnostics: DiagnosticsConfig,
    pub output: OutputConfig,
    pub input: InputConfig,
}

/// Producer/consumer tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of records collected before a chunk is handed to the sink
    #[serde(rename = "chunk-size")]
    pub chunk_size: usize,

    /// Number of chunks the queue holds before the producer waits
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// Maximum anchor text length, in characters
    #[serde(rename = "anchor-text-limit")]
    pub anchor_text_limit: usize,

    /// Number of body bytes inspected for a charset declaration
    #[serde(rename = "charset-sniff-bytes")]
    pub charset_sniff_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            anchor_text_limit: DEFAULT_ANCHOR_TEXT_LIMIT,
            charset_sniff_bytes: DEFAULT_CHARSET_SNIFF_BYTES,
        }
    }
}

/// Diagnostics output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Directory receiving `<input>.json.gz` diagnostics files
    #[serde(rename = "errors-path")]
    pub errors_path: String,

    /// Diagnostics buffered before new ones are dropped
    pub capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            errors_path: DEFAULT_ERRORS_PATH.to_string(),
            capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// Rows per SQLite transaction
    #[serde(rename = "batch-size")]
    pub batch_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Output file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// SQLite database with a `links` table
    #[default]
    Sqlite,

    /// Gzip-compressed JSON lines
    Jsonl,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Remote input configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// User agent sent when downloading remote archives
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Request timeout for remote archives (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}
