//! Link Sequencer: hyperlink-graph extraction from web archives
//!
//! This crate streams WARC files, classifies each archived HTTP response,
//! extracts outbound links from HTML pages and writes one flat record per link
//! plus one page-visit marker per response to a SQLite or JSON-lines sink.

pub mod archive;
pub mod config;
pub mod diagnostics;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::FileState,
        to: state::FileState,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Archive input errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Malformed archive: {0}")]
    Malformed(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{ChunkBuffer, LinkRecord};
pub use state::FileState;
