//! Configuration module for link-sequencer
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section and key is optional.
//!
//! # Example
//!
//! ```no_run
//! use link_sequencer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sequencer.toml")).unwrap();
//! println!("Queue capacity: {}", config.pipeline.queue_capacity);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, DiagnosticsConfig, InputConfig, OutputConfig, OutputFormat, PipelineConfig,
    DEFAULT_ANCHOR_TEXT_LIMIT, DEFAULT_BATCH_SIZE, DEFAULT_CHARSET_SNIFF_BYTES,
    DEFAULT_CHUNK_SIZE, DEFAULT_DIAGNOSTICS_CAPACITY, DEFAULT_ERRORS_PATH,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_TIMEOUT_SECS,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
