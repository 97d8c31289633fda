//! Link Sequencer main entry point
//!
//! Command-line interface for extracting the hyperlink graph of one web
//! archive file.

use anyhow::Context;
use clap::Parser;
use link_sequencer::archive::{input_file_name, open_warc};
use link_sequencer::config::{load_config_with_hash, validate, Config, OutputFormat};
use link_sequencer::diagnostics::ErrorReporter;
use link_sequencer::output::open_sink;
use link_sequencer::pipeline::{print_statistics, FilePipeline};
use link_sequencer::FileState;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Link Sequencer: hyperlink-graph extraction from web archives
///
/// Reads a WARC file (plain, gzipped or over HTTP), extracts every outbound
/// link of every archived HTML page and writes one record per link plus one
/// page-visit marker per response.
#[derive(Parser, Debug)]
#[command(name = "link-sequencer")]
#[command(version)]
#[command(about = "Extract the link graph of a web archive", long_about = None)]
struct Cli {
    /// Archive to read: a local path or an http(s) URL
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file (SQLite database or gzipped JSON lines)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Crawl-batch identifier stamped on every record
    #[arg(value_name = "DATA_ORIGIN")]
    data_origin: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the diagnostics file
    #[arg(long, value_name = "DIR")]
    errors_path: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without reading input
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(FileState::Completed) => ExitCode::SUCCESS,
        Ok(state) => {
            tracing::error!("Input finished in state {}", state);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("link_sequencer=info,warn"),
            1 => EnvFilter::new("link_sequencer=debug,info"),
            2 => EnvFilter::new("link_sequencer=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, if any, and applies command-line overrides
fn load_settings(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(errors_path) = &cli.errors_path {
        config.diagnostics.errors_path = errors_path.clone();
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<FileState> {
    let config = load_settings(&cli)?;

    if cli.dry_run {
        handle_dry_run(&cli, &config);
        return Ok(FileState::Completed);
    }

    let started = Instant::now();
    let label = input_file_name(&cli.input);

    if let Some(parent) = cli.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let errors_dir = Path::new(&config.diagnostics.errors_path);
    std::fs::create_dir_all(errors_dir)
        .with_context(|| format!("Failed to create {}", errors_dir.display()))?;

    let reporter = ErrorReporter::create(errors_dir, &label, config.diagnostics.capacity)?;

    // Remote inputs connect with a blocking client
    let source = {
        let location = cli.input.clone();
        let settings = config.input.clone();
        tokio::task::spawn_blocking(move || open_warc(&location, &settings))
            .await?
            .with_context(|| format!("Failed to open {}", cli.input))?
    };

    tracing::info!(
        "Processing {} into {} ({})",
        cli.input,
        cli.output.display(),
        config.output.format
    );

    let pipeline = FilePipeline::new(
        label.as_str(),
        cli.data_origin.as_str(),
        config.pipeline.clone(),
        reporter.sender(),
    );
    let stats = pipeline.stats();

    let format = config.output.format;
    let batch_size = config.output.batch_size;
    let output = cli.output.clone();
    let report = pipeline
        .run(source, move || open_sink(format, &output, batch_size))
        .await?;

    let diagnostics = reporter.shutdown().await?;

    if !cli.quiet {
        print_statistics(&label, &stats.snapshot(), &diagnostics, started.elapsed());
    }

    if report.aborted {
        tracing::warn!("{}: input was not read to the end", label);
    }
    tracing::info!(
        "{}: {} records written to {}",
        label,
        report.records_written,
        cli.output.display()
    );

    Ok(report.outcome)
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(cli: &Cli, config: &Config) {
    println!("=== Link Sequencer Dry Run ===\n");

    println!("Input:");
    println!("  Location: {}", cli.input);
    println!("  Diagnostics name: {}", input_file_name(&cli.input));
    println!("  Data origin: {}", cli.data_origin);
    println!("  User agent: {}", config.input.user_agent);
    println!("  Timeout: {}s", config.input.timeout_secs);

    println!("\nPipeline:");
    println!("  Chunk size: {}", config.pipeline.chunk_size);
    println!("  Queue capacity: {}", config.pipeline.queue_capacity);
    println!("  Anchor text limit: {}", config.pipeline.anchor_text_limit);
    println!("  Charset sniff bytes: {}", config.pipeline.charset_sniff_bytes);

    println!("\nOutput:");
    println!("  Path: {}", cli.output.display());
    println!("  Format: {}", config.output.format);
    println!("  Batch size: {}", config.output.batch_size);

    println!("\nDiagnostics:");
    println!("  Directory: {}", config.diagnostics.errors_path);
    println!("  Capacity: {}", config.diagnostics.capacity);

    println!("\nConfiguration is valid.");
}
