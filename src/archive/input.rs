use crate::archive::WarcReader;
use crate::config::InputConfig;
use crate::ArchiveError;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Buffer size for reading archive input
const INPUT_BUFFER_SIZE: usize = 256 * 1024;

/// Opens an input location as a raw byte stream
///
/// `location` is either a local path or an `http(s)://` URL. Inputs whose name
/// ends in `.gz` are decompressed transparently (multi-member gzip, as written
/// by WARC tools that compress each record separately).
///
/// Remote inputs use a blocking HTTP client; call this from a blocking context
/// such as `tokio::task::spawn_blocking`.
pub fn open_input(
    location: &str,
    settings: &InputConfig,
) -> Result<Box<dyn Read + Send>, ArchiveError> {
    let (reader, gzipped): (Box<dyn Read + Send>, bool) = match remote_url(location) {
        Some(url) => {
            let gzipped = url.path().ends_with(".gz");
            (Box::new(fetch(url, settings)?), gzipped)
        }
        None => {
            let file = File::open(location)?;
            (Box::new(file), location.ends_with(".gz"))
        }
    };

    if gzipped {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(reader))))
    } else {
        Ok(reader)
    }
}

/// Opens an input location as a WARC record source
pub fn open_warc(
    location: &str,
    settings: &InputConfig,
) -> Result<WarcReader<BufReader<Box<dyn Read + Send>>>, ArchiveError> {
    let input = open_input(location, settings)?;
    Ok(WarcReader::new(BufReader::with_capacity(
        INPUT_BUFFER_SIZE,
        input,
    )))
}

/// Returns the file name component of an input location
///
/// Used to name the diagnostics file. Falls back to `"input"` when the
/// location has no usable final segment.
pub fn input_file_name(location: &str) -> String {
    let name = match remote_url(location) {
        Some(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        None => Path::new(location)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
    };
    name.unwrap_or_else(|| "input".to_string())
}

fn remote_url(location: &str) -> Option<Url> {
    Url::parse(location)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

fn fetch(url: Url, settings: &InputConfig) -> Result<reqwest::blocking::Response, ArchiveError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(|source| ArchiveError::Http {
            url: url.to_string(),
            source,
        })?;

    info!("Downloading {}", url);

    client
        .get(url.clone())
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|source| ArchiveError::Http {
            url: url.to_string(),
            source,
        })
}
