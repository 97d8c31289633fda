use crate::archive::{read_line_limited, trim_line_end, ArchiveRecord};
use crate::config::PipelineConfig;
use crate::diagnostics::{DiagnosticSender, ErrorKind};
use crate::extract::charset::{CharsetDetector, DecodedText, HtmlCharsetDetector};
use crate::extract::links::LinkExtractor;
use crate::record::{repair_utf8, ChunkBuffer, PageContext};
use crate::url::{canonicalize, resolve, reversed_host};
use chrono::DateTime;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// Longest HTTP head line inspected
const MAX_HEAD_LINE: u64 = 64 * 1024;

/// Result of classifying one archive record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Not an HTTP response record; nothing emitted
    Skipped,

    /// Response record whose metadata could not be used; a diagnostic was reported
    Rejected(ErrorKind),

    /// Response processed: `links` link records followed by one marker were appended
    Page {
        status: String,
        html: bool,
        links: usize,
    },
}

/// Captured fields of an embedded HTTP response head
#[derive(Debug, Default, PartialEq, Eq)]
struct HttpHead {
    status: String,
    location: Option<String>,
    content_type: Option<String>,
}

/// Decides what each archive record contributes to the output
///
/// Every processed response yields its links (HTML 200 pages only) and then
/// exactly one page-visit marker.
pub struct PageClassifier {
    data_origin: String,
    extractor: LinkExtractor,
    detector: Arc<dyn CharsetDetector>,
    sniff_bytes: usize,
    diagnostics: DiagnosticSender,
}

impl PageClassifier {
    pub fn new(
        data_origin: impl Into<String>,
        config: &PipelineConfig,
        diagnostics: DiagnosticSender,
    ) -> Self {
        Self {
            data_origin: data_origin.into(),
            extractor: LinkExtractor::new(config.anchor_text_limit),
            detector: Arc::new(HtmlCharsetDetector),
            sniff_bytes: config.charset_sniff_bytes,
            diagnostics,
        }
    }

    /// Replaces the default charset detector
    pub fn with_charset_detector(mut self, detector: Arc<dyn CharsetDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Classifies one record, appending its output to `out`
    ///
    /// # Processing Steps
    ///
    /// 1. Skip anything but `response` records carrying `application/http`
    /// 2. Parse `WARC-Date` (RFC 3339)
    /// 3. Parse `WARC-Target-URI` as an absolute URL with a host
    /// 4. Derive the page metadata
    /// 5. Read the embedded HTTP head
    /// 6. Extract links from `200` `text/html` bodies
    /// 7. Otherwise resolve a `Location` header into the redirect target
    /// 8. Append the page-visit marker
    pub fn classify(&self, record: ArchiveRecord<'_>, out: &mut ChunkBuffer) -> Classification {
        let headers = &record.headers;

        // Step 1: Response records only
        let is_response = headers.record_type() == Some("response")
            && headers
                .content_type()
                .is_some_and(|ct| ct.starts_with("application/http"));
        if !is_response {
            return Classification::Skipped;
        }

        let target = headers.target_uri().unwrap_or_default().to_string();

        // Step 2: Crawl date
        let date = match headers.date().map(|d| DateTime::parse_from_rfc3339(d.trim())) {
            Some(Ok(date)) => date.timestamp(),
            Some(Err(e)) => {
                return self.reject(&target, ErrorKind::RecordDateError, "Invalid WARC-Date", e.to_string());
            }
            None => {
                return self.reject(&target, ErrorKind::RecordDateError, "Missing WARC-Date", "");
            }
        };

        // Step 3: Page URL
        let page_url = match Url::parse(&target) {
            Ok(url) => url,
            Err(e) => {
                return self.reject(&target, ErrorKind::RecordUrlError, "Invalid WARC-Target-URI", e.to_string());
            }
        };
        let Some(canonical) = canonicalize(&page_url) else {
            return self.reject(&target, ErrorKind::RecordUrlError, "WARC-Target-URI has no host", "");
        };

        // Step 4: Page metadata
        let page = PageContext {
            date,
            source_host: reversed_host(&page_url),
            secure: page_url.scheme() == "https",
            source: canonical,
            data_origin: self.data_origin.clone(),
        };

        // Step 5: HTTP head
        let mut content = BufReader::new(record.content);
        let head = match read_http_head(&mut content) {
            Ok(head) => head,
            Err(e) => {
                self.diagnostics.report(
                    page.source.as_str(),
                    ErrorKind::StreamDecodeError,
                    "Failed to read HTTP head",
                    e.to_string(),
                );
                HttpHead::default()
            }
        };

        let is_html = head.status == "200"
            && head
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"));

        let mut links = 0;
        let mut redirect = String::new();

        if is_html {
            // Step 6: Links
            let mut found = self.extract_links(
                content,
                head.content_type.as_deref().unwrap_or_default(),
                &page_url,
                &page,
            );
            links = found.len();
            out.append(&mut found);
        } else if let Some(location) = head.location.as_deref() {
            // Step 7: Redirect target
            match resolve(&page_url, location) {
                Some(target) => redirect = target.canonical,
                None => trace!("Unresolvable Location {} on {}", location, page.source),
            }
        }

        // Step 8: Marker
        out.push(page.marker(&head.status, redirect));

        Classification::Page {
            status: head.status,
            html: is_html,
            links,
        }
    }

    fn extract_links<R: Read>(
        &self,
        mut body: R,
        content_type: &str,
        base: &Url,
        page: &PageContext,
    ) -> ChunkBuffer {
        let mut prefix = Vec::with_capacity(self.sniff_bytes);
        if let Err(e) = (&mut body).take(self.sniff_bytes as u64).read_to_end(&mut prefix) {
            self.diagnostics.report(
                page.source.as_str(),
                ErrorKind::StreamDecodeError,
                "Failed to read page body",
                e.to_string(),
            );
            return ChunkBuffer::new();
        }

        let encoding = self.detector.detect(&prefix, content_type);
        trace!("Decoding {} as {}", page.source, encoding.name());

        let text = DecodedText::new(Cursor::new(prefix).chain(body), encoding);
        self.extractor.extract(text, base, page, &self.diagnostics)
    }

    fn reject(
        &self,
        source: &str,
        kind: ErrorKind,
        message: &str,
        original: impl Into<String>,
    ) -> Classification {
        self.diagnostics.report(source, kind, message, original);
        Classification::Rejected(kind)
    }
}

/// Reads the status line and headers of an HTTP response
///
/// Stops at the first blank line or at end of stream, leaving the reader at
/// the start of the body.
fn read_http_head<R: BufRead>(reader: &mut R) -> io::Result<HttpHead> {
    let mut head = HttpHead::default();
    let mut line = Vec::new();
    let mut first = true;

    loop {
        if read_line_limited(reader, &mut line, MAX_HEAD_LINE)? == 0 {
            break;
        }
        let text = repair_utf8(trim_line_end(&line));
        if text.is_empty() {
            break;
        }

        if first {
            first = false;
            head.status = parse_status(&text);
            continue;
        }

        if let Some((name, value)) = text.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("location") {
                head.location = Some(value.trim().to_string());
            } else if name.eq_ignore_ascii_case("content-type") {
                head.content_type = Some(value.trim().to_string());
            }
        }
    }

    Ok(head)
}

/// Returns the three-digit status code of an `HTTP/x.y NNN reason` line
fn parse_status(line: &str) -> String {
    if !line.starts_with("HTTP/") {
        return String::new();
    }
    line.split_whitespace()
        .nth(1)
        .filter(|code| code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or_default()
        .to_string()
}
