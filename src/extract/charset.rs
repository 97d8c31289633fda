use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8, WINDOWS_1252};
use std::io::{self, Read};

/// Size of the byte blocks read from the body per decode step
const DECODE_BLOCK_SIZE: usize = 16 * 1024;

/// Chooses the character encoding of an HTML body
pub trait CharsetDetector: Send + Sync {
    /// Determines the encoding from the first bytes of the body and the
    /// declared `Content-Type` header value
    fn detect(&self, prefix: &[u8], content_type: &str) -> &'static Encoding;
}

/// Encoding detection for HTML documents
///
/// Checks, in order: a byte-order mark, the `charset` parameter of the
/// declared content type, a `<meta>` declaration in the prefix, and whether
/// the prefix is non-ASCII UTF-8. Falls back to `windows-1252`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlCharsetDetector;

impl CharsetDetector for HtmlCharsetDetector {
    fn detect(&self, prefix: &[u8], content_type: &str) -> &'static Encoding {
        if let Some((encoding, _)) = Encoding::for_bom(prefix) {
            return encoding;
        }

        if let Some(encoding) = charset_parameter(content_type)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
        {
            return encoding;
        }

        if let Some(encoding) = meta_charset(prefix) {
            return encoding.output_encoding();
        }

        if looks_like_utf8(prefix) {
            return UTF_8;
        }

        WINDOWS_1252
    }
}

/// Extracts the `charset=` parameter value from a content type
fn charset_parameter(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then_some(value)
    })
}

/// Scans `<meta>` tags in the prefix for a charset declaration
///
/// Covers both `<meta charset="...">` and the `http-equiv` form whose
/// `content` attribute carries a `charset=` parameter.
fn meta_charset(prefix: &[u8]) -> Option<&'static Encoding> {
    let lower = prefix.to_ascii_lowercase();
    let mut rest = lower.as_slice();

    while let Some(start) = find(rest, b"<meta") {
        let after = &rest[start + 5..];
        let end = after.iter().position(|&b| b == b'>').unwrap_or(after.len());

        if let Some(encoding) = charset_in_tag(&after[..end]) {
            return Some(encoding);
        }
        rest = &after[end..];
    }
    None
}

fn charset_in_tag(tag: &[u8]) -> Option<&'static Encoding> {
    let mut rest = tag;
    while let Some(pos) = find(rest, b"charset") {
        let mut value = &rest[pos + 7..];
        value = trim_ascii_start(value);
        if let Some(after_eq) = value.strip_prefix(b"=") {
            let label = trim_ascii_start(after_eq);
            let label = label
                .strip_prefix(b"\"")
                .or_else(|| label.strip_prefix(b"'"))
                .unwrap_or(label);
            let len = label
                .iter()
                .position(|&b| !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')))
                .unwrap_or(label.len());
            if let Some(encoding) = Encoding::for_label(&label[..len]) {
                return Some(encoding);
            }
        }
        rest = &rest[pos + 7..];
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// True if the prefix contains non-ASCII bytes and is valid UTF-8, allowing a
/// sequence cut off at the end of the prefix
fn looks_like_utf8(prefix: &[u8]) -> bool {
    if prefix.is_ascii() {
        return false;
    }
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

/// Streaming decoder from an encoded byte stream to UTF-8 text blocks
///
/// A byte-order mark at the start of the stream overrides the chosen encoding.
/// Malformed sequences decode to U+FFFD.
pub struct DecodedText<R> {
    reader: R,
    decoder: Decoder,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: Read> DecodedText<R> {
    pub fn new(reader: R, encoding: &'static Encoding) -> Self {
        Self {
            reader,
            decoder: encoding.new_decoder(),
            buf: vec![0; DECODE_BLOCK_SIZE],
            finished: false,
        }
    }

    /// Encoding the stream was opened with
    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    /// Reads and decodes the next block
    ///
    /// Returns `Ok(None)` once the stream is exhausted. A returned block may be
    /// empty.
    pub fn next_block(&mut self) -> io::Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        let n = loop {
            match self.reader.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        let last = n == 0;

        let mut input = &self.buf[..n];
        let mut text = String::new();
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(DECODE_BLOCK_SIZE * 4);
            text.reserve(needed);

            let (result, read, _) = self.decoder.decode_to_string(input, &mut text, last);
            input = &input[read..];
            if let CoderResult::InputEmpty = result {
                break;
            }
        }

        if last {
            self.finished = true;
        }
        Ok(Some(text))
    }

    /// Decodes the remainder of the stream into one string
    pub fn read_to_string(mut self) -> io::Result<String> {
        let mut all = String::new();
        while let Some(block) = self.next_block()? {
            all.push_str(&block);
        }
        Ok(all)
    }
}
