//! Streaming link extraction
//!
//! The HTML body is fed block by block through the html5ever tokenizer; no
//! tree is built. A [`TokenSink`] watches start tags, end tags and character
//! tokens and turns them into [`LinkRecord`]s as they go by.

use crate::diagnostics::{DiagnosticSender, ErrorKind};
use crate::extract::charset::DecodedText;
use crate::record::{ChunkBuffer, PageContext};
use crate::url::{resolve, ResolvedLink};
use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use std::io::Read;
use tracing::trace;
use url::Url;

/// Link-bearing elements other than `a`: (element, href attribute, extras attribute)
static LINK_ATTRIBUTES: &[(&str, &str, &str)] = &[
    ("link", "href", "rel"),
    ("script", "src", "type"),
    ("form", "action", "method"),
    ("area", "href", "alt"),
];

fn link_attributes(element: &str) -> Option<(&'static str, &'static str)> {
    LINK_ATTRIBUTES
        .iter()
        .find(|(name, _, _)| *name == element)
        .map(|&(_, href, extras)| (href, extras))
}

/// Tokenizer state to switch to after a start tag
///
/// Mirrors the tree builder so that markup inside scripts, styles and the
/// like is read as text.
fn state_after(element: &str) -> TokenSinkResult<()> {
    match element {
        "script" => TokenSinkResult::RawData(RawKind::ScriptData),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
            TokenSinkResult::RawData(RawKind::Rawtext)
        }
        "textarea" | "title" => TokenSinkResult::RawData(RawKind::Rcdata),
        "plaintext" => TokenSinkResult::Plaintext,
        _ => TokenSinkResult::Continue,
    }
}

/// Removes embedded control characters and surrounding whitespace from an attribute URL
fn clean_href(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '\n' | '\t' | '\r' | '\u{8}'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Extracts outbound links from HTML documents
#[derive(Debug, Clone, Copy)]
pub struct LinkExtractor {
    anchor_text_limit: usize,
}

impl Default for LinkExtractor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ANCHOR_TEXT_LIMIT)
    }
}

impl LinkExtractor {
    /// Creates an extractor keeping at most `anchor_text_limit` characters of anchor text
    pub fn new(anchor_text_limit: usize) -> Self {
        Self { anchor_text_limit }
    }

    /// Extracts every link of one decoded document, in document order
    ///
    /// Extraction never fails: a read or decode error ends the document early,
    /// is reported as `StreamDecodeError`, and the links found so far are
    /// returned. An anchor still open at that point is dropped.
    ///
    /// # Arguments
    ///
    /// * `text` - The decoded body
    /// * `base` - The page URL that relative references resolve against
    /// * `page` - Metadata copied into every record
    /// * `diagnostics` - Receives unresolvable targets and stream errors
    pub fn extract<R: Read>(
        &self,
        mut text: DecodedText<R>,
        base: &Url,
        page: &PageContext,
        diagnostics: &DiagnosticSender,
    ) -> ChunkBuffer {
        let sink = LinkSink {
            base,
            page,
            diagnostics,
            anchor_text_limit: self.anchor_text_limit,
            links: ChunkBuffer::new(),
            anchor: None,
        };
        let mut tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
        let mut queue = BufferQueue::new();

        loop {
            match text.next_block() {
                Ok(Some(block)) => {
                    if block.is_empty() {
                        continue;
                    }
                    queue.push_back(StrTendril::from_slice(&block));
                    let _ = tokenizer.feed(&mut queue);
                }
                Ok(None) => break,
                Err(e) => {
                    diagnostics.report(
                        page.source.as_str(),
                        ErrorKind::StreamDecodeError,
                        "Failed to read page body",
                        e.to_string(),
                    );
                    tokenizer.sink.anchor = None;
                    return std::mem::take(&mut tokenizer.sink.links);
                }
            }
        }

        tokenizer.end();
        let links = std::mem::take(&mut tokenizer.sink.links);
        trace!(
            "Extracted {} links from {} ({})",
            links.len(),
            page.source,
            text.encoding().name()
        );
        links
    }

    /// Extracts links from an in-memory document
    pub fn extract_str(
        &self,
        html: &str,
        base: &Url,
        page: &PageContext,
        diagnostics: &DiagnosticSender,
    ) -> ChunkBuffer {
        let text = DecodedText::new(html.as_bytes(), encoding_rs::UTF_8);
        self.extract(text, base, page, diagnostics)
    }
}

/// Accumulates anchor text with whitespace runs collapsed
struct AnchorText {
    text: String,
    chars: usize,
    limit: usize,
    pending_space: bool,
}

impl AnchorText {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            limit,
            pending_space: false,
        }
    }

    fn push(&mut self, fragment: &str) {
        for c in fragment.chars() {
            if self.chars >= self.limit {
                return;
            }
            if c.is_ascii_whitespace() {
                self.pending_space = self.chars > 0;
                continue;
            }
            if self.pending_space {
                self.pending_space = false;
                self.text.push(' ');
                self.chars += 1;
                if self.chars >= self.limit {
                    return;
                }
            }
            self.text.push(c);
            self.chars += 1;
        }
    }

    fn finish(self) -> String {
        self.text
    }
}

/// Anchor whose end tag has not been seen yet
struct OpenAnchor {
    target: ResolvedLink,
    secure: bool,
    text: AnchorText,
}

struct LinkSink<'a> {
    base: &'a Url,
    page: &'a PageContext,
    diagnostics: &'a DiagnosticSender,
    anchor_text_limit: usize,
    links: ChunkBuffer,
    anchor: Option<OpenAnchor>,
}

impl LinkSink<'_> {
    fn secure(&self, href: &str) -> bool {
        starts_with_ignore_case(href, "https:") || self.page.secure
    }

    fn start_tag(&mut self, tag: &Tag) {
        // Tags nested inside an anchor only contribute their text
        if self.anchor.is_some() {
            return;
        }

        let element: &str = &tag.name;
        if element == "a" {
            self.open_anchor(tag);
        } else if let Some((href_attr, extras_attr)) = link_attributes(element) {
            self.element_link(element, tag, href_attr, extras_attr);
        }
    }

    fn open_anchor(&mut self, tag: &Tag) {
        let Some(raw) = attribute(tag, "href") else {
            return;
        };
        let href = clean_href(raw);

        if starts_with_ignore_case(&href, "javascript:") || href.starts_with('#') {
            trace!("Skipping in-page anchor {}", href);
            return;
        }

        match resolve(self.base, &href) {
            Some(target) => {
                self.anchor = Some(OpenAnchor {
                    target,
                    secure: self.secure(&href),
                    text: AnchorText::new(self.anchor_text_limit),
                });
            }
            None => {
                self.diagnostics.report(
                    self.page.source.as_str(),
                    ErrorKind::LinkNormalizationFailure,
                    "Could not resolve anchor href",
                    href,
                );
            }
        }
    }

    fn close_anchor(&mut self) {
        if let Some(anchor) = self.anchor.take() {
            let record = self.page.link(
                anchor.target.canonical,
                anchor.target.fragment,
                "a",
                anchor.text.finish(),
                anchor.secure,
            );
            self.links.push(record);
        }
    }

    fn element_link(&mut self, element: &str, tag: &Tag, href_attr: &str, extras_attr: &str) {
        let href = match attribute(tag, href_attr).map(clean_href) {
            Some(href) if !href.is_empty() => href,
            _ => return,
        };

        match resolve(self.base, &href) {
            Some(target) => {
                let extras = attribute(tag, extras_attr).unwrap_or_default().to_string();
                let record = self.page.link(
                    target.canonical,
                    target.fragment,
                    element,
                    extras,
                    self.secure(&href),
                );
                self.links.push(record);
            }
            None => {
                self.diagnostics.report(
                    self.page.source.as_str(),
                    ErrorKind::LinkNormalizationFailure,
                    format!("Could not resolve <{}> {}", element, href_attr),
                    href,
                );
            }
        }
    }
}

fn attribute<'t>(tag: &'t Tag, name: &str) -> Option<&'t str> {
    tag.attrs
        .iter()
        .find(|attr| &*attr.name.local == name)
        .map(|attr| &*attr.value)
}

impl TokenSink for LinkSink<'_> {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => {
                    self.start_tag(&tag);
                    return state_after(&tag.name);
                }
                TagKind::EndTag => {
                    if &*tag.name == "a" {
                        self.close_anchor();
                    }
                }
            },
            Token::CharacterTokens(text) => {
                if let Some(anchor) = self.anchor.as_mut() {
                    anchor.text.push(&text);
                }
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}
