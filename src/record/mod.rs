//! Output record model
//!
//! Every archived response produces a stream of [`LinkRecord`] values: one
//! page-visit marker plus one record per outbound link found in its body.
//! Records are collected into [`ChunkBuffer`]s and handed to a sink.

mod buffer;
mod utf8;

pub use buffer::ChunkBuffer;
pub use utf8::repair_utf8;

use serde::Serialize;

/// One row of the link graph
///
/// The nine fields form the canonical output schema. Page-visit markers carry
/// an empty `link` and the HTTP status code in `tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    /// Crawl timestamp of the source page (epoch seconds)
    pub date: i64,

    /// Page host with DNS labels reversed (`com.example.www`)
    pub source_host: String,

    /// Whether the link (or, by inheritance, its page) used TLS
    pub secure: bool,

    /// Canonical absolute URL of the page
    pub source: String,

    /// Canonical absolute URL of the destination; empty for markers
    pub link: String,

    /// Raw fragment of the destination
    pub fragment: String,

    /// Element name that produced the link, or the HTTP status for markers
    pub tag: String,

    /// Anchor text, attribute value or redirect target
    pub extras: String,

    /// Crawl-batch identifier
    pub data_origin: String,
}

impl LinkRecord {
    /// Returns true if this record is a page-visit marker
    pub fn is_marker(&self) -> bool {
        self.link.is_empty()
    }
}

/// Crawl metadata shared by every record emitted for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub date: i64,
    pub source_host: String,
    pub secure: bool,
    pub source: String,
    pub data_origin: String,
}

impl PageContext {
    /// Builds a link record originating from this page
    pub fn link(
        &self,
        link: String,
        fragment: String,
        tag: &str,
        extras: String,
        secure: bool,
    ) -> LinkRecord {
        LinkRecord {
            date: self.date,
            source_host: self.source_host.clone(),
            secure,
            source: self.source.clone(),
            link,
            fragment,
            tag: tag.to_string(),
            extras,
            data_origin: self.data_origin.clone(),
        }
    }

    /// Builds the page-visit marker for this page
    ///
    /// `status` is the HTTP status code string and `redirect` the resolved
    /// `Location` target, if any.
    pub fn marker(&self, status: &str, redirect: String) -> LinkRecord {
        LinkRecord {
            date: self.date,
            source_host: self.source_host.clone(),
            secure: self.secure,
            source: self.source.clone(),
            link: String::new(),
            fragment: String::new(),
            tag: status.to_string(),
            extras: redirect,
            data_origin: self.data_origin.clone(),
        }
    }
}
