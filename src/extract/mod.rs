//! Page interpretation and link extraction
//!
//! [`PageClassifier`] reads the HTTP head of each archived response and decides
//! whether the body is parsed; [`LinkExtractor`] walks an HTML token stream and
//! emits link records; [`CharsetDetector`] picks the body's text encoding.

mod charset;
mod classifier;
mod links;

pub use charset::{CharsetDetector, DecodedText, HtmlCharsetDetector};
pub use classifier::{Classification, PageClassifier};
pub use links::LinkExtractor;
