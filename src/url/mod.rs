//! URL handling
//!
//! This module resolves hyperlink references against their page, reduces them
//! to a canonical form and derives the reversed-host partition key.

mod domain;
mod normalize;

pub use domain::{reverse_host_labels, reversed_host};
pub use normalize::{canonicalize, resolve, ResolvedLink};
