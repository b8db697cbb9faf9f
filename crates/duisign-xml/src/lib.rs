#![forbid(unsafe_code)]

//! XML document abstraction for the DUIS signing library.
//!
//! Provides hardened parsing over `roxmltree`, element lookup helpers,
//! and the `NodeSet` subset type needed by canonicalization and the
//! enveloped-signature transform.

pub mod document;
pub mod nodeset;

pub use document::{decode_utf8, find_child_element, find_element, find_elements, parse_hardened};
pub use nodeset::NodeSet;

/// Return roxmltree parsing options for untrusted DUIS input.
///
/// DTD is disallowed: a DOCTYPE in an instance document is rejected at
/// parse time, which also rules out external entity expansion. roxmltree
/// never fetches external resources, so no further XXE hardening is
/// required.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: false,
        ..roxmltree::ParsingOptions::default()
    }
}
