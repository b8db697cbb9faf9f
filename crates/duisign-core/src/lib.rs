#![forbid(unsafe_code)]

//! Core types for the DUIS XML digital signature library.
//!
//! Holds the error taxonomy shared by every crate in the workspace, plus
//! the XML namespace and algorithm URI constants used by the signing and
//! verification engines.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
