#![forbid(unsafe_code)]

//! Enveloped XML-DSig signing and verification for DUIS messages.
//!
//! Signing strips any existing signatures, refreshes the RequestID
//! counter, and appends an enveloped ECDSA-SHA256 signature as the last
//! child of the root element. Verification is the inverse: locate the
//! single signature, resolve the certificate by serial number, and
//! check the reference digest and signature value over the exclusive
//! canonical form.

pub mod request;
pub mod sign;
pub mod verify;

pub use sign::sign;
pub use verify::{verify, Verified};
