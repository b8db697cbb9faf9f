#![forbid(unsafe_code)]

//! Credential handling for DUIS message signing and verification.
//!
//! A [`CredentialStore`] is built once at startup from a directory of
//! PEM certificates and PKCS#8 private keys, indexed by the business id
//! carried in each certificate subject and by certificate serial
//! number. After construction the store is immutable; lookups take
//! `&self` and the store can be shared behind an `Arc` across threads.

pub mod certificate;
pub mod key;
pub mod resolver;
pub mod store;

#[cfg(feature = "test-gen")]
pub mod testgen;

pub use certificate::Certificate;
pub use key::load_signing_key;
pub use resolver::{FileCredentials, SigningCredentials, VerifyingCredentials};
pub use store::{normalize_business_id, Credential, CredentialStore, DEFAULT_IDENTITIES};
