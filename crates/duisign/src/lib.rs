#![forbid(unsafe_code)]

pub use duisign_c14n as c14n;
pub use duisign_core as core;
pub use duisign_credentials as credentials;
pub use duisign_dsig as dsig;
pub use duisign_schema as schema;
pub use duisign_xml as xml;
