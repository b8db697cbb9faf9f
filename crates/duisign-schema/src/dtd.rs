#![forbid(unsafe_code)]

//! Local resolution for the two DTD system identifiers that W3C schema
//! documents are known to reference. Resolution is a fixed in-memory
//! map; no identifier ever triggers network or filesystem access, and
//! anything outside the map is an error.

use duisign_core::{Error, Result};

/// System identifier of the XML Schema DTD.
pub const XMLSCHEMA_DTD_ID: &str = "http://www.w3.org/2001/XMLSchema.dtd";

/// System identifier of the XML Schema datatypes DTD.
pub const DATATYPES_DTD_ID: &str = "datatypes.dtd";

const XMLSCHEMA_DTD: &str = include_str!("../resources/XMLSchema.dtd");
const DATATYPES_DTD: &str = include_str!("../resources/datatypes.dtd");

/// Resolve a DTD system identifier to its bundled local copy.
pub fn resolve(system_id: &str) -> Result<&'static str> {
    match system_id {
        XMLSCHEMA_DTD_ID | "XMLSchema.dtd" => Ok(XMLSCHEMA_DTD),
        DATATYPES_DTD_ID => Ok(DATATYPES_DTD),
        other => Err(Error::InternalError(format!(
            "external reference is not permitted: {other}"
        ))),
    }
}
