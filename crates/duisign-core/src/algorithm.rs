#![forbid(unsafe_code)]

//! Algorithm URI constants for the XML-DSig profile used by DUIS.

/// Exclusive Canonical XML 1.0
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Exclusive Canonical XML 1.0 with comments
pub const EXC_C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

/// Enveloped signature transform
pub const ENVELOPED_SIGNATURE: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// SHA-256 digest
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// ECDSA with SHA-256
pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
