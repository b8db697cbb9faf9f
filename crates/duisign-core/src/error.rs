#![forbid(unsafe_code)]

/// Errors produced by the DUIS signing and verification pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input is not well-formed XML, or carries a DOCTYPE declaration.
    #[error("malformed XML: {0}")]
    MalformedXml(String),

    /// The input is well-formed but does not conform to the DUIS schema.
    #[error("schema validation failed: {0}")]
    SchemaInvalid(String),

    /// No certificate is available for the requested identity or serial.
    #[error("certificate not found: {0}")]
    CertificateNotFound(String),

    /// A certificate exists but no private key accompanies it.
    #[error("private key not found: {0}")]
    KeyNotFound(String),

    /// A signed document was expected but no usable signature is present.
    #[error("no signature found: {0}")]
    MissingSignature(String),

    /// More than one signature is present and the document cannot be
    /// verified unambiguously.
    #[error("ambiguous signature: {0}")]
    AmbiguousSignature(String),

    /// A signature is present but the digest or signature check failed.
    #[error("signature verification failed: {0}")]
    InvalidSignature(String),

    /// Document structure or crypto backend failure outside the caller's
    /// control (e.g. a Request with no RequestID element).
    #[error("internal error: {0}")]
    InternalError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable process exit code for this error, used by the CLI and
    /// reported as `errorCode` by the HTTP service.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Io(_) => 1,
            Error::InternalError(_) => 2,
            Error::CertificateNotFound(_) | Error::KeyNotFound(_) => 3,
            Error::MalformedXml(_)
            | Error::SchemaInvalid(_)
            | Error::MissingSignature(_)
            | Error::AmbiguousSignature(_)
            | Error::InvalidSignature(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::KeyNotFound("x".into()).exit_code(), 3);
        assert_eq!(Error::CertificateNotFound("x".into()).exit_code(), 3);
        assert_eq!(Error::InvalidSignature("x".into()).exit_code(), 10);
        assert_eq!(Error::MalformedXml("x".into()).exit_code(), 10);
        assert_eq!(Error::InternalError("x".into()).exit_code(), 2);
    }
}
