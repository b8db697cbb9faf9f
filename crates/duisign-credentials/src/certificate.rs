#![forbid(unsafe_code)]

//! X.509 certificate wrapper with DUIS business-id extraction.

use der::{Decode, Encode, Tag, Tagged};
use duisign_core::{Error, Result};
use num_bigint_dig::BigUint;
use spki::DecodePublicKey;

/// Number of content octets in a business-id subject value: one
/// unused-bits octet followed by the eight EUI-64 identifier octets.
const BUSINESS_ID_VALUE_LEN: usize = 9;

/// A parsed X.509 certificate carrying a P-256 public key.
#[derive(Debug, Clone)]
pub struct Certificate {
    inner: x509_cert::Certificate,
    verifying_key: p256::ecdsa::VerifyingKey,
}

impl Certificate {
    /// Parse a certificate from DER bytes.
    pub fn from_der(data: &[u8]) -> Result<Self> {
        let inner = x509_cert::Certificate::from_der(data)
            .map_err(|e| Error::InternalError(format!("X.509 parse failed: {e}")))?;

        let spki_der = inner
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::InternalError(format!("SPKI encode failed: {e}")))?;
        let verifying_key = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der)
            .map_err(|e| Error::InternalError(format!("certificate key is not P-256: {e}")))?;

        Ok(Self {
            inner,
            verifying_key,
        })
    }

    /// Parse a certificate from PEM text.
    pub fn from_pem(data: &[u8]) -> Result<Self> {
        let (label, der) = pem_rfc7468::decode_vec(data)
            .map_err(|e| Error::InternalError(format!("certificate PEM decode failed: {e}")))?;
        if label != "CERTIFICATE" {
            return Err(Error::InternalError(format!(
                "expected CERTIFICATE PEM label, got {label}"
            )));
        }
        Self::from_der(&der)
    }

    /// Re-encode the certificate as DER.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| Error::InternalError(format!("X.509 encode failed: {e}")))
    }

    /// Re-encode the certificate as PEM text.
    pub fn to_pem(&self) -> Result<String> {
        let der = self.to_der()?;
        pem_rfc7468::encode_string("CERTIFICATE", pem_rfc7468::LineEnding::LF, &der)
            .map_err(|e| Error::InternalError(format!("certificate PEM encode failed: {e}")))
    }

    /// The certificate's serial number as a big integer.
    pub fn serial(&self) -> BigUint {
        BigUint::from_bytes_be(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    /// The issuer distinguished name in its RFC 2253 string form.
    pub fn issuer(&self) -> String {
        self.inner.tbs_certificate.issuer.to_string()
    }

    /// The DUIS business id encoded in the certificate subject, if any.
    ///
    /// A DUIS credential carries its EUI-64 identifier as a BIT STRING
    /// valued RDN in the subject: nine content octets whose first octet
    /// (the unused-bits count) is zero. The remaining eight octets,
    /// lowercase-hex encoded, are the 16-character business id. Subjects
    /// without such an RDN yield `None`.
    pub fn business_id(&self) -> Option<String> {
        for rdn in self.inner.tbs_certificate.subject.0.iter() {
            for atv in rdn.0.iter() {
                if atv.value.tag() != Tag::BitString {
                    continue;
                }
                let content = atv.value.value();
                if content.len() == BUSINESS_ID_VALUE_LEN && content[0] == 0 {
                    return Some(hex::encode(&content[1..]));
                }
            }
        }
        None
    }

    /// The P-256 key used to verify signatures made with this
    /// certificate's private key.
    pub fn verifying_key(&self) -> &p256::ecdsa::VerifyingKey {
        &self.verifying_key
    }
}
