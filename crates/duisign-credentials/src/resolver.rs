#![forbid(unsafe_code)]

//! Capability interfaces the signing and verification engines resolve
//! credentials through, plus the two standard implementations: the
//! store, and an explicit certificate/key pair given on the command
//! line.

use std::path::Path;
use std::sync::Arc;

use duisign_core::Result;
use num_bigint_dig::BigUint;

use crate::certificate::Certificate;
use crate::key::load_signing_key;
use crate::store::CredentialStore;

/// Resolves signing material by originator business id.
pub trait SigningCredentials {
    fn certificate(&self, business_id: &str) -> Option<Arc<Certificate>>;
    fn signing_key(&self, business_id: &str) -> Option<Arc<p256::ecdsa::SigningKey>>;
}

/// Resolves verification certificates by serial number.
pub trait VerifyingCredentials {
    fn certificate_by_serial(&self, serial: &BigUint) -> Option<Arc<Certificate>>;
}

impl SigningCredentials for CredentialStore {
    fn certificate(&self, business_id: &str) -> Option<Arc<Certificate>> {
        CredentialStore::certificate(self, business_id)
    }

    fn signing_key(&self, business_id: &str) -> Option<Arc<p256::ecdsa::SigningKey>> {
        CredentialStore::signing_key(self, business_id)
    }
}

impl VerifyingCredentials for CredentialStore {
    fn certificate_by_serial(&self, serial: &BigUint) -> Option<Arc<Certificate>> {
        CredentialStore::certificate_by_serial(self, serial)
    }
}

/// A single explicit certificate/key pair. Answers every query with
/// that pair, whatever the requested id or serial; used when the
/// operator overrides the store with `--cert`/`--key`.
pub struct FileCredentials {
    certificate: Arc<Certificate>,
    key: Option<Arc<p256::ecdsa::SigningKey>>,
}

impl FileCredentials {
    /// Load a certificate and key from the given paths.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert_bytes = std::fs::read(cert_path)?;
        let key_bytes = std::fs::read(key_path)?;
        Ok(Self {
            certificate: Arc::new(Certificate::from_pem(&cert_bytes)?),
            key: Some(Arc::new(load_signing_key(&key_bytes)?)),
        })
    }

    /// Load only a certificate, for verification.
    pub fn load_certificate(cert_path: &Path) -> Result<Self> {
        let cert_bytes = std::fs::read(cert_path)?;
        Ok(Self {
            certificate: Arc::new(Certificate::from_pem(&cert_bytes)?),
            key: None,
        })
    }
}

impl SigningCredentials for FileCredentials {
    fn certificate(&self, _business_id: &str) -> Option<Arc<Certificate>> {
        Some(self.certificate.clone())
    }

    fn signing_key(&self, _business_id: &str) -> Option<Arc<p256::ecdsa::SigningKey>> {
        self.key.clone()
    }
}

impl VerifyingCredentials for FileCredentials {
    fn certificate_by_serial(&self, _serial: &BigUint) -> Option<Arc<Certificate>> {
        Some(self.certificate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testgen;

    #[test]
    fn test_file_credentials_answer_any_identity() {
        let dir = std::env::temp_dir().join(format!(
            "duisign-filecreds-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();

        let identity = testgen::identity(33, [1, 2, 3, 4, 5, 6, 7, 8], 4);
        let cert_path = dir.join("override.pem");
        let key_path = dir.join("override.key");
        std::fs::write(&cert_path, identity.certificate_pem()).unwrap();
        std::fs::write(&key_path, identity.key_pem()).unwrap();

        let creds = FileCredentials::load(&cert_path, &key_path).unwrap();
        assert!(creds.certificate("anything at all").is_some());
        assert!(creds.signing_key("anything at all").is_some());
        assert!(creds
            .certificate_by_serial(&BigUint::from(999u32))
            .is_some());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_certificate_only_has_no_signing_key() {
        let dir = std::env::temp_dir().join(format!(
            "duisign-filecreds-cert-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();

        let identity = testgen::identity(34, [1, 2, 3, 4, 5, 6, 7, 8], 5);
        let cert_path = dir.join("override.pem");
        std::fs::write(&cert_path, identity.certificate_pem()).unwrap();

        let creds = FileCredentials::load_certificate(&cert_path).unwrap();
        assert!(creds.certificate("any").is_some());
        assert!(creds.signing_key("any").is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
