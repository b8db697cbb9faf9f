#![forbid(unsafe_code)]

//! The credential store: a fixed set of named identities loaded from a
//! directory at startup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use duisign_core::{Error, Result};
use num_bigint_dig::BigUint;

use crate::certificate::Certificate;
use crate::key::load_signing_key;

/// The identity names a store directory is expected to provide, as
/// `<name>.pem` / `<name>.key` file pairs.
pub const DEFAULT_IDENTITIES: [&str; 7] = [
    "Z1-accessControlBroker-ds",
    "Z1-networkOperator-ds",
    "Z1-recovery-ds",
    "Z1-supplier-ds",
    "Z1-supplier2-ds",
    "Z1-transitionalCoS-ds",
    "Z1-wanProvider-ds",
];

/// Canonical business-id form: hyphens stripped, lowercase hex.
pub fn normalize_business_id(id: &str) -> String {
    id.chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// One loaded identity: certificate, private key and the business id
/// the certificate subject carries.
pub struct Credential {
    pub business_id: String,
    pub certificate: Arc<Certificate>,
    pub key: Arc<p256::ecdsa::SigningKey>,
}

/// Immutable credential collection indexed by business id and by
/// certificate serial number.
///
/// Built once, then shared behind an `Arc`. Certificates whose subject
/// carries no business id are skipped entirely; they appear in neither
/// index.
pub struct CredentialStore {
    credentials: Vec<Credential>,
    by_business_id: HashMap<String, usize>,
    by_serial: HashMap<BigUint, usize>,
}

impl CredentialStore {
    /// Load the seven standard identities from `dir`. A missing or
    /// unparsable file is fatal.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut credentials = Vec::new();
        for name in DEFAULT_IDENTITIES {
            let cert_bytes = std::fs::read(dir.join(format!("{name}.pem")))?;
            let certificate = Certificate::from_pem(&cert_bytes)?;

            let business_id = match certificate.business_id() {
                Some(id) => id,
                None => continue,
            };

            let key_bytes = std::fs::read(dir.join(format!("{name}.key")))?;
            let key = load_signing_key(&key_bytes)?;

            credentials.push(Credential {
                business_id,
                certificate: Arc::new(certificate),
                key: Arc::new(key),
            });
        }
        Self::from_credentials(credentials)
    }

    /// Build a store from already-loaded credentials.
    pub fn from_credentials(credentials: Vec<Credential>) -> Result<Self> {
        let mut by_business_id = HashMap::new();
        let mut by_serial = HashMap::new();
        for (index, credential) in credentials.iter().enumerate() {
            if by_business_id
                .insert(credential.business_id.clone(), index)
                .is_some()
            {
                return Err(Error::InternalError(format!(
                    "duplicate business id in credential set: {}",
                    credential.business_id
                )));
            }
            if by_serial
                .insert(credential.certificate.serial(), index)
                .is_some()
            {
                return Err(Error::InternalError(format!(
                    "duplicate certificate serial in credential set: {}",
                    credential.certificate.serial()
                )));
            }
        }
        Ok(Self {
            credentials,
            by_business_id,
            by_serial,
        })
    }

    fn by_id(&self, business_id: &str) -> Option<&Credential> {
        let normalized = normalize_business_id(business_id);
        self.by_business_id
            .get(&normalized)
            .map(|index| &self.credentials[*index])
    }

    /// Certificate for a business id, in any hyphenation or case.
    pub fn certificate(&self, business_id: &str) -> Option<Arc<Certificate>> {
        self.by_id(business_id).map(|c| c.certificate.clone())
    }

    /// Signing key for a business id.
    pub fn signing_key(&self, business_id: &str) -> Option<Arc<p256::ecdsa::SigningKey>> {
        self.by_id(business_id).map(|c| c.key.clone())
    }

    /// Certificate whose serial number matches exactly.
    pub fn certificate_by_serial(&self, serial: &BigUint) -> Option<Arc<Certificate>> {
        self.by_serial
            .get(serial)
            .map(|index| self.credentials[*index].certificate.clone())
    }

    /// Signing key paired with the certificate of that serial number.
    pub fn signing_key_by_serial(&self, serial: &BigUint) -> Option<Arc<p256::ecdsa::SigningKey>> {
        self.by_serial
            .get(serial)
            .map(|index| self.credentials[*index].key.clone())
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testgen;

    fn store_of(identities: Vec<testgen::TestIdentity>) -> CredentialStore {
        let credentials = identities
            .into_iter()
            .map(|identity| Credential {
                business_id: identity.certificate.business_id().unwrap(),
                certificate: identity.certificate,
                key: identity.key,
            })
            .collect();
        CredentialStore::from_credentials(credentials).unwrap()
    }

    #[test]
    fn test_lookup_normalizes_hyphens_and_case() {
        let store = store_of(vec![testgen::identity(
            10,
            [0x90, 0xB3, 0xD5, 0x1F, 0x30, 0x01, 0x00, 0x00],
            1,
        )]);
        assert!(store.certificate("90b3d51f30010000").is_some());
        assert!(store.certificate("90-B3-D5-1F-30-01-00-00").is_some());
        assert!(store.certificate("90B3D51F30010000").is_some());
        assert!(store.signing_key("90-b3-d5-1f-30-01-00-00").is_some());
        assert!(store.certificate("90b3d51f30010001").is_none());
    }

    #[test]
    fn test_lookup_by_serial() {
        let store = store_of(vec![
            testgen::identity(10, [1, 2, 3, 4, 5, 6, 7, 8], 1),
            testgen::identity(77, [8, 7, 6, 5, 4, 3, 2, 1], 2),
        ]);
        let serial = BigUint::from(77u32);
        let cert = store.certificate_by_serial(&serial).unwrap();
        assert_eq!(cert.serial(), serial);
        assert!(store.signing_key_by_serial(&serial).is_some());
        assert!(store
            .certificate_by_serial(&BigUint::from(99u32))
            .is_none());
    }

    #[test]
    fn test_duplicate_serial_rejected() {
        let identities = vec![
            testgen::identity(42, [1, 2, 3, 4, 5, 6, 7, 8], 1),
            testgen::identity(42, [8, 7, 6, 5, 4, 3, 2, 1], 2),
        ];
        let credentials = identities
            .into_iter()
            .map(|identity| Credential {
                business_id: identity.certificate.business_id().unwrap(),
                certificate: identity.certificate,
                key: identity.key,
            })
            .collect();
        assert!(CredentialStore::from_credentials(credentials).is_err());
    }

    #[test]
    fn test_load_dir_round_trip() {
        let dir = std::env::temp_dir().join(format!(
            "duisign-store-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).unwrap();

        for (index, name) in DEFAULT_IDENTITIES.iter().enumerate() {
            let mut octets = [0x90, 0xB3, 0xD5, 0x1F, 0x30, 0x00, 0x00, 0x00];
            octets[7] = index as u8;
            let identity = testgen::identity(100 + index as u32, octets, index as u8 + 1);
            std::fs::write(dir.join(format!("{name}.pem")), identity.certificate_pem()).unwrap();
            std::fs::write(dir.join(format!("{name}.key")), identity.key_pem()).unwrap();
        }

        let store = CredentialStore::load_dir(&dir).unwrap();
        assert_eq!(store.len(), DEFAULT_IDENTITIES.len());
        assert!(store.certificate("90-B3-D5-1F-30-00-00-03").is_some());
        assert!(store
            .certificate_by_serial(&BigUint::from(100u32))
            .is_some());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_dir_missing_file_is_fatal() {
        let dir = std::env::temp_dir().join(format!(
            "duisign-store-missing-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(CredentialStore::load_dir(&dir).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_plain_subject_is_skipped_without_reading_its_key() {
        let dir = std::env::temp_dir().join(format!(
            "duisign-store-skip-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();

        for (index, name) in DEFAULT_IDENTITIES.iter().enumerate() {
            if index == 0 {
                // No business id in the subject and no key file on disk.
                let (certificate, _key) = testgen::plain_identity(50, 9);
                std::fs::write(
                    dir.join(format!("{name}.pem")),
                    certificate.to_pem().unwrap(),
                )
                .unwrap();
                continue;
            }
            let mut octets = [0x90, 0xB3, 0xD5, 0x1F, 0x30, 0x00, 0x00, 0x00];
            octets[7] = index as u8;
            let identity = testgen::identity(200 + index as u32, octets, index as u8 + 1);
            std::fs::write(dir.join(format!("{name}.pem")), identity.certificate_pem()).unwrap();
            std::fs::write(dir.join(format!("{name}.key")), identity.key_pem()).unwrap();
        }

        let store = CredentialStore::load_dir(&dir).unwrap();
        assert_eq!(store.len(), DEFAULT_IDENTITIES.len() - 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
