#![forbid(unsafe_code)]

//! In-memory generation of DUIS-shaped test credentials.
//!
//! Only compiled with the `test-gen` feature; dependent crates enable it
//! through their dev-dependencies. Keys are derived from a fixed seed so
//! generated material is reproducible across runs.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use der::asn1::{ObjectIdentifier, SetOfVec};
use der::{Any, Decode, Tag};
use pkcs8::EncodePrivateKey;
use spki::{EncodePublicKey, SubjectPublicKeyInfoOwned};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;

use crate::Certificate;

/// X.500 `x500UniqueIdentifier`, the BIT STRING attribute a DUIS
/// credential carries its business id in.
const UNIQUE_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.45");

const VALIDITY: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// A generated certificate and its matching signing key.
pub struct TestIdentity {
    pub certificate: Arc<Certificate>,
    pub key: Arc<p256::ecdsa::SigningKey>,
}

impl TestIdentity {
    /// The certificate in PEM form, suitable for writing to disk as a
    /// store fixture.
    pub fn certificate_pem(&self) -> String {
        self.certificate
            .to_pem()
            .unwrap_or_else(|e| panic!("PEM encode of generated certificate failed: {e}"))
    }

    /// The key as PKCS#8 PEM.
    pub fn key_pem(&self) -> String {
        self.key
            .to_pkcs8_pem(pkcs8::LineEnding::LF)
            .unwrap_or_else(|e| panic!("PKCS#8 encode of generated key failed: {e}"))
            .to_string()
    }
}

impl crate::SigningCredentials for TestIdentity {
    fn certificate(&self, business_id: &str) -> Option<Arc<Certificate>> {
        let own = self.certificate.business_id()?;
        (own == crate::normalize_business_id(business_id)).then(|| self.certificate.clone())
    }

    fn signing_key(&self, business_id: &str) -> Option<Arc<p256::ecdsa::SigningKey>> {
        let own = self.certificate.business_id()?;
        (own == crate::normalize_business_id(business_id)).then(|| self.key.clone())
    }
}

impl crate::VerifyingCredentials for TestIdentity {
    fn certificate_by_serial(
        &self,
        serial: &num_bigint_dig::BigUint,
    ) -> Option<Arc<Certificate>> {
        (self.certificate.serial() == *serial).then(|| self.certificate.clone())
    }
}

fn signing_key(seed: u8) -> p256::ecdsa::SigningKey {
    match p256::ecdsa::SigningKey::from_slice(&[seed.max(1); 32]) {
        Ok(key) => key,
        Err(e) => panic!("seeded key generation failed: {e}"),
    }
}

fn build_certificate(
    serial: u32,
    subject: Name,
    key: &p256::ecdsa::SigningKey,
) -> Arc<Certificate> {
    let serial_bytes = serial.to_be_bytes();
    let first = serial_bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(serial_bytes.len() - 1);
    let serial_number = match SerialNumber::new(&serial_bytes[first..]) {
        Ok(s) => s,
        Err(e) => panic!("serial encode failed: {e}"),
    };

    let issuer = match Name::from_str("CN=duisign test CA") {
        Ok(n) => n,
        Err(e) => panic!("issuer name parse failed: {e}"),
    };
    let profile = Profile::Leaf {
        issuer,
        enable_key_agreement: false,
        enable_key_encipherment: false,
    };
    let validity = match Validity::from_now(VALIDITY) {
        Ok(v) => v,
        Err(e) => panic!("validity encode failed: {e}"),
    };
    let spki_der = match key.verifying_key().to_public_key_der() {
        Ok(d) => d,
        Err(e) => panic!("SPKI encode failed: {e}"),
    };
    let spki = match SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()) {
        Ok(s) => s,
        Err(e) => panic!("SPKI decode failed: {e}"),
    };

    let builder = match CertificateBuilder::new(profile, serial_number, validity, subject, spki, key)
    {
        Ok(b) => b,
        Err(e) => panic!("certificate builder setup failed: {e}"),
    };
    let cert = match builder.build::<p256::ecdsa::DerSignature>() {
        Ok(c) => c,
        Err(e) => panic!("certificate build failed: {e}"),
    };

    let der = match der::Encode::to_der(&cert) {
        Ok(d) => d,
        Err(e) => panic!("certificate encode failed: {e}"),
    };
    match Certificate::from_der(&der) {
        Ok(c) => Arc::new(c),
        Err(e) => panic!("generated certificate failed to re-parse: {e}"),
    }
}

fn business_id_subject(octets: [u8; 8]) -> Name {
    let mut value = Vec::with_capacity(9);
    value.push(0u8);
    value.extend_from_slice(&octets);
    let any = match Any::new(Tag::BitString, value) {
        Ok(a) => a,
        Err(e) => panic!("BIT STRING encode failed: {e}"),
    };
    let atv = AttributeTypeAndValue {
        oid: UNIQUE_IDENTIFIER,
        value: any,
    };
    let set = match SetOfVec::try_from(vec![atv]) {
        Ok(s) => s,
        Err(e) => panic!("RDN set encode failed: {e}"),
    };
    RdnSequence(vec![RelativeDistinguishedName(set)])
}

/// Generate a credential whose subject carries the given business id
/// octets, with a deterministic key derived from `seed`.
pub fn identity(serial: u32, business_octets: [u8; 8], seed: u8) -> TestIdentity {
    let key = signing_key(seed);
    let subject = business_id_subject(business_octets);
    let certificate = build_certificate(serial, subject, &key);
    TestIdentity {
        certificate,
        key: Arc::new(key),
    }
}

/// Generate a credential with an ordinary CN-only subject, one that
/// carries no business id.
pub fn plain_identity(serial: u32, seed: u8) -> (Arc<Certificate>, Arc<p256::ecdsa::SigningKey>) {
    let key = signing_key(seed);
    let subject = match Name::from_str("CN=no business id") {
        Ok(n) => n,
        Err(e) => panic!("subject name parse failed: {e}"),
    };
    let certificate = build_certificate(serial, subject, &key);
    (certificate, Arc::new(key))
}
