#![forbid(unsafe_code)]

//! Enveloped signature verification.

use base64::Engine;
use duisign_c14n::C14nMode;
use duisign_core::{algorithm, ns, Error, Result};
use duisign_credentials::VerifyingCredentials;
use duisign_xml::{find_child_element, find_elements, NodeSet};
use num_bigint_dig::BigUint;
use sha2::{Digest, Sha256};
use signature::Verifier;

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verified {
    /// The canonicalized octets the reference digest covered.
    Payload(Vec<u8>),
    /// The document was an unsigned `Response`, which is acceptable.
    Unsigned,
}

/// Verify the enveloped signature on a DUIS document.
pub fn verify(document: &[u8], resolver: &dyn VerifyingCredentials) -> Result<Verified> {
    let text = duisign_xml::decode_utf8(document)?;
    let doc = duisign_xml::parse_hardened(text)?;

    let signatures = find_elements(&doc, ns::DSIG, ns::node::SIGNATURE);
    if signatures.is_empty() {
        let root = doc.root_element();
        let unsigned_response = root.tag_name().name() == ns::node::RESPONSE
            && root.tag_name().namespace() == Some(ns::DUIS);
        if unsigned_response {
            return Ok(Verified::Unsigned);
        }
        return Err(Error::MissingSignature(
            "document carries no signature".into(),
        ));
    }
    if signatures.len() > 1 {
        return Err(Error::AmbiguousSignature(format!(
            "{} signatures present",
            signatures.len()
        )));
    }
    let signature = signatures[0];

    let serials = find_elements(&doc, ns::DSIG, ns::node::X509_SERIAL_NUMBER);
    if serials.len() != 1 {
        return Err(Error::MissingSignature(format!(
            "expected exactly one X509SerialNumber, found {}",
            serials.len()
        )));
    }
    let serial_text = serials[0].text().unwrap_or("").trim().to_owned();
    let serial: BigUint = serial_text.parse().map_err(|_| {
        Error::InvalidSignature(format!(
            "X509SerialNumber is not a decimal integer: {serial_text}"
        ))
    })?;
    let certificate = resolver
        .certificate_by_serial(&serial)
        .ok_or_else(|| Error::CertificateNotFound(format!("serial {serial}")))?;

    let signed_info = find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO)
        .ok_or_else(|| Error::InvalidSignature("Signature has no SignedInfo".into()))?;
    let (mode, prefix_list) = canonicalization_params(signed_info)?;
    let digest_value = checked_reference(signed_info)?;

    // Reference digest: the whole document minus the signature subtree.
    let mut node_set = NodeSet::all_without_comments(&doc);
    node_set.remove_subtree(signature);
    let payload = duisign_c14n::canonicalize_doc(&doc, C14nMode::Exclusive, Some(&node_set), &[])?;
    let declared = decode_base64(&digest_value)?;
    if declared != Sha256::digest(&payload).as_slice() {
        return Err(Error::InvalidSignature("reference digest mismatch".into()));
    }

    // Signature value over the canonicalized SignedInfo.
    let signed_info_set = NodeSet::tree_without_comments(signed_info);
    let signed_info_bytes =
        duisign_c14n::canonicalize_doc(&doc, mode, Some(&signed_info_set), &prefix_list)?;
    let value_node = find_child_element(signature, ns::DSIG, ns::node::SIGNATURE_VALUE)
        .ok_or_else(|| Error::InvalidSignature("Signature has no SignatureValue".into()))?;
    let value_bytes = decode_base64(value_node.text().unwrap_or(""))?;
    let ecdsa_signature = p256::ecdsa::Signature::from_slice(&value_bytes)
        .map_err(|e| Error::InvalidSignature(format!("signature value is not r||s: {e}")))?;
    certificate
        .verifying_key()
        .verify(&signed_info_bytes, &ecdsa_signature)
        .map_err(|_| Error::InvalidSignature("signature check failed".into()))?;

    Ok(Verified::Payload(payload))
}

/// Check the declared canonicalization and signature algorithms and
/// extract the PrefixList, if any.
fn canonicalization_params(
    signed_info: roxmltree::Node<'_, '_>,
) -> Result<(C14nMode, Vec<String>)> {
    let c14n_method =
        find_child_element(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)
            .ok_or_else(|| {
                Error::InvalidSignature("SignedInfo has no CanonicalizationMethod".into())
            })?;
    let c14n_uri = c14n_method.attribute(ns::attr::ALGORITHM).unwrap_or("");
    let mode = C14nMode::from_uri(c14n_uri).ok_or_else(|| {
        Error::InvalidSignature(format!("unsupported canonicalization: {c14n_uri}"))
    })?;
    let prefix_list = find_child_element(c14n_method, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|n| n.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default();

    let sig_method = find_child_element(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)
        .ok_or_else(|| Error::InvalidSignature("SignedInfo has no SignatureMethod".into()))?;
    let sig_uri = sig_method.attribute(ns::attr::ALGORITHM).unwrap_or("");
    if sig_uri != algorithm::ECDSA_SHA256 {
        return Err(Error::InvalidSignature(format!(
            "unsupported signature algorithm: {sig_uri}"
        )));
    }

    Ok((mode, prefix_list))
}

/// Check the single Reference and return its DigestValue text.
fn checked_reference(signed_info: roxmltree::Node<'_, '_>) -> Result<String> {
    let reference = find_child_element(signed_info, ns::DSIG, ns::node::REFERENCE)
        .ok_or_else(|| Error::InvalidSignature("SignedInfo has no Reference".into()))?;
    if !reference.attribute(ns::attr::URI).unwrap_or("").is_empty() {
        return Err(Error::InvalidSignature(
            "only the enveloped empty-URI reference is supported".into(),
        ));
    }

    let transforms = find_child_element(reference, ns::DSIG, ns::node::TRANSFORMS)
        .ok_or_else(|| Error::InvalidSignature("Reference has no Transforms".into()))?;
    let mut enveloped = false;
    for transform in transforms
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == ns::node::TRANSFORM)
    {
        match transform.attribute(ns::attr::ALGORITHM).unwrap_or("") {
            algorithm::ENVELOPED_SIGNATURE => enveloped = true,
            // The reference digest is computed without comments, so only
            // the matching canonicalization transform is acceptable.
            algorithm::EXC_C14N => {}
            uri => {
                return Err(Error::InvalidSignature(format!(
                    "unsupported transform: {uri}"
                )))
            }
        }
    }
    if !enveloped {
        return Err(Error::InvalidSignature(
            "enveloped-signature transform missing".into(),
        ));
    }

    let digest_method = find_child_element(reference, ns::DSIG, ns::node::DIGEST_METHOD)
        .ok_or_else(|| Error::InvalidSignature("Reference has no DigestMethod".into()))?;
    let digest_uri = digest_method.attribute(ns::attr::ALGORITHM).unwrap_or("");
    if digest_uri != algorithm::SHA256 {
        return Err(Error::InvalidSignature(format!(
            "unsupported digest algorithm: {digest_uri}"
        )));
    }

    let digest_value = find_child_element(reference, ns::DSIG, ns::node::DIGEST_VALUE)
        .ok_or_else(|| Error::InvalidSignature("Reference has no DigestValue".into()))?;
    Ok(digest_value.text().unwrap_or("").to_owned())
}

/// Base64 decode, tolerating embedded whitespace.
fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::InvalidSignature(format!("invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::sign;
    use duisign_credentials::testgen;

    const SUPPLIER_OCTETS: [u8; 8] = [0x90, 0xB3, 0xD5, 0x1F, 0x30, 0x01, 0x00, 0x00];

    const REQUEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Request xmlns="http://www.dccinterface.co.uk/ServiceUserGateway" schemaVersion="5.1"><Header><RequestID>90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:1000</RequestID></Header><Body><GeneralInfo/></Body></Request>"#;

    fn identity(serial: u32) -> testgen::TestIdentity {
        testgen::identity(serial, SUPPLIER_OCTETS, 6)
    }

    #[test]
    fn test_round_trip() {
        let identity = identity(60);
        let (signed, _) = sign(true, REQUEST.as_bytes(), &identity).unwrap();
        let verified = verify(&signed, &identity).unwrap();
        match verified {
            Verified::Payload(payload) => {
                let payload = String::from_utf8(payload).unwrap();
                assert!(payload.contains("GeneralInfo"));
                assert!(!payload.contains("ds:Signature"));
            }
            Verified::Unsigned => panic!("expected a payload"),
        }
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let identity = identity(61);
        let (signed, _) = sign(true, REQUEST.as_bytes(), &identity).unwrap();
        let tampered = String::from_utf8(signed)
            .unwrap()
            .replace("GeneralInfo", "GeneralInfa");
        let result = verify(tampered.as_bytes(), &identity);
        assert!(matches!(result, Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn test_unsigned_response_is_the_sentinel() {
        let xml = r#"<Response xmlns="http://www.dccinterface.co.uk/ServiceUserGateway"><Body/></Response>"#;
        let verified = verify(xml.as_bytes(), &identity(62)).unwrap();
        assert_eq!(verified, Verified::Unsigned);
    }

    #[test]
    fn test_unsigned_request_is_missing_signature() {
        let result = verify(REQUEST.as_bytes(), &identity(63));
        assert!(matches!(result, Err(Error::MissingSignature(_))));
    }

    #[test]
    fn test_two_signatures_are_ambiguous() {
        let identity = identity(64);
        let (signed, _) = sign(true, REQUEST.as_bytes(), &identity).unwrap();
        let signed = String::from_utf8(signed).unwrap();
        let start = signed.find("<ds:Signature ").unwrap();
        let end = signed.find("</ds:Signature>").unwrap() + "</ds:Signature>".len();
        let block = signed[start..end].to_owned();
        let doubled = format!("{}{}{}", &signed[..end], block, &signed[end..]);
        let result = verify(doubled.as_bytes(), &identity);
        assert!(matches!(result, Err(Error::AmbiguousSignature(_))));
    }

    #[test]
    fn test_with_comments_transform_is_rejected() {
        let identity = identity(70);
        let (signed, _) = sign(true, REQUEST.as_bytes(), &identity).unwrap();
        let signed = String::from_utf8(signed).unwrap();
        let extra = r#"<ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#WithComments"></ds:Transform>"#;
        let doctored = signed.replace("</ds:Transforms>", &format!("{extra}</ds:Transforms>"));
        match verify(doctored.as_bytes(), &identity) {
            Err(Error::InvalidSignature(msg)) => assert!(msg.contains("unsupported transform")),
            other => panic!("expected InvalidSignature, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_serial_is_missing_signature() {
        let identity = identity(65);
        let (signed, _) = sign(true, REQUEST.as_bytes(), &identity).unwrap();
        let signed = String::from_utf8(signed).unwrap();
        let start = signed.find("<ds:X509SerialNumber>").unwrap();
        let end = signed.find("</ds:X509SerialNumber>").unwrap() + "</ds:X509SerialNumber>".len();
        let stripped = format!("{}{}", &signed[..start], &signed[end..]);
        let result = verify(stripped.as_bytes(), &identity);
        assert!(matches!(result, Err(Error::MissingSignature(_))));
    }

    #[test]
    fn test_unknown_serial_is_certificate_not_found() {
        let signer = identity(66);
        let (signed, _) = sign(true, REQUEST.as_bytes(), &signer).unwrap();
        let other = identity(67);
        let result = verify(&signed, &other);
        assert!(matches!(result, Err(Error::CertificateNotFound(_))));
    }

    #[test]
    fn test_wrong_key_is_invalid_signature() {
        let signer = identity(68);
        let (signed, _) = sign(true, REQUEST.as_bytes(), &signer).unwrap();
        // Same serial, different key material.
        let imposter = testgen::identity(68, SUPPLIER_OCTETS, 7);
        let result = verify(&signed, &imposter);
        assert!(matches!(result, Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn test_tampered_signature_value_is_invalid() {
        let identity = identity(69);
        let (signed, _) = sign(true, REQUEST.as_bytes(), &identity).unwrap();
        let signed = String::from_utf8(signed).unwrap();
        let start = signed.find("<ds:SignatureValue>").unwrap() + "<ds:SignatureValue>".len();
        let mut bytes = signed.into_bytes();
        // Flip one base64 character of the signature value.
        bytes[start] = if bytes[start] == b'A' { b'B' } else { b'A' };
        let result = verify(&bytes, &identity);
        assert!(matches!(result, Err(Error::InvalidSignature(_))));
    }
}
