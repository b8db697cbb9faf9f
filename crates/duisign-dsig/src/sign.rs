#![forbid(unsafe_code)]

//! Enveloped signature creation.
//!
//! The document is mutated as raw text using the byte ranges roxmltree
//! reports for each node; every mutation re-parses before the next step
//! so ranges are never stale. SignedInfo is built directly in its
//! exclusive-canonical byte form, so the octets signed here are exactly
//! the octets a verifier recovers by canonicalizing the embedded
//! subtree.

use std::ops::Range;
use std::sync::Arc;

use base64::Engine;
use duisign_c14n::{escape, C14nMode};
use duisign_core::{algorithm, ns, Error, Result};
use duisign_credentials::{Certificate, SigningCredentials};
use duisign_xml::NodeSet;
use sha2::{Digest, Sha256};
use signature::Signer;

use crate::request;

/// Sign a DUIS document.
///
/// Strips existing signatures, rewrites the RequestID counter unless
/// `preserve_counter` is set, resolves the originator's credential and
/// appends the enveloped signature. Returns the signed document and
/// the certificate used.
pub fn sign(
    preserve_counter: bool,
    document: &[u8],
    resolver: &dyn SigningCredentials,
) -> Result<(Vec<u8>, Arc<Certificate>)> {
    let text = duisign_xml::decode_utf8(document)?.to_owned();
    let text = strip_signatures(text)?;
    let (text, originator) = prepare_request_id(text, preserve_counter)?;

    let certificate = resolver
        .certificate(&originator)
        .ok_or_else(|| Error::CertificateNotFound(originator.clone()))?;
    let key = resolver
        .signing_key(&originator)
        .ok_or_else(|| Error::KeyNotFound(originator.clone()))?;

    let digest_b64 = {
        let doc = duisign_xml::parse_hardened(&text)?;
        let node_set = NodeSet::all_without_comments(&doc);
        let canonical =
            duisign_c14n::canonicalize_doc(&doc, C14nMode::Exclusive, Some(&node_set), &[])?;
        base64::engine::general_purpose::STANDARD.encode(Sha256::digest(&canonical))
    };

    let signed_info = signed_info_xml(&digest_b64, true);
    let signature: p256::ecdsa::Signature = key.sign(signed_info.as_bytes());
    let signature_b64 = base64::engine::general_purpose::STANDARD.encode(signature.to_bytes());

    let fragment = signature_xml(
        &signed_info_xml(&digest_b64, false),
        &signature_b64,
        &certificate,
    );
    let text = append_to_root(text, &fragment)?;

    Ok((text.into_bytes(), certificate))
}

fn is_signature(node: &roxmltree::Node<'_, '_>) -> bool {
    node.is_element()
        && node.tag_name().name() == ns::node::SIGNATURE
        && node.tag_name().namespace() == Some(ns::DSIG)
}

/// Remove every `ds:Signature` subtree from the document text.
fn strip_signatures(mut text: String) -> Result<String> {
    let mut ranges: Vec<Range<usize>> = {
        let doc = duisign_xml::parse_hardened(&text)?;
        doc.descendants()
            .filter(|n| is_signature(n) && !n.ancestors().skip(1).any(|a| is_signature(&a)))
            .map(|n| n.range())
            .collect()
    };
    // Back to front so earlier ranges stay valid.
    ranges.sort_by(|a, b| b.start.cmp(&a.start));
    for range in ranges {
        text.replace_range(range, "");
    }
    Ok(text)
}

/// Rewrite the RequestID counter if requested and extract the
/// originator business id.
fn prepare_request_id(mut text: String, preserve_counter: bool) -> Result<(String, String)> {
    let (range, content) = {
        let doc = duisign_xml::parse_hardened(&text)?;
        let node = duisign_xml::find_element(&doc, ns::DUIS, ns::node::REQUEST_ID)
            .ok_or_else(|| Error::InternalError("document has no RequestID".into()))?;
        (node.range(), node.text().unwrap_or("").to_owned())
    };

    let content = if preserve_counter {
        content
    } else {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| Error::InternalError(format!("system clock before epoch: {e}")))?
            .as_millis();
        let rewritten = request::rewrite_counter(&content, millis);
        replace_element_text(&mut text, range, &escape::text(&rewritten))?;
        rewritten
    };

    Ok((text, request::originator_id(&content)))
}

/// Replace the character content of the element spanning `range`.
fn replace_element_text(text: &mut String, range: Range<usize>, new_content: &str) -> Result<()> {
    let slice = &text[range.clone()];
    if let Some(close_start) = slice.rfind("</") {
        let open_end = slice
            .find('>')
            .ok_or_else(|| Error::MalformedXml("unterminated start tag".into()))?;
        text.replace_range(
            range.start + open_end + 1..range.start + close_start,
            new_content,
        );
    } else if slice.ends_with("/>") {
        let name: String = slice[1..]
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != '/' && *c != '>')
            .collect();
        let rebuilt = format!("{}>{}</{}>", &slice[..slice.len() - 2], new_content, name);
        text.replace_range(range, &rebuilt);
    } else {
        return Err(Error::MalformedXml("unterminated element".into()));
    }
    Ok(())
}

/// Insert `fragment` as the last child of the root element.
fn append_to_root(mut text: String, fragment: &str) -> Result<String> {
    let range = {
        let doc = duisign_xml::parse_hardened(&text)?;
        doc.root_element().range()
    };
    let slice = &text[range.clone()];
    if let Some(close_start) = slice.rfind("</") {
        text.insert_str(range.start + close_start, fragment);
    } else if slice.ends_with("/>") {
        let name: String = slice[1..]
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != '/' && *c != '>')
            .collect();
        let rebuilt = format!("{}>{}</{}>", &slice[..slice.len() - 2], fragment, name);
        text.replace_range(range, &rebuilt);
    } else {
        return Err(Error::MalformedXml("unterminated root element".into()));
    }
    Ok(text)
}

/// SignedInfo in exclusive-canonical form. With `with_ns` the `ds`
/// declaration is rendered on the element itself, the form the
/// signature is computed over; without it the declaration is inherited
/// from the enclosing `ds:Signature`.
fn signed_info_xml(digest_b64: &str, with_ns: bool) -> String {
    let ns_decl = if with_ns {
        format!(" xmlns:ds=\"{}\"", ns::DSIG)
    } else {
        String::new()
    };
    format!(
        "<ds:SignedInfo{ns_decl}>\
         <ds:CanonicalizationMethod Algorithm=\"{c14n}\"></ds:CanonicalizationMethod>\
         <ds:SignatureMethod Algorithm=\"{sig}\"></ds:SignatureMethod>\
         <ds:Reference URI=\"\">\
         <ds:Transforms>\
         <ds:Transform Algorithm=\"{env}\"></ds:Transform>\
         </ds:Transforms>\
         <ds:DigestMethod Algorithm=\"{dig}\"></ds:DigestMethod>\
         <ds:DigestValue>{digest_b64}</ds:DigestValue>\
         </ds:Reference>\
         </ds:SignedInfo>",
        c14n = algorithm::EXC_C14N,
        sig = algorithm::ECDSA_SHA256,
        env = algorithm::ENVELOPED_SIGNATURE,
        dig = algorithm::SHA256,
    )
}

fn signature_xml(signed_info: &str, signature_b64: &str, certificate: &Certificate) -> String {
    format!(
        "<ds:Signature xmlns:ds=\"{dsig}\">\
         {signed_info}\
         <ds:SignatureValue>{signature_b64}</ds:SignatureValue>\
         <ds:KeyInfo><ds:X509Data><ds:X509IssuerSerial>\
         <ds:X509IssuerName>{issuer}</ds:X509IssuerName>\
         <ds:X509SerialNumber>{serial}</ds:X509SerialNumber>\
         </ds:X509IssuerSerial></ds:X509Data></ds:KeyInfo>\
         </ds:Signature>",
        dsig = ns::DSIG,
        issuer = escape::text(&certificate.issuer()),
        serial = certificate.serial(),
    )
}
