#![forbid(unsafe_code)]

//! DUIS schema validation.
//!
//! The schema is fixed and ships with the build; it is compiled once on
//! first use and cached for the lifetime of the process. Validation is
//! structural: the root element must be one of the schema's global
//! elements in the DUIS target namespace, every element must belong to
//! the DUIS or XML-DSig namespace, and a `Request` must carry a
//! `RequestID` matching the schema's pattern.
//!
//! Instance documents carrying a DOCTYPE are rejected outright as
//! malformed; the local DTD redirect in [`dtd`] exists only for the two
//! well-known identifiers referenced by schema documents themselves.

pub mod dtd;

use duisign_core::{ns, Error, Result};
use std::sync::OnceLock;

/// The bundled DUIS schema document.
const DUIS_XSD: &str = include_str!("../resources/duis.xsd");

/// The kind of DUIS message, from the document's root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub kind: MessageKind,
}

/// A schema compiled from the bundled XSD: the target namespace and the
/// set of global element declarations.
#[derive(Debug)]
pub struct CompiledSchema {
    target_ns: String,
    global_elements: Vec<String>,
}

impl CompiledSchema {
    fn compile(xsd_text: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse_with_options(xsd_text, duisign_xml::parsing_options())
            .map_err(|e| Error::InternalError(format!("schema parse failed: {e}")))?;

        let root = doc.root_element();
        if root.tag_name().name() != "schema"
            || root.tag_name().namespace() != Some(ns::XSD)
        {
            return Err(Error::InternalError(
                "schema document root is not xs:schema".into(),
            ));
        }

        let target_ns = root
            .attribute("targetNamespace")
            .ok_or_else(|| Error::InternalError("schema has no targetNamespace".into()))?
            .to_owned();

        // Any location a schema document points at must resolve to a
        // bundled local copy; schema compilation never touches the
        // network or the filesystem.
        for node in doc.descendants().filter(|n| {
            n.is_element()
                && n.tag_name().namespace() == Some(ns::XSD)
                && matches!(n.tag_name().name(), "import" | "include" | "redefine")
        }) {
            if let Some(location) = node.attribute("schemaLocation") {
                dtd::resolve(location)?;
            }
        }

        let global_elements: Vec<String> = root
            .children()
            .filter(|n| {
                n.is_element()
                    && n.tag_name().name() == "element"
                    && n.tag_name().namespace() == Some(ns::XSD)
            })
            .filter_map(|n| n.attribute("name").map(str::to_owned))
            .collect();

        if global_elements.is_empty() {
            return Err(Error::InternalError(
                "schema declares no global elements".into(),
            ));
        }

        Ok(Self {
            target_ns,
            global_elements,
        })
    }

    pub fn target_namespace(&self) -> &str {
        &self.target_ns
    }

    pub fn global_elements(&self) -> &[String] {
        &self.global_elements
    }
}

/// Get the compiled schema, building it on first use.
///
/// A compilation failure is permanent for the process and reported as
/// an internal error on every call.
pub fn schema() -> Result<&'static CompiledSchema> {
    static SCHEMA: OnceLock<std::result::Result<CompiledSchema, String>> = OnceLock::new();
    match SCHEMA.get_or_init(|| CompiledSchema::compile(DUIS_XSD).map_err(|e| e.to_string())) {
        Ok(s) => Ok(s),
        Err(e) => Err(Error::InternalError(e.clone())),
    }
}

/// Validate a DUIS message.
///
/// Returns [`Error::MalformedXml`] when the input is not well-formed
/// XML (or contains a DOCTYPE), and [`Error::SchemaInvalid`] when it is
/// well-formed but does not conform.
pub fn validate(data: &[u8]) -> Result<ParsedMessage> {
    let text = duisign_xml::document::decode_utf8(data)?;
    let doc = duisign_xml::parse_hardened(text)?;
    let schema = schema()?;

    let root = doc.root_element();
    let root_name = root.tag_name().name();
    if root.tag_name().namespace() != Some(schema.target_namespace())
        || !schema.global_elements().iter().any(|e| e == root_name)
    {
        return Err(Error::SchemaInvalid(format!(
            "root element {{{}}}{} is not a declared message",
            root.tag_name().namespace().unwrap_or(""),
            root_name
        )));
    }

    for node in doc.descendants().filter(|n| n.is_element()) {
        let elem_ns = node.tag_name().namespace().unwrap_or("");
        if elem_ns != schema.target_namespace() && elem_ns != ns::DSIG {
            return Err(Error::SchemaInvalid(format!(
                "element {{{elem_ns}}}{} is outside the DUIS and Signature namespaces",
                node.tag_name().name()
            )));
        }
    }

    let kind = match root_name {
        n if n == ns::node::REQUEST => MessageKind::Request,
        n if n == ns::node::RESPONSE => MessageKind::Response,
        other => {
            return Err(Error::SchemaInvalid(format!(
                "unsupported message root: {other}"
            )))
        }
    };

    if kind == MessageKind::Request {
        let request_id = duisign_xml::find_element(&doc, schema.target_namespace(), ns::node::REQUEST_ID)
            .ok_or_else(|| Error::SchemaInvalid("Request has no RequestID".into()))?;
        let text = request_id.text().unwrap_or("").trim();
        if !is_valid_request_id(text) {
            return Err(Error::SchemaInvalid(format!(
                "RequestID does not match the schema pattern: {text}"
            )));
        }
    }

    Ok(ParsedMessage { kind })
}

/// Check a RequestID against the schema's pattern:
/// two EUI-64 identifiers (eight hyphen-separated hex octets each) and a
/// decimal counter, colon-separated.
pub fn is_valid_request_id(text: &str) -> bool {
    let mut parts = text.split(':');
    let (Some(from), Some(to), Some(counter), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    is_eui64(from) && is_eui64(to) && !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit())
}

fn is_eui64(part: &str) -> bool {
    let octets: Vec<&str> = part.split('-').collect();
    octets.len() == 8
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.bytes().all(|b| b.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUIS_NS: &str = "http://www.dccinterface.co.uk/ServiceUserGateway";

    fn request(request_id: &str) -> String {
        format!(
            r#"<Request xmlns="{DUIS_NS}"><Header><RequestID>{request_id}</RequestID></Header><Body/></Request>"#
        )
    }

    #[test]
    fn test_schema_compiles() {
        let s = schema().unwrap();
        assert_eq!(s.target_namespace(), DUIS_NS);
        assert!(s.global_elements().iter().any(|e| e == "Request"));
        assert!(s.global_elements().iter().any(|e| e == "Response"));
    }

    #[test]
    fn test_remote_schema_location_fails_compilation() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                       targetNamespace="urn:t">
              <xs:import namespace="urn:o" schemaLocation="http://example.com/o.xsd"/>
              <xs:element name="Root"/>
            </xs:schema>"#;
        assert!(matches!(
            CompiledSchema::compile(xsd),
            Err(Error::InternalError(_))
        ));
    }

    #[test]
    fn test_valid_request() {
        let xml = request("90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:1000");
        let msg = validate(xml.as_bytes()).unwrap();
        assert_eq!(msg.kind, MessageKind::Request);
    }

    #[test]
    fn test_valid_response() {
        let xml = format!(r#"<Response xmlns="{DUIS_NS}"/>"#);
        let msg = validate(xml.as_bytes()).unwrap();
        assert_eq!(msg.kind, MessageKind::Response);
    }

    #[test]
    fn test_doctype_is_malformed() {
        let xml = format!(
            "<!DOCTYPE Request SYSTEM \"evil.dtd\"><Request xmlns=\"{DUIS_NS}\"/>"
        );
        assert!(matches!(
            validate(xml.as_bytes()),
            Err(Error::MalformedXml(_))
        ));
    }

    #[test]
    fn test_not_xml_is_malformed() {
        assert!(matches!(
            validate(b"not xml at all"),
            Err(Error::MalformedXml(_))
        ));
    }

    #[test]
    fn test_wrong_root_namespace() {
        let xml = r#"<Request xmlns="urn:other"/>"#;
        assert!(matches!(
            validate(xml.as_bytes()),
            Err(Error::SchemaInvalid(_))
        ));
    }

    #[test]
    fn test_foreign_element_rejected() {
        let xml = format!(
            r#"<Request xmlns="{DUIS_NS}" xmlns:f="urn:foreign"><Header><RequestID>90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:1</RequestID></Header><f:Body/></Request>"#
        );
        assert!(matches!(
            validate(xml.as_bytes()),
            Err(Error::SchemaInvalid(_))
        ));
    }

    #[test]
    fn test_request_without_request_id() {
        let xml = format!(r#"<Request xmlns="{DUIS_NS}"><Body/></Request>"#);
        assert!(matches!(
            validate(xml.as_bytes()),
            Err(Error::SchemaInvalid(_))
        ));
    }

    #[test]
    fn test_request_id_pattern() {
        assert!(is_valid_request_id(
            "90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:1000"
        ));
        assert!(!is_valid_request_id("90-B3:00-07:1000"));
        assert!(!is_valid_request_id(
            "90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:"
        ));
        assert!(!is_valid_request_id(
            "90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:12ab"
        ));
        assert!(!is_valid_request_id(""));
    }
}
