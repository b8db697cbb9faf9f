#![forbid(unsafe_code)]

//! Parsing and element lookup helpers over roxmltree.

use duisign_core::Error;

/// Parse XML text with hardened options.
///
/// Any parse failure, including a DOCTYPE declaration, maps to
/// [`Error::MalformedXml`].
pub fn parse_hardened(text: &str) -> Result<roxmltree::Document<'_>, Error> {
    roxmltree::Document::parse_with_options(text, crate::parsing_options())
        .map_err(|e| Error::MalformedXml(e.to_string()))
}

/// Decode input bytes as UTF-8 XML text.
pub fn decode_utf8(data: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(data).map_err(|e| Error::MalformedXml(format!("invalid UTF-8: {e}")))
}

/// Find the first descendant element with the given local name and namespace.
pub fn find_element<'a>(
    doc: &'a roxmltree::Document<'a>,
    ns: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    doc.descendants().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns
    })
}

/// Find all descendant elements with the given local name and namespace.
pub fn find_elements<'a>(
    doc: &'a roxmltree::Document<'a>,
    ns: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'a>> {
    doc.descendants()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns
        })
        .collect()
}

/// Find the first direct child element with the given local name and namespace.
pub fn find_child_element<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    parent.children().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_doctype() {
        let xml = r#"<!DOCTYPE r [<!ENTITY x "y">]><r>&x;</r>"#;
        let result = parse_hardened(xml);
        assert!(matches!(result, Err(Error::MalformedXml(_))));
    }

    #[test]
    fn test_parse_rejects_truncated() {
        assert!(parse_hardened("<r><unclosed></r>").is_err());
    }

    #[test]
    fn test_find_element_by_namespace() {
        let xml = r#"<a xmlns="urn:one" xmlns:b="urn:two"><b:x/><x/></a>"#;
        let doc = parse_hardened(xml).unwrap();
        let found = find_element(&doc, "urn:two", "x").unwrap();
        assert_eq!(found.tag_name().namespace(), Some("urn:two"));
        assert!(find_element(&doc, "urn:three", "x").is_none());
    }
}
