#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only "visibly utilized" namespace declarations are output. A namespace
//! is visibly utilized on an element if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList.

use crate::escape;
use duisign_core::Error;
use duisign_xml::NodeSet;
use std::collections::{BTreeMap, HashSet};

/// Canonicalize a parsed document (or a subset of it) using exc-C14N.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let prefix_set: HashSet<String> = inclusive_prefixes.iter().cloned().collect();
    let mut output = Vec::new();
    let ctx = ExcC14nContext {
        with_comments,
        node_set,
        inclusive_prefixes: prefix_set,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct ExcC14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive_prefixes: HashSet<String>,
}

impl ExcC14nContext<'_> {
    fn is_visible(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        match self.node_set {
            None => true,
            Some(set) => set.contains(node),
        }
    }

    fn process_node(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            roxmltree::NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered_ns)?;
                }
            }
            roxmltree::NodeType::Element => {
                self.process_element(node, output, rendered_ns)?;
            }
            roxmltree::NodeType::Text => {
                if self.is_visible(&node) {
                    let text = node.text().unwrap_or("");
                    output.extend_from_slice(escape::text(text).as_bytes());
                }
            }
            roxmltree::NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    let parent_is_root = node
                        .parent()
                        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);

                    if parent_is_root && node.prev_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }

                    output.extend_from_slice(b"<!--");
                    output.extend_from_slice(node.text().unwrap_or("").as_bytes());
                    output.extend_from_slice(b"-->");

                    if parent_is_root && node.next_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                }
            }
            roxmltree::NodeType::PI => {
                if self.is_visible(&node) {
                    let parent_is_root = node
                        .parent()
                        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);

                    if parent_is_root && node.prev_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }

                    if let Some(pi) = node.pi() {
                        output.extend_from_slice(b"<?");
                        output.extend_from_slice(pi.target.as_bytes());
                        if let Some(value) = pi.value {
                            if !value.is_empty() {
                                output.push(b' ');
                                output.extend_from_slice(escape::pi(value).as_bytes());
                            }
                        }
                        output.extend_from_slice(b"?>");
                    }

                    if parent_is_root && node.next_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            // Invisible elements render nothing themselves. Their visible
            // descendants (if any) inherit the same rendered-namespace
            // context from the nearest visible ancestor.
            for child in node.children() {
                self.process_node(child, output, rendered_ns)?;
            }
            return Ok(());
        }

        // Determine which namespace prefixes are visibly utilized.
        let mut utilized_prefixes: HashSet<String> = HashSet::new();
        utilized_prefixes.insert(element_prefix(&node).unwrap_or("").to_owned());

        for attr in node.attributes() {
            if let Some(prefix) = attr_prefix(&node, &attr) {
                if !prefix.is_empty() {
                    utilized_prefixes.insert(prefix.to_owned());
                }
            }
        }

        // "#default" in the PrefixList means the default namespace.
        for p in &self.inclusive_prefixes {
            if p == "#default" {
                utilized_prefixes.insert(String::new());
            } else {
                utilized_prefixes.insert(p.clone());
            }
        }

        let inscope_ns = collect_inscope_namespaces(&node);

        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in &utilized_prefixes {
            // xmlns:xml is never output
            if prefix == "xml" {
                continue;
            }

            if let Some(uri) = inscope_ns.get(prefix) {
                // Only output if different from what an output ancestor
                // already rendered for this prefix.
                if rendered_ns.get(prefix) != Some(uri) {
                    ns_decls.push(NsDecl {
                        prefix: prefix.clone(),
                        uri: uri.clone(),
                    });
                }
            } else if prefix.is_empty() {
                // The element has no default namespace here, but a visible
                // ancestor rendered a non-empty one: undeclare it.
                if rendered_ns.get("").is_some_and(|u| !u.is_empty()) {
                    ns_decls.push(NsDecl {
                        prefix: String::new(),
                        uri: String::new(),
                    });
                }
            }
        }
        // The default (empty) prefix sorts before any named prefix on
        // its own, so plain prefix order is the canonical order.
        ns_decls.sort_by(|a, b| a.prefix.cmp(&b.prefix));

        let mut attrs: Vec<OutAttr> = Vec::new();
        for attr in node.attributes() {
            let ns_uri = attr.namespace().unwrap_or("");
            let qname = match attr_prefix(&node, &attr) {
                Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, attr.name()),
                _ => attr.name().to_owned(),
            };
            attrs.push(OutAttr {
                ns_uri: ns_uri.to_owned(),
                local_name: attr.name().to_owned(),
                qualified_name: qname,
                value: attr.value().to_owned(),
            });
        }
        // Unqualified attributes (empty URI) first, then by (URI, local).
        attrs.sort_by(|a, b| {
            (a.ns_uri.as_str(), a.local_name.as_str())
                .cmp(&(b.ns_uri.as_str(), b.local_name.as_str()))
        });

        let elem_name = qualified_element_name(&node);

        output.push(b'<');
        output.extend_from_slice(elem_name.as_bytes());
        for ns_decl in &ns_decls {
            ns_decl.write_into(output);
        }
        for attr in &attrs {
            attr.write_into(output);
        }
        output.push(b'>');

        let mut child_rendered_ns = rendered_ns.clone();
        for ns_decl in &ns_decls {
            if ns_decl.uri.is_empty() {
                child_rendered_ns.remove(&ns_decl.prefix);
            } else {
                child_rendered_ns.insert(ns_decl.prefix.clone(), ns_decl.uri.clone());
            }
        }

        for child in node.children() {
            self.process_node(child, output, &child_rendered_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');
        Ok(())
    }
}

/// A namespace declaration selected for output.
struct NsDecl {
    /// "" for the default namespace.
    prefix: String,
    /// "" to undeclare the default namespace.
    uri: String,
}

impl NsDecl {
    fn write_into(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(b" xmlns");
        if !self.prefix.is_empty() {
            output.push(b':');
            output.extend_from_slice(self.prefix.as_bytes());
        }
        output.extend_from_slice(b"=\"");
        output.extend_from_slice(escape::attr(&self.uri).as_bytes());
        output.push(b'"');
    }
}

/// An attribute selected for output.
struct OutAttr {
    ns_uri: String,
    local_name: String,
    qualified_name: String,
    value: String,
}

impl OutAttr {
    fn write_into(&self, output: &mut Vec<u8>) {
        output.push(b' ');
        output.extend_from_slice(self.qualified_name.as_bytes());
        output.extend_from_slice(b"=\"");
        output.extend_from_slice(escape::attr(&self.value).as_bytes());
        output.push(b'"');
    }
}

/// Collect all in-scope namespaces for an element.
///
/// Walks up the ancestor chain; closer declarations override more
/// distant ones.
fn collect_inscope_namespaces(node: &roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    let mut ns_stack: Vec<BTreeMap<String, String>> = Vec::new();

    let mut current = Some(*node);
    while let Some(n) = current {
        if n.is_element() {
            let mut level = BTreeMap::new();
            for ns in n.namespaces() {
                level.insert(ns.name().unwrap_or("").to_owned(), ns.uri().to_owned());
            }
            ns_stack.push(level);
        }
        current = n.parent();
    }

    let mut result = BTreeMap::new();
    for level in ns_stack.into_iter().rev() {
        for (prefix, uri) in level {
            if uri.is_empty() {
                result.remove(&prefix);
            } else {
                result.insert(prefix, uri);
            }
        }
    }
    result
}

/// The prefix an element's namespace is reachable through, if any.
///
/// An element in the default namespace (or no namespace) has no prefix.
fn element_prefix<'a>(node: &roxmltree::Node<'a, '_>) -> Option<&'a str> {
    let uri = node.tag_name().namespace()?;
    node.lookup_prefix(uri).filter(|p| !p.is_empty())
}

/// Get the qualified element name (prefix:local or just local).
fn qualified_element_name(node: &roxmltree::Node<'_, '_>) -> String {
    match element_prefix(node) {
        Some(prefix) => format!("{}:{}", prefix, node.tag_name().name()),
        None => node.tag_name().name().to_owned(),
    }
}

/// The prefix a namespaced attribute is reachable through. Attributes
/// never take the default namespace, so a namespaced attribute always
/// has one.
fn attr_prefix<'a>(
    node: &roxmltree::Node<'a, '_>,
    attr: &roxmltree::Attribute<'a, '_>,
) -> Option<&'a str> {
    let uri = attr.namespace()?;
    if uri == duisign_core::ns::XML {
        return Some("xml");
    }
    node.lookup_prefix(uri)
}
