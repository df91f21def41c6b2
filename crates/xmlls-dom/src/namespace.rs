//! Namespace resolution over the tree, and the `xsi:` schema hints.

use xmlls_source_map::Span;

use crate::document::{Attr, Document, Node};
use crate::node::Parented;

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// One `namespace location` pair of an `xsi:schemaLocation` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocationHint {
    pub namespace: String,
    pub location: String,
    /// Span of the location token in the document text.
    pub location_span: Span,
}

/// The `xsi:noNamespaceSchemaLocation` of the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoNamespaceSchemaLocation {
    pub location: String,
    pub location_span: Span,
}

impl<'a> Node<'a> {
    /// Resolve `prefix` (`None` for the default namespace) against the
    /// `xmlns` declarations of this element and its ancestors.
    ///
    /// An empty `xmlns=""` undeclares the default namespace.
    pub fn lookup_namespace_uri(&self, prefix: Option<&str>) -> Option<&'a str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        if prefix == Some("xmlns") {
            return Some(XMLNS_NS);
        }
        let scopes = std::iter::once(*self).chain(self.ancestors());
        for scope in scopes.filter(|n| n.is_element()) {
            let declared = scope.attributes().find(|attr| attr.xmlns_prefix() == Some(prefix));
            if let Some(attr) = declared {
                let uri = attr.value();
                return (!uri.is_empty()).then_some(uri);
            }
        }
        None
    }

    /// Namespace of this element's name.
    pub fn namespace_uri(&self) -> Option<&'a str> {
        if !self.is_element() {
            return None;
        }
        self.lookup_namespace_uri(self.prefix())
    }

    /// The nearest prefix bound to `uri` in scope at this element.
    pub fn lookup_prefix(&self, uri: &str) -> Option<&'a str> {
        let scopes = std::iter::once(*self).chain(self.ancestors());
        for scope in scopes.filter(|n| n.is_element()) {
            for attr in scope.attributes() {
                if let Some(Some(prefix)) = attr.xmlns_prefix() {
                    if attr.value() == uri && self.lookup_namespace_uri(Some(prefix)) == Some(uri) {
                        return Some(prefix);
                    }
                }
            }
        }
        None
    }

    /// The attribute named `local` in the XML Schema instance namespace.
    fn xsi_attribute(&self, local: &str) -> Option<Attr<'a>> {
        self.attributes().find(|attr| {
            attr.local_name() == local
                && attr.prefix().is_some()
                && attr.namespace_uri() == Some(XSI_NS)
        })
    }
}

impl<'a> Attr<'a> {
    /// `Some(None)` for `xmlns`, `Some(Some(p))` for `xmlns:p`, `None` for
    /// any other attribute.
    pub fn xmlns_prefix(&self) -> Option<Option<&'a str>> {
        let name = self.name();
        if name == "xmlns" {
            Some(None)
        } else {
            name.strip_prefix("xmlns:").map(Some)
        }
    }

    pub fn is_xmlns(&self) -> bool {
        self.xmlns_prefix().is_some()
    }

    pub fn is_default_xmlns(&self) -> bool {
        self.xmlns_prefix() == Some(None)
    }

    /// Namespace of this attribute's name. Unprefixed attributes are in no
    /// namespace.
    pub fn namespace_uri(&self) -> Option<&'a str> {
        if self.is_xmlns() {
            return Some(XMLNS_NS);
        }
        let prefix = self.prefix()?;
        self.parent()?.lookup_namespace_uri(Some(prefix))
    }

    /// The prefix of this attribute when it is bound to `uri`.
    pub fn prefix_if_matches_uri(&self, uri: &str) -> Option<&'a str> {
        let prefix = self.prefix()?;
        (self.namespace_uri() == Some(uri)).then_some(prefix)
    }
}

impl Document {
    /// Pairs declared by `xsi:schemaLocation` on the root element.
    ///
    /// A trailing namespace with no location is ignored.
    pub fn schema_location_hints(&self) -> Vec<SchemaLocationHint> {
        let Some(attr) = self
            .root_element()
            .and_then(|root| root.xsi_attribute("schemaLocation"))
        else {
            return Vec::new();
        };
        let Some(content) = attr.value_content_span() else {
            return Vec::new();
        };
        let tokens = tokens_with_spans(content.slice(self.text()), content.start);
        tokens
            .chunks_exact(2)
            .map(|pair| SchemaLocationHint {
                namespace: pair[0].0.to_string(),
                location: pair[1].0.to_string(),
                location_span: pair[1].1,
            })
            .collect()
    }

    /// `xsi:noNamespaceSchemaLocation` on the root element.
    pub fn no_namespace_schema_location(&self) -> Option<NoNamespaceSchemaLocation> {
        let attr = self
            .root_element()?
            .xsi_attribute("noNamespaceSchemaLocation")?;
        let content = attr.value_content_span()?;
        let raw = content.slice(self.text());
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lead = raw.len() - raw.trim_start().len();
        let start = content.start + lead;
        Some(NoNamespaceSchemaLocation {
            location: trimmed.to_string(),
            location_span: Span::new(start, start + trimmed.len()),
        })
    }

    /// Whether the root element points at an XML Schema.
    pub fn has_schema_location(&self) -> bool {
        !self.schema_location_hints().is_empty() || self.no_namespace_schema_location().is_some()
    }

    /// The default namespace declared on the root element.
    pub fn root_namespace(&self) -> Option<&str> {
        self.root_element()?.namespace_uri()
    }
}

fn tokens_with_spans(text: &str, base: usize) -> Vec<(&str, Span)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (idx, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push((&text[s..idx], Span::new(base + s, base + idx)));
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use crate::parse;

    use super::*;

    #[test]
    fn test_default_namespace_is_inherited() {
        let doc = parse("<r xmlns=\"urn:a\"><c/></r>");
        let c = doc.root_element().unwrap().first_child().unwrap();
        assert_eq!(c.namespace_uri(), Some("urn:a"));
    }

    #[test]
    fn test_prefixed_namespace() {
        let doc = parse("<r xmlns:p=\"urn:x\"><p:c/></r>");
        let c = doc.root_element().unwrap().first_child().unwrap();
        assert_eq!(c.prefix(), Some("p"));
        assert_eq!(c.namespace_uri(), Some("urn:x"));
        assert_eq!(c.lookup_prefix("urn:x"), Some("p"));
    }

    #[test]
    fn test_unbound_prefix_after_removal() {
        let doc = parse("<r><p:c/></r>");
        let c = doc.root_element().unwrap().first_child().unwrap();
        assert_eq!(c.namespace_uri(), None);
    }

    #[test]
    fn test_empty_default_namespace_undeclares() {
        let doc = parse("<r xmlns=\"urn:a\"><c xmlns=\"\"/></r>");
        let c = doc.root_element().unwrap().first_child().unwrap();
        assert_eq!(c.namespace_uri(), None);
    }

    #[test]
    fn test_xml_prefix_is_prebound() {
        let doc = parse("<r xml:lang=\"en\"/>");
        let attr = doc.root_element().unwrap().attribute("xml:lang").unwrap();
        assert_eq!(attr.namespace_uri(), Some(XML_NS));
    }

    #[test]
    fn test_schema_location_hints() {
        let text = "<r xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:schemaLocation=\"urn:a a.xsd\n  urn:b  b.xsd urn:dangling\"/>";
        let doc = parse(text);
        let hints = doc.schema_location_hints();
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[0].namespace, "urn:a");
        assert_eq!(hints[0].location, "a.xsd");
        assert_eq!(hints[0].location_span.slice(text), "a.xsd");
        assert_eq!(hints[1].location_span.slice(text), "b.xsd");
        assert!(doc.has_schema_location());
    }

    #[test]
    fn test_xsi_attribute_with_other_prefix() {
        let text = "<r xmlns:i=\"http://www.w3.org/2001/XMLSchema-instance\" i:noNamespaceSchemaLocation=\" r.xsd \"/>";
        let doc = parse(text);
        let hint = doc.no_namespace_schema_location().unwrap();
        assert_eq!(hint.location, "r.xsd");
        assert_eq!(hint.location_span.slice(text), "r.xsd");
    }

    #[test]
    fn test_xsi_prefix_must_be_bound() {
        let doc = parse("<r xsi:noNamespaceSchemaLocation=\"r.xsd\"/>");
        assert!(doc.no_namespace_schema_location().is_none());
        assert!(!doc.has_schema_location());
    }
}
