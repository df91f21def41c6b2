//! Document links for DTD references.
//!
//! The system id of the DOCTYPE and of every external entity declaration
//! links to the resource it resolves to. Catalogs and file associations take
//! part in resolution, so the link opens the same file validation reads.

use xmlls_contentmodel::{ContentModelManager, ResourceIdentifier, ResourceKind};
use xmlls_dom::Node;
use xmlls_source_map::Span;

use crate::document::XmlDocument;
use crate::types::DocumentLink;

pub fn document_links(doc: &XmlDocument, manager: &ContentModelManager) -> Vec<DocumentLink> {
    let dom = doc.dom();
    let declarations: Vec<Node<'_>> = match dom.doctype() {
        Some(doctype) => std::iter::once(doctype).chain(doctype.children()).collect(),
        None if dom.is_dtd() => dom.document_node().children().collect(),
        None => Vec::new(),
    };

    let mut links = Vec::new();
    for node in declarations {
        let (kind, public_id, system_id) = if let Some(data) = node.doctype_data() {
            (ResourceKind::Dtd, data.public_id, data.system_id)
        } else if let Some(data) = node.entity_decl_data() {
            (ResourceKind::ExternalEntity, data.public_id, data.system_id)
        } else {
            continue;
        };
        let Some(system_id) = system_id.map(unquoted) else {
            continue;
        };
        if system_id.is_empty() {
            continue;
        }
        let identifier = ResourceIdentifier::new(kind, Some(node.slice(system_id).to_string()))
            .with_public_id(public_id.map(|span| node.slice(unquoted(span)).to_string()))
            .with_base(Some(doc.uri().to_string()));
        match manager.resolver().resolve(&identifier) {
            Ok(target) => links.push(DocumentLink {
                range: doc.range_of(system_id),
                target,
            }),
            Err(error) => tracing::debug!(uri = doc.uri(), %error, "no link for system id"),
        }
    }
    links
}

/// The span inside the quotes of a quoted literal.
fn unquoted(span: Span) -> Span {
    if span.len() >= 2 {
        Span::new(span.start + 1, span.end - 1)
    } else {
        span
    }
}
