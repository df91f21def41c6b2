//! Navigation from IDREF attribute values to the IDs they name.

use std::collections::BTreeSet;

use xmlls_contentmodel::{ContentModelManager, find_idref_declaration, search_id_attributes};
use xmlls_dom::Attr;
use xmlls_source_map::{PositionRange, TextDocument};

use crate::document::XmlDocument;
use crate::types::{CompletionItem, DocumentHighlight, DocumentHighlightKind, Location, TextEdit};

/// The IDREF-typed attribute whose value contains `offset`.
fn idref_at<'d>(doc: &'d XmlDocument, offset: usize, manager: &ContentModelManager) -> Option<Attr<'d>> {
    let attr = doc.dom().find_attr_at(offset)?;
    if !attr.value_span().is_some_and(|span| span.touches(offset)) {
        return None;
    }
    find_idref_declaration(attr, manager)?;
    Some(attr)
}

fn range_in(doc: &XmlDocument, attr: Attr<'_>) -> Option<(String, PositionRange)> {
    let span = attr.value_content_span()?;
    let target = attr.document();
    match target.uri() {
        Some(uri) if uri == doc.uri() => Some((uri.to_string(), doc.range_of(span))),
        Some(uri) => Some((
            uri.to_string(),
            TextDocument::new(uri, 0, target.shared_text()).range_of(span),
        )),
        None => None,
    }
}

/// Where the ID named by the IDREF value at `offset` is declared, in this
/// document or in documents it includes.
pub fn idref_definitions(doc: &XmlDocument, offset: usize, manager: &ContentModelManager) -> Vec<Location> {
    let Some(origin) = idref_at(doc, offset, manager) else {
        return Vec::new();
    };
    let mut locations = Vec::new();
    for cm_document in manager.find_cm_document(origin.owner()) {
        search_id_attributes(
            origin,
            &cm_document,
            true,
            true,
            manager.loader().as_ref(),
            &mut |_, target| {
                if let Some((uri, range)) = range_in(doc, target) {
                    locations.push(Location { uri, range });
                }
            },
        );
    }
    locations
}

/// The IDREF value at `offset` and the matching IDs in the same document.
pub fn idref_highlights(
    doc: &XmlDocument,
    offset: usize,
    manager: &ContentModelManager,
) -> Vec<DocumentHighlight> {
    let Some(origin) = idref_at(doc, offset, manager) else {
        return Vec::new();
    };
    let Some(origin_span) = origin.value_content_span() else {
        return Vec::new();
    };
    let mut highlights = vec![DocumentHighlight {
        range: doc.range_of(origin_span),
        kind: DocumentHighlightKind::Read,
    }];
    for cm_document in manager.find_cm_document(origin.owner()) {
        search_id_attributes(
            origin,
            &cm_document,
            true,
            false,
            manager.loader().as_ref(),
            &mut |_, target| {
                if let Some(span) = target.value_content_span() {
                    highlights.push(DocumentHighlight {
                        range: doc.range_of(span),
                        kind: DocumentHighlightKind::Write,
                    });
                }
            },
        );
    }
    highlights
}

/// Every ID value the IDREF attribute at `offset` could take, each once.
pub fn idref_completions(
    doc: &XmlDocument,
    offset: usize,
    manager: &ContentModelManager,
) -> Vec<CompletionItem> {
    let Some(origin) = idref_at(doc, offset, manager) else {
        return Vec::new();
    };
    let Some(replace) = origin.value_content_span() else {
        return Vec::new();
    };
    let mut values = BTreeSet::new();
    for cm_document in manager.find_cm_document(origin.owner()) {
        search_id_attributes(
            origin,
            &cm_document,
            false,
            true,
            manager.loader().as_ref(),
            &mut |prefix, target| {
                let value = match prefix {
                    Some(prefix) => format!("{prefix}:{}", target.value()),
                    None => target.value().to_string(),
                };
                values.insert(value);
            },
        );
    }
    let range = doc.range_of(replace);
    values
        .into_iter()
        .map(|value| CompletionItem {
            text_edit: Some(TextEdit {
                range,
                new_text: value.clone(),
            }),
            label: value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use xmlls_contentmodel::MemoryResourceLoader;

    const TEXT: &str = r#"<!DOCTYPE book [
<!ELEMENT book (chapter|ref)*>
<!ELEMENT chapter EMPTY>
<!ATTLIST chapter id ID #REQUIRED>
<!ELEMENT ref EMPTY>
<!ATTLIST ref to IDREF #REQUIRED>
]>
<book><chapter id="intro"/><chapter id="usage"/><ref to="usage"/></book>"#;

    fn fixture() -> (XmlDocument, ContentModelManager, usize) {
        let doc = XmlDocument::new("file:///docs/book.xml", 1, TEXT);
        let manager = ContentModelManager::new(Arc::new(MemoryResourceLoader::new()));
        let offset = TEXT.rfind("usage").unwrap() + 2;
        (doc, manager, offset)
    }

    #[test]
    fn test_definition_points_at_id() {
        let (doc, manager, offset) = fixture();
        let locations = idref_definitions(&doc, offset, &manager);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri, "file:///docs/book.xml");
        let expected = TEXT.find("usage").unwrap();
        assert_eq!(doc.text().offset_at(locations[0].range.start), expected);
    }

    #[test]
    fn test_highlights_reference_and_id() {
        let (doc, manager, offset) = fixture();
        let kinds: Vec<_> = idref_highlights(&doc, offset, &manager)
            .iter()
            .map(|highlight| highlight.kind)
            .collect();
        assert_eq!(kinds, vec![DocumentHighlightKind::Read, DocumentHighlightKind::Write]);
    }

    #[test]
    fn test_completions_list_all_ids() {
        let (doc, manager, offset) = fixture();
        let labels: Vec<_> = idref_completions(&doc, offset, &manager)
            .into_iter()
            .map(|item| item.label)
            .collect();
        assert_eq!(labels, vec!["intro", "usage"]);
    }

    #[test]
    fn test_id_attribute_is_not_a_reference() {
        let (doc, manager, _) = fixture();
        let offset = TEXT.find("intro").unwrap();
        assert!(idref_definitions(&doc, offset, &manager).is_empty());
    }
}
