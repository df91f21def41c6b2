//! Finding the ID attributes an IDREF value can point at.
//!
//! The search walks the elements below the root of the origin document and,
//! when asked, the documents named by `include` elements (`href`), each at
//! most once.

use std::collections::HashSet;

use xmlls_dom::{Attr, Node, parse_with_uri};

use crate::loader::ResourceLoader;
use crate::manager::ContentModelManager;
use crate::model::{CMAttributeDeclaration, CMDocument};
use crate::resolver::expand_system_id;

const INCLUDE_TAG: &str = "include";
const HREF_ATTR: &str = "href";

/// The declaration of `attr` when it is typed IDREF or IDREFS.
pub fn find_idref_declaration(
    attr: Attr<'_>,
    manager: &ContentModelManager,
) -> Option<CMAttributeDeclaration> {
    manager
        .find_cm_attribute(attr)
        .filter(CMAttributeDeclaration::is_idref)
}

/// Report ID attributes declared by `cm_document` to `collector`, together
/// with the prefix of the origin value (`ns:name` yields `ns`).
///
/// With `match_value` only attributes whose value equals the origin value
/// (without its prefix) are reported; an empty origin value then matches
/// nothing. With `search_external` included documents are read through
/// `loader`.
pub fn search_id_attributes(
    origin: Attr<'_>,
    cm_document: &CMDocument,
    match_value: bool,
    search_external: bool,
    loader: &dyn ResourceLoader,
    collector: &mut dyn FnMut(Option<&str>, Attr<'_>),
) {
    let Some(root) = origin.document().root_element() else {
        return;
    };
    let value = origin.value();
    if match_value && value.is_empty() {
        return;
    }
    let (prefix, name) = match value.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, value),
    };
    let search = IdSearch {
        cm_document,
        prefix,
        wanted: match_value.then_some(name),
        search_external,
        loader,
    };
    let mut visited = HashSet::new();
    search.search_document(root, &mut visited, collector);
}

struct IdSearch<'s> {
    cm_document: &'s CMDocument,
    prefix: Option<&'s str>,
    wanted: Option<&'s str>,
    search_external: bool,
    loader: &'s dyn ResourceLoader,
}

impl IdSearch<'_> {
    fn search_document(
        &self,
        root: Node<'_>,
        visited: &mut HashSet<String>,
        collector: &mut dyn FnMut(Option<&str>, Attr<'_>),
    ) {
        let document_uri = root.document().uri().map(str::to_string);
        if !visited.insert(document_uri.clone().unwrap_or_default()) {
            return;
        }
        let mut includes = Vec::new();
        self.search_children(root, &mut includes, collector);
        if !self.search_external {
            return;
        }
        for href in includes {
            let Ok(uri) = expand_system_id(&href, document_uri.as_deref()) else {
                continue;
            };
            if !uri.starts_with("file:") || visited.contains(&uri) {
                continue;
            }
            match self.loader.load(&uri) {
                Ok(bytes) => {
                    let included = parse_with_uri(String::from_utf8_lossy(&bytes).into_owned(), uri);
                    if let Some(included_root) = included.root_element() {
                        self.search_document(included_root, visited, collector);
                    }
                }
                Err(error) => tracing::debug!(%uri, %error, "skipping unreadable include"),
            }
        }
    }

    fn search_children(
        &self,
        element: Node<'_>,
        includes: &mut Vec<String>,
        collector: &mut dyn FnMut(Option<&str>, Attr<'_>),
    ) {
        for child in element.child_elements() {
            if let Some(decl) = self.cm_document.find_cm_element(child) {
                for declared in decl.attributes().iter().filter(|declared| declared.is_id()) {
                    let Some(target) = child.attribute(declared.local_name()) else {
                        continue;
                    };
                    if self.wanted.is_none_or(|wanted| wanted == target.value()) {
                        collector(self.prefix, target);
                    }
                }
            }
            if child.local_name() == Some(INCLUDE_TAG) {
                if let Some(href) = child.attribute_value(HREF_ATTR) {
                    includes.push(href.to_string());
                }
            } else {
                self.search_children(child, includes, collector);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryResourceLoader;
    use std::sync::Arc;
    use xmlls_dom::Document;

    const SUBSET: &str = r#"<!DOCTYPE book [
<!ELEMENT book (chapter|include|ref)*>
<!ELEMENT chapter EMPTY>
<!ATTLIST chapter id ID #REQUIRED>
<!ELEMENT ref EMPTY>
<!ATTLIST ref to IDREF #REQUIRED>
<!ELEMENT include EMPTY>
<!ATTLIST include href CDATA #REQUIRED>
]>"#;

    fn fixture(body: &str) -> (Document, ContentModelManager) {
        let loader = MemoryResourceLoader::new();
        loader.insert(
            "file:///docs/more.xml",
            r#"<book><chapter id="extra"/><include href="main.xml"/></book>"#,
        );
        let doc = parse_with_uri(format!("{SUBSET}{body}"), "file:///docs/main.xml");
        (doc, ContentModelManager::new(Arc::new(loader)))
    }

    fn ids(
        doc: &Document,
        manager: &ContentModelManager,
        match_value: bool,
        search_external: bool,
    ) -> Vec<(Option<String>, String)> {
        let reference = doc
            .nodes()
            .find(|node| node.name() == Some("ref"))
            .and_then(|node| node.attribute("to"))
            .unwrap();
        let cm = manager.find_cm_document(reference.owner()).remove(0);
        let mut found = Vec::new();
        search_id_attributes(
            reference,
            &cm,
            match_value,
            search_external,
            manager.loader().as_ref(),
            &mut |prefix, attr| found.push((prefix.map(str::to_string), attr.value().to_string())),
        );
        found
    }

    #[test]
    fn test_idref_declaration() {
        let (doc, manager) = fixture(r#"<book><chapter id="a"/><ref to="a"/></book>"#);
        let chapter = doc.nodes().find(|node| node.name() == Some("chapter")).unwrap();
        let reference = doc.nodes().find(|node| node.name() == Some("ref")).unwrap();
        assert!(find_idref_declaration(reference.attribute("to").unwrap(), &manager).is_some());
        assert!(find_idref_declaration(chapter.attribute("id").unwrap(), &manager).is_none());
    }

    #[test]
    fn test_matching_id() {
        let (doc, manager) = fixture(
            r#"<book><chapter id="intro"/><chapter id="usage"/><ref to="usage"/></book>"#,
        );
        assert_eq!(ids(&doc, &manager, true, false), vec![(None, "usage".to_string())]);
    }

    #[test]
    fn test_prefixed_origin_value() {
        let (doc, manager) = fixture(r#"<book><chapter id="usage"/><ref to="b:usage"/></book>"#);
        assert_eq!(
            ids(&doc, &manager, true, false),
            vec![(Some("b".to_string()), "usage".to_string())]
        );
    }

    #[test]
    fn test_all_ids_through_includes() {
        let (doc, manager) = fixture(
            r#"<book><chapter id="intro"/><include href="more.xml"/><ref to=""/></book>"#,
        );
        let values: Vec<String> = ids(&doc, &manager, false, true)
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        assert_eq!(values, vec!["intro", "extra"]);
        assert!(ids(&doc, &manager, true, true).is_empty());
    }
}
