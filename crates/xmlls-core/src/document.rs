//! Parsed document snapshots and the store that hands them out.
//!
//! Every text version gets its own [`XmlDocument`]: the text snapshot and
//! the parse tree built from it. Snapshots are shared as
//! `Arc<XmlDocument>`, so a validation pass can keep reading an old version
//! while the store already holds a newer one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use xmlls_dom::{Document, parse_shared};
use xmlls_source_map::{PositionRange, Span, TextDocument};

/// One version of an XML document: its text and its parse tree.
#[derive(Debug)]
pub struct XmlDocument {
    text: TextDocument,
    dom: Document,
}

impl XmlDocument {
    pub fn new(uri: impl Into<String>, version: i32, text: impl Into<Arc<str>>) -> Self {
        let text = TextDocument::new(uri, version, text);
        let dom = parse_shared(text.shared_text(), Some(text.uri().to_string()));
        Self { text, dom }
    }

    pub fn uri(&self) -> &str {
        self.text.uri()
    }

    pub fn version(&self) -> i32 {
        self.text.version()
    }

    pub fn text(&self) -> &TextDocument {
        &self.text
    }

    pub fn dom(&self) -> &Document {
        &self.dom
    }

    /// Editor range of a byte span.
    pub fn range_of(&self, span: Span) -> PositionRange {
        self.text.range_of(span)
    }
}

/// Where documents come from: the editor's open files, a directory on disk,
/// or anything else that can produce snapshots by URI.
pub trait DocumentProvider: Send + Sync {
    fn get_document(&self, uri: &str) -> Option<Arc<XmlDocument>>;

    fn all_documents(&self) -> Vec<Arc<XmlDocument>>;
}

/// An in-memory store of the latest snapshot of each open document.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<String, Arc<XmlDocument>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or replace a document, returning the new snapshot.
    pub fn open(&self, uri: impl Into<String>, text: impl Into<Arc<str>>, version: i32) -> Arc<XmlDocument> {
        let uri = uri.into();
        let document = Arc::new(XmlDocument::new(uri.clone(), version, text));
        self.documents.write().insert(uri, Arc::clone(&document));
        document
    }

    /// Replace the text of an open document. Returns `None` when the document
    /// is not open or `version` is not newer than the stored one.
    pub fn change(&self, uri: &str, text: impl Into<Arc<str>>, version: i32) -> Option<Arc<XmlDocument>> {
        let mut documents = self.documents.write();
        let current = documents.get(uri)?;
        if version <= current.version() {
            tracing::debug!(uri, version, current = current.version(), "ignoring stale change");
            return None;
        }
        let document = Arc::new(XmlDocument::new(uri, version, text));
        documents.insert(uri.to_string(), Arc::clone(&document));
        Some(document)
    }

    pub fn close(&self, uri: &str) -> Option<Arc<XmlDocument>> {
        self.documents.write().remove(uri)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.documents.read().contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl DocumentProvider for DocumentStore {
    fn get_document(&self, uri: &str) -> Option<Arc<XmlDocument>> {
        self.documents.read().get(uri).cloned()
    }

    fn all_documents(&self) -> Vec<Arc<XmlDocument>> {
        let mut documents: Vec<_> = self.documents.read().values().cloned().collect();
        documents.sort_by(|a, b| a.uri().cmp(b.uri()));
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_store_lifecycle() {
        let store = DocumentStore::new();

        store.open("file:///a.xml", "<a/>", 1);
        store.open("file:///b.xml", "<b/>", 1);
        assert_eq!(store.len(), 2);

        let a = store.get_document("file:///a.xml").unwrap();
        assert_eq!(a.dom().root_element().unwrap().name(), Some("a"));

        let changed = store.change("file:///a.xml", "<c/>", 2).unwrap();
        assert_eq!(changed.version(), 2);
        assert_eq!(changed.dom().root_element().unwrap().name(), Some("c"));
        // The old snapshot is untouched.
        assert_eq!(a.dom().root_element().unwrap().name(), Some("a"));

        assert!(store.change("file:///a.xml", "<d/>", 2).is_none());
        assert!(store.change("file:///missing.xml", "<d/>", 5).is_none());

        store.close("file:///a.xml");
        assert!(!store.contains("file:///a.xml"));
        let uris: Vec<_> = store.all_documents().iter().map(|d| d.uri().to_string()).collect();
        assert_eq!(uris, vec!["file:///b.xml"]);
    }

    #[test]
    fn test_snapshot_knows_its_uri() {
        let doc = XmlDocument::new("file:///note.xml", 3, "<note>\n  <to/>\n</note>");
        assert_eq!(doc.dom().uri(), Some("file:///note.xml"));
        let to = doc.dom().find_node_at(10).unwrap();
        let range = doc.range_of(to.name_span().unwrap());
        assert_eq!((range.start.line, range.start.character), (1, 3));
    }
}
