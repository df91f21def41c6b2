//! The parsed document and the handles used to walk it.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use xmlls_source_map::Span;

use crate::error::SyntaxError;
use crate::node::{
    AttrData, AttrId, AttlistDeclData, DocTypeData, ElementData, ElementDeclData, EntityDeclData,
    NodeData, NodeId, NodeKind, NotationDeclData, Parented, Rangeable,
};

/// An immutable parse tree over one text snapshot.
///
/// A new `Document` is built for every version of the text; nothing in it
/// is ever edited, so it can be shared across threads behind an `Arc` and
/// read without locking.
#[derive(Debug)]
pub struct Document {
    uri: Option<String>,
    text: Arc<str>,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) attrs: Vec<AttrData>,
    pub(crate) problems: Vec<SyntaxError>,
    pub(crate) is_dtd: bool,
}

impl Document {
    pub(crate) fn empty(text: Arc<str>, uri: Option<String>) -> Self {
        let root = NodeData::new(NodeKind::Document, Span::new(0, text.len()), None);
        Self {
            uri,
            text,
            nodes: vec![root],
            attrs: Vec::new(),
            problems: Vec::new(),
            is_dtd: false,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    /// Whether this tree was built from a standalone DTD file.
    pub fn is_dtd(&self) -> bool {
        self.is_dtd
    }

    /// Well-formedness problems found while parsing, in text order.
    pub fn syntax_errors(&self) -> &[SyntaxError] {
        &self.problems
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { doc: self, id }
    }

    pub fn attr(&self, id: AttrId) -> Attr<'_> {
        Attr { doc: self, id }
    }

    pub fn document_node(&self) -> Node<'_> {
        self.node(NodeId::DOCUMENT)
    }

    /// Every node in document order, starting with the document node.
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        (0..self.nodes.len()).map(move |idx| self.node(NodeId(idx as u32)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The first named element at the top level.
    pub fn root_element(&self) -> Option<Node<'_>> {
        self.document_node()
            .children()
            .find(|child| child.is_element() && child.name().is_some())
    }

    pub fn doctype(&self) -> Option<Node<'_>> {
        self.document_node()
            .children()
            .find(|child| child.is_doctype())
    }

    /// Value of a general internal entity declared in the DOCTYPE subset.
    pub fn internal_entity_value(&self, name: &str) -> Option<&str> {
        let decls: Box<dyn Iterator<Item = Node<'_>>> = match self.doctype() {
            Some(doctype) => Box::new(doctype.children()),
            None if self.is_dtd => Box::new(self.document_node().children()),
            None => return None,
        };
        decls
            .filter_map(|decl| match decl.kind() {
                NodeKind::EntityDecl(data) if !data.parameter => Some(data),
                _ => None,
            })
            .find(|data| data.name.map(|span| span.slice(&self.text)) == Some(name))
            .and_then(|data| data.value)
            .map(|span| strip_quotes(span.slice(&self.text)))
    }

    /// The innermost node whose range contains `offset`.
    ///
    /// Containment is half-open, except that an unclosed node also claims the
    /// offset right at its end (the caret of a user still typing). Returns
    /// `None` outside the root range and in whitespace between top-level
    /// nodes.
    pub fn find_node_at(&self, offset: usize) -> Option<Node<'_>> {
        let mut current = self.document_node();
        loop {
            let mut touching = None;
            let mut next = None;
            for child in current.children() {
                let span = child.span();
                if span.contains(offset) {
                    next = Some(child);
                    break;
                }
                if span.end == offset && !child.is_closed_node() {
                    touching = Some(child);
                }
                if span.start > offset {
                    break;
                }
            }
            match next.or(touching) {
                Some(child) => current = child,
                None => break,
            }
        }
        (!current.is_document()).then_some(current)
    }

    /// The attribute whose name or value range contains `offset`.
    ///
    /// The end offset of a name or value counts as inside it.
    pub fn find_attr_at(&self, offset: usize) -> Option<Attr<'_>> {
        let node = self.find_node_at(offset)?;
        node.attributes().find(|attr| {
            attr.name_span().touches(offset)
                || attr.value_span().is_some_and(|value| value.touches(offset))
        })
    }
}

pub(crate) fn strip_quotes(raw: &str) -> &str {
    let mut chars = raw.chars();
    match chars.next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &raw[1..];
            inner.strip_suffix(quote).unwrap_or(inner)
        }
        _ => raw,
    }
}

/// Expand character and entity references, using the internal entities of
/// `doc` for names the XML predefined set does not know. Text with unknown
/// or malformed references is returned unchanged.
pub(crate) fn expand_references<'t>(doc: &Document, raw: &'t str) -> Cow<'t, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    quick_xml::escape::unescape_with(raw, |name| {
        predefined_entity(name).or_else(|| doc.internal_entity_value(name))
    })
    .unwrap_or(Cow::Borrowed(raw))
}

pub(crate) fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// A borrowed handle to a node.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind_name())
            .field("name", &self.name())
            .field("span", &self.span())
            .finish()
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl<'a> Node<'a> {
    fn data(&self) -> &'a NodeData {
        &self.doc.nodes[self.id.index()]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn kind(&self) -> &'a NodeKind {
        &self.data().kind
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind() {
            NodeKind::Document => "document",
            NodeKind::Element(_) => "element",
            NodeKind::Text => "text",
            NodeKind::CData => "cdata",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction { .. } => "processing-instruction",
            NodeKind::DocumentType(_) => "doctype",
            NodeKind::ElementDecl(_) => "element-decl",
            NodeKind::AttlistDecl(_) => "attlist-decl",
            NodeKind::EntityDecl(_) => "entity-decl",
            NodeKind::NotationDecl(_) => "notation-decl",
        }
    }

    // ====== Tree navigation ======

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a + use<'a> {
        let doc = self.doc;
        self.data()
            .children
            .iter()
            .map(move |id| Node { doc, id: *id })
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn first_child(&self) -> Option<Node<'a>> {
        self.children().next()
    }

    pub fn last_child(&self) -> Option<Node<'a>> {
        self.data().children.last().map(|id| self.doc.node(*id))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = Node<'a>> + 'a + use<'a> {
        self.children().filter(|child| child.is_element())
    }

    fn sibling(&self, delta: isize) -> Option<Node<'a>> {
        let parent = self.parent()?;
        let siblings = &parent.data().children;
        let idx = siblings.iter().position(|id| *id == self.id)?;
        let target = idx.checked_add_signed(delta)?;
        siblings.get(target).map(|id| self.doc.node(*id))
    }

    pub fn next_sibling(&self) -> Option<Node<'a>> {
        self.sibling(1)
    }

    pub fn previous_sibling(&self) -> Option<Node<'a>> {
        self.sibling(-1)
    }

    /// Parent, grandparent, ... up to and including the document node.
    pub fn ancestors(&self) -> impl Iterator<Item = Node<'a>> + 'a + use<'a> {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    /// This node and all nodes below it, in document order.
    pub fn descendants(&self) -> impl Iterator<Item = Node<'a>> + 'a + use<'a> {
        let mut stack = vec![*self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.data().children.iter().rev().map(|id| node.doc.node(*id)));
            Some(node)
        })
    }

    // ====== Kind tests ======

    pub fn is_document(&self) -> bool {
        matches!(self.kind(), NodeKind::Document)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind(), NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind(), NodeKind::Text)
    }

    pub fn is_cdata(&self) -> bool {
        matches!(self.kind(), NodeKind::CData)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind(), NodeKind::Comment)
    }

    pub fn is_processing_instruction(&self) -> bool {
        matches!(self.kind(), NodeKind::ProcessingInstruction { .. })
    }

    pub fn is_doctype(&self) -> bool {
        matches!(self.kind(), NodeKind::DocumentType(_))
    }

    /// Any `<!ELEMENT`, `<!ATTLIST`, `<!ENTITY` or `<!NOTATION` declaration.
    pub fn is_dtd_decl(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::ElementDecl(_)
                | NodeKind::AttlistDecl(_)
                | NodeKind::EntityDecl(_)
                | NodeKind::NotationDecl(_)
        )
    }

    pub fn element_data(&self) -> Option<&'a ElementData> {
        match self.kind() {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn doctype_data(&self) -> Option<&'a DocTypeData> {
        match self.kind() {
            NodeKind::DocumentType(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_decl_data(&self) -> Option<&'a ElementDeclData> {
        match self.kind() {
            NodeKind::ElementDecl(data) => Some(data),
            _ => None,
        }
    }

    pub fn attlist_decl_data(&self) -> Option<&'a AttlistDeclData> {
        match self.kind() {
            NodeKind::AttlistDecl(data) => Some(data),
            _ => None,
        }
    }

    pub fn entity_decl_data(&self) -> Option<&'a EntityDeclData> {
        match self.kind() {
            NodeKind::EntityDecl(data) => Some(data),
            _ => None,
        }
    }

    pub fn notation_decl_data(&self) -> Option<&'a NotationDeclData> {
        match self.kind() {
            NodeKind::NotationDecl(data) => Some(data),
            _ => None,
        }
    }

    // ====== Names and content ======

    /// Slice the document text at `span`.
    pub fn slice(&self, span: Span) -> &'a str {
        span.slice(self.doc.text())
    }

    /// Span of this node's name: the start-tag name of an element (or the
    /// end-tag name of an orphan end tag), the DOCTYPE name, a declaration
    /// name or a processing-instruction target.
    pub fn name_span(&self) -> Option<Span> {
        match self.kind() {
            NodeKind::Element(data) => data
                .tag_name
                .or_else(|| data.end_tag.and_then(|tag| tag.name)),
            NodeKind::DocumentType(data) => data.name,
            NodeKind::ElementDecl(data) => data.name,
            NodeKind::AttlistDecl(data) => data.element_name,
            NodeKind::EntityDecl(data) => data.name,
            NodeKind::NotationDecl(data) => data.name,
            NodeKind::ProcessingInstruction { target, .. } => *target,
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        self.name_span().map(|span| self.slice(span))
    }

    /// The name without its prefix.
    pub fn local_name(&self) -> Option<&'a str> {
        self.name().map(|name| match name.split_once(':') {
            Some((_, local)) => local,
            None => name,
        })
    }

    pub fn prefix(&self) -> Option<&'a str> {
        self.name()
            .and_then(|name| name.split_once(':'))
            .map(|(prefix, _)| prefix)
    }

    /// The raw text this node covers.
    pub fn text(&self) -> &'a str {
        self.slice(self.span())
    }

    /// Content of the node, computed on first access and memoized.
    ///
    /// Text nodes and elements expand character and entity references;
    /// CDATA sections, comments and processing instructions return the text
    /// between their delimiters.
    pub fn text_content(&self) -> &'a str {
        self.data().content.get_or_init(|| self.compute_content())
    }

    fn compute_content(&self) -> String {
        let raw = self.text();
        match self.kind() {
            NodeKind::Text => expand_references(self.doc, raw).into_owned(),
            NodeKind::CData => inner(raw, "<![CDATA[", "]]>").to_string(),
            NodeKind::Comment => inner(raw, "<!--", "-->").to_string(),
            NodeKind::ProcessingInstruction { target, .. } => {
                let after_target = target.map_or(self.start() + 2, |t| t.end);
                let data = Span::new(after_target.min(self.end()), self.end());
                let data = self.slice(data);
                data.strip_suffix("?>").unwrap_or(data).trim_start().to_string()
            }
            NodeKind::Element(_) | NodeKind::Document => self
                .descendants()
                .filter(|node| node.is_text() || node.is_cdata())
                .map(|node| node.text_content())
                .collect(),
            _ => raw.to_string(),
        }
    }

    /// Whether a text node holds nothing but whitespace.
    pub fn is_whitespace_text(&self) -> bool {
        self.is_text() && self.text().trim().is_empty()
    }

    // ====== Attributes ======

    pub fn attributes(&self) -> impl Iterator<Item = Attr<'a>> + 'a + use<'a> {
        let doc = self.doc;
        let ids: &'a [AttrId] = match self.kind() {
            NodeKind::Element(data) => &data.attributes,
            _ => &[],
        };
        ids.iter().map(move |id| Attr { doc, id: *id })
    }

    pub fn attribute_count(&self) -> usize {
        self.element_data().map_or(0, |data| data.attributes.len())
    }

    /// First attribute named `name` (duplicates are kept in the tree).
    pub fn attribute(&self, name: &str) -> Option<Attr<'a>> {
        self.attributes().find(|attr| attr.name() == name)
    }

    pub fn attribute_value(&self, name: &str) -> Option<&'a str> {
        self.attribute(name).map(|attr| attr.value())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    // ====== Tag state ======

    pub fn is_start_tag_closed(&self) -> bool {
        self.element_data()
            .is_some_and(|data| data.start_tag_close.is_some())
    }

    pub fn is_self_closed(&self) -> bool {
        self.element_data().is_some_and(|data| data.self_closed)
    }

    pub fn has_end_tag(&self) -> bool {
        self.element_data().is_some_and(|data| data.end_tag.is_some())
    }

    pub fn is_orphan_end_tag(&self) -> bool {
        self.element_data().is_some_and(|data| data.orphan_end_tag)
    }

    /// An element is closed by `/>` or by an end tag with its own name.
    pub fn is_closed(&self) -> bool {
        self.element_data().is_some_and(|data| {
            data.self_closed || (data.end_tag.is_some() && !data.orphan_end_tag)
        })
    }

    fn is_closed_node(&self) -> bool {
        match self.kind() {
            NodeKind::Element(_) => self.is_closed(),
            NodeKind::DocumentType(data) => data.closed,
            NodeKind::ProcessingInstruction { closed, .. } => *closed,
            NodeKind::Comment => self.text().ends_with("-->") && self.text().len() >= 7,
            NodeKind::CData => self.text().ends_with("]]>") && self.text().len() >= 12,
            _ => true,
        }
    }

    /// Offset of the `>` (or `/`) that closes the start tag.
    pub fn start_tag_close_offset(&self) -> Option<usize> {
        self.element_data().and_then(|data| data.start_tag_close)
    }

    /// From `<` to just after the start tag's `>` (or `/>`), or to where an
    /// unterminated start tag stops.
    pub fn start_tag_span(&self) -> Option<Span> {
        let data = self.element_data()?;
        if data.orphan_end_tag {
            return None;
        }
        let end = match data.start_tag_close {
            Some(close) if data.self_closed => close + 2,
            Some(close) => close + 1,
            None => {
                let last_attr_end = self.attributes().map(|attr| attr.end()).max();
                let name_end = data.tag_name.map_or(self.start() + 1, |name| name.end);
                last_attr_end.unwrap_or(name_end).max(name_end)
            }
        };
        Some(Span::new(self.start(), end.min(self.end())))
    }

    pub fn end_tag_span(&self) -> Option<Span> {
        self.element_data()
            .and_then(|data| data.end_tag)
            .map(|tag| tag.span)
    }

    pub fn end_tag_name_span(&self) -> Option<Span> {
        self.element_data()
            .and_then(|data| data.end_tag)
            .and_then(|tag| tag.name)
    }

    pub fn end_tag_name(&self) -> Option<&'a str> {
        self.end_tag_name_span().map(|span| self.slice(span))
    }
}

fn inner<'t>(raw: &'t str, open: &str, close: &str) -> &'t str {
    let body = raw.strip_prefix(open).unwrap_or(raw);
    body.strip_suffix(close).unwrap_or(body)
}

impl Rangeable for Node<'_> {
    fn span(&self) -> Span {
        self.data().span
    }
}

impl<'a> Parented<'a> for Node<'a> {
    fn parent(&self) -> Option<Node<'a>> {
        self.data().parent.map(|id| self.doc.node(id))
    }
}

/// A borrowed handle to an attribute.
///
/// Two attributes compare equal when their names and (unquoted) values
/// match, wherever they sit in the tree.
#[derive(Clone, Copy)]
pub struct Attr<'a> {
    doc: &'a Document,
    id: AttrId,
}

impl fmt::Debug for Attr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attr")
            .field("name", &self.name())
            .field("value", &self.value())
            .field("span", &self.span())
            .finish()
    }
}

impl PartialEq for Attr<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.value() == other.value()
    }
}

impl Eq for Attr<'_> {}

impl Hash for Attr<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
        self.value().hash(state);
    }
}

impl<'a> Attr<'a> {
    fn data(&self) -> &'a AttrData {
        &self.doc.attrs[self.id.index()]
    }

    pub fn id(&self) -> AttrId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn owner(&self) -> Node<'a> {
        self.doc.node(self.data().owner)
    }

    pub fn name_span(&self) -> Span {
        self.data().name
    }

    pub fn name(&self) -> &'a str {
        self.name_span().slice(self.doc.text())
    }

    pub fn local_name(&self) -> &'a str {
        match self.name().split_once(':') {
            Some((_, local)) => local,
            None => self.name(),
        }
    }

    pub fn prefix(&self) -> Option<&'a str> {
        self.name().split_once(':').map(|(prefix, _)| prefix)
    }

    /// Whether the attribute has an `=` after its name.
    pub fn has_delimiter(&self) -> bool {
        self.data().delimiter.is_some()
    }

    pub fn delimiter_offset(&self) -> Option<usize> {
        self.data().delimiter
    }

    /// The value range including its quotes; `None` if there is no value.
    pub fn value_span(&self) -> Option<Span> {
        self.data().value
    }

    /// The value range without its quotes.
    pub fn value_content_span(&self) -> Option<Span> {
        let span = self.value_span()?;
        let raw = span.slice(self.doc.text());
        let content = strip_quotes(raw);
        let start = if raw.starts_with(['"', '\'']) {
            span.start + 1
        } else {
            span.start
        };
        Some(Span::new(start, start + content.len()))
    }

    /// The value without its quotes; `""` when there is no value.
    pub fn value(&self) -> &'a str {
        self.value_span()
            .map(|span| strip_quotes(span.slice(self.doc.text())))
            .unwrap_or_default()
    }

    /// The value exactly as written, quotes included.
    pub fn original_value(&self) -> Option<&'a str> {
        self.value_span().map(|span| span.slice(self.doc.text()))
    }

    /// The value with character and entity references expanded, memoized.
    pub fn normalized_value(&self) -> &'a str {
        self.data()
            .normalized
            .get_or_init(|| expand_references(self.doc, self.value()).into_owned())
    }

    /// Position among the owner's attributes (declaration order).
    pub fn index(&self) -> usize {
        self.owner()
            .element_data()
            .and_then(|data| data.attributes.iter().position(|id| *id == self.id))
            .unwrap_or_default()
    }

    /// The attribute declared after this one on the same element.
    pub fn next_sibling(&self) -> Option<Attr<'a>> {
        let owner = self.owner();
        let ids = &owner.element_data()?.attributes;
        ids.get(self.index() + 1).map(|id| self.doc.attr(*id))
    }

    pub fn previous_sibling(&self) -> Option<Attr<'a>> {
        let owner = self.owner();
        let ids = &owner.element_data()?.attributes;
        let idx = self.index().checked_sub(1)?;
        ids.get(idx).map(|id| self.doc.attr(*id))
    }
}

impl Rangeable for Attr<'_> {
    /// From the start of the name to the end of the value, or of the `=`,
    /// or of the name, whichever comes last.
    fn span(&self) -> Span {
        let data = self.data();
        let end = data
            .value
            .map(|value| value.end)
            .or(data.delimiter.map(|eq| eq + 1))
            .unwrap_or(data.name.end);
        Span::new(data.name.start, end)
    }
}

impl<'a> Parented<'a> for Attr<'a> {
    fn parent(&self) -> Option<Node<'a>> {
        Some(self.owner())
    }
}
