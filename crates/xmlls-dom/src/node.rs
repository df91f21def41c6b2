//! Node and attribute storage for the parse tree arena.
//!
//! The tree is stored as two flat arenas (nodes and attributes) owned by
//! [`crate::Document`]. Handles ([`crate::Node`], [`crate::Attr`]) borrow the
//! document and resolve ids on access.

use once_cell::sync::OnceCell;
use xmlls_source_map::Span;

/// Compact node identifier (index into the node arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

/// Compact attribute identifier (index into the attribute arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrId(pub(crate) u32);

impl NodeId {
    pub const DOCUMENT: NodeId = NodeId(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl AttrId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type of a node, with the spans that only that kind carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text,
    CData,
    Comment,
    ProcessingInstruction {
        target: Option<Span>,
        closed: bool,
    },
    DocumentType(DocTypeData),
    ElementDecl(ElementDeclData),
    AttlistDecl(AttlistDeclData),
    EntityDecl(EntityDeclData),
    NotationDecl(NotationDeclData),
}

/// Tag bookkeeping for an element.
///
/// An element whose start tag was never terminated, or which was closed
/// implicitly by an ancestor's end tag, is still a full element node: code
/// actions rely on finding it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    /// Span of the name in the start tag. `None` for orphan end tags and for a
    /// bare `<` with no name.
    pub tag_name: Option<Span>,
    /// Offset of the `>` (or of the `/` of `/>`) closing the start tag.
    pub start_tag_close: Option<usize>,
    pub self_closed: bool,
    pub end_tag: Option<EndTag>,
    /// The node was produced by an end tag with no open start tag.
    pub orphan_end_tag: bool,
    pub attributes: Vec<AttrId>,
}

/// An end tag `</name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndTag {
    /// From `</` to just after `>` (or to where the unterminated tag stops).
    pub span: Span,
    pub name: Option<Span>,
    pub closed: bool,
}

/// `<!DOCTYPE name (SYSTEM "s" | PUBLIC "p" "s")? [ subset ]? >`
///
/// Id spans include their quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocTypeData {
    pub name: Option<Span>,
    /// The `SYSTEM` or `PUBLIC` keyword.
    pub kind: Option<Span>,
    pub public_id: Option<Span>,
    pub system_id: Option<Span>,
    /// Content between `[` and `]`.
    pub internal_subset: Option<Span>,
    pub closed: bool,
}

/// `<!ELEMENT name content>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementDeclData {
    pub name: Option<Span>,
    /// `EMPTY`, `ANY` or a parenthesized model including its occurrence suffix.
    pub content: Option<Span>,
    pub closed: bool,
}

/// `<!ATTLIST element (name type default)*>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttlistDeclData {
    pub element_name: Option<Span>,
    pub definitions: Vec<AttDefData>,
    pub closed: bool,
}

/// One attribute definition inside an `ATTLIST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttDefData {
    pub name: Span,
    /// `CDATA`, `ID`, ... or a parenthesized enumeration.
    pub att_type: Option<Span>,
    /// `#REQUIRED`, `#IMPLIED` or `#FIXED`.
    pub default_kind: Option<Span>,
    /// Quoted default value.
    pub default_value: Option<Span>,
}

/// `<!ENTITY [%] name ("value" | SYSTEM "s" | PUBLIC "p" "s") [NDATA n]>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDeclData {
    pub parameter: bool,
    pub name: Option<Span>,
    pub value: Option<Span>,
    pub kind: Option<Span>,
    pub public_id: Option<Span>,
    pub system_id: Option<Span>,
    pub ndata: Option<Span>,
    pub closed: bool,
}

/// `<!NOTATION name (SYSTEM "s" | PUBLIC "p" ["s"])>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotationDeclData {
    pub name: Option<Span>,
    pub kind: Option<Span>,
    pub public_id: Option<Span>,
    pub system_id: Option<Span>,
    pub closed: bool,
}

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) span: Span,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Memoized text content (entity references expanded).
    pub(crate) content: OnceCell<String>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind, span: Span, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            span,
            parent,
            children: Vec::new(),
            content: OnceCell::new(),
        }
    }

    pub(crate) fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct AttrData {
    pub(crate) owner: NodeId,
    pub(crate) name: Span,
    /// Offset of the `=` sign.
    pub(crate) delimiter: Option<usize>,
    /// Value including its quotes, if any.
    pub(crate) value: Option<Span>,
    pub(crate) normalized: OnceCell<String>,
}

/// Access to the byte range a tree item covers.
pub trait Rangeable {
    fn span(&self) -> Span;

    fn start(&self) -> usize {
        self.span().start
    }

    fn end(&self) -> usize {
        self.span().end
    }
}

/// Access to the owning container of a tree item.
pub trait Parented<'a> {
    fn parent(&self) -> Option<crate::Node<'a>>;
}
