//! Error-tolerant XML parse tree with byte-accurate ranges.
//!
//! This crate turns XML text into a [`Document`]: an immutable arena of
//! nodes and attributes, every one of which knows the exact byte range it
//! covers in the source. Parsing never fails. Malformed input still yields
//! a tree (unclosed tags, attributes without `=`, orphan end tags) together
//! with the [`SyntaxError`]s that describe what was wrong.
//!
//! # Example
//!
//! ```rust
//! use xmlls_dom::{parse, Rangeable};
//!
//! let doc = parse("<note><to>Tove</to></note>");
//! let to = doc.find_node_at(7).unwrap();
//! assert_eq!(to.name(), Some("to"));
//! assert_eq!(to.span().slice(doc.text()), "<to>Tove</to>");
//! ```
//!
//! Standalone DTD files are parsed with [`parse_dtd`]; their declarations
//! become children of the document node.

pub mod document;
pub mod dtd;
pub mod error;
pub mod events;
pub mod namespace;
pub mod node;
pub mod parser;

pub use document::{Attr, Document, Node};
pub use dtd::parse_dtd;
pub use error::SyntaxError;
pub use events::{Events, XmlEvent};
pub use namespace::{
    NoNamespaceSchemaLocation, SchemaLocationHint, XML_NS, XMLNS_NS, XSD_NS, XSI_NS,
};
pub use node::{
    AttDefData, AttlistDeclData, AttrId, DocTypeData, ElementData, ElementDeclData, EndTag,
    EntityDeclData, NodeId, NodeKind, NotationDeclData, Parented, Rangeable,
};
pub use parser::{parse, parse_shared, parse_with_uri};
