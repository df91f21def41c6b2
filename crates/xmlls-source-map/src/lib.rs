//! Text and range primitives for the XML language service
//!
//! Every structure built over a document (parse tree nodes, attribute spans,
//! diagnostics) addresses the text with half-open byte ranges. This crate
//! converts between those offsets and the line/character positions editors
//! speak.
//!
//! # Overview
//!
//! - [`Span`]: a raw `[start, end)` byte range
//! - [`FileInformation`]: line-break index for O(log n) offset lookups
//! - [`TextDocument`]: an immutable, versioned text snapshot
//! - [`Position`] / [`PositionRange`]: editor-facing positions (UTF-16 characters)
//!
//! # Example
//!
//! ```rust
//! use xmlls_source_map::*;
//!
//! let doc = TextDocument::new("file:///a.xml", 1, "<a>\n  <b/>\n</a>");
//! let pos = doc.position_at(6);
//! assert_eq!(pos, Position::new(1, 2));
//! assert_eq!(doc.offset_at(pos), 6);
//! ```

pub mod file_info;
pub mod text_document;
pub mod types;

pub use file_info::FileInformation;
pub use text_document::TextDocument;
pub use types::{Location, Position, PositionRange, Range, Span};
