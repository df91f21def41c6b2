//! Diagnostic messages for the XML language service.
//!
//! Every problem found in a document (malformed markup, an unreachable DTD,
//! an element the grammar does not declare) is surfaced as a
//! [`DiagnosticMessage`]: a kind, a stable code, a one-line title and an
//! optional byte span into the document text. Editors receive them through
//! the conversion layer in `xmlls-core`.
//!
//! Codes follow the names validators have always used for XML (`ETagRequired`,
//! `MSG_ELEMENT_NOT_DECLARED`, `cvc-complex-type.2.4.a`, ...) and are
//! catalogued in `error_catalog.json`, which also holds the message templates.
//!
//! ```
//! use xmlls_error_reporting::{DiagnosticMessageBuilder, catalog};
//! use xmlls_source_map::Span;
//!
//! let msg = DiagnosticMessageBuilder::error(
//!         catalog::format_message("MSG_ELEMENT_NOT_DECLARED", &["bar"]),
//!     )
//!     .with_code("MSG_ELEMENT_NOT_DECLARED")
//!     .with_location(Span::new(1, 4))
//!     .build();
//! assert_eq!(msg.title, "Element type \"bar\" must be declared.");
//! ```

pub mod builder;
pub mod catalog;
pub mod diagnostic;

pub use builder::DiagnosticMessageBuilder;
pub use catalog::{
    ERROR_CATALOG, ErrorCodeInfo, format_message, get_docs_url, get_error_info, get_subsystem,
};
pub use diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage, MessageContent};
