//! Transport-agnostic XML language service.
//!
//! This crate holds everything between an editor transport and the grammar
//! machinery of `xmlls-contentmodel`: document snapshots, versioned
//! validation scheduling, the revalidation commands and the navigation
//! features.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │              transport (LSP server, CLI, tests)              │
//! └──────────────────────────────────────────────────────────────┘
//!        │ open/change            │ commands          ▲ publish
//!        ▼                        ▼                   │
//! ┌──────────────┐      ┌───────────────────┐  ┌─────────────────┐
//! │DocumentStore │◄─────│ ValidationService │─►│ DiagnosticsSink │
//! └──────────────┘      └───────────────────┘  └─────────────────┘
//!                                 │
//!                                 ▼
//!                 ContentModelManager / XmlValidator
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xmlls_core::{CollectingSink, DocumentStore, ValidationService};
//!
//! let store = Arc::new(DocumentStore::new());
//! let sink = Arc::new(CollectingSink::new());
//! let service = ValidationService::new(Arc::default(), store.clone(), sink.clone());
//!
//! let doc = store.open("file:///work/note.xml", text, 1);
//! service.validate(doc).await?;
//! ```

pub mod commands;
pub mod diagnostics;
pub mod document;
pub mod features;
pub mod service;
pub mod types;

pub use commands::{CommandError, VALIDATION_ALL_FILES, VALIDATION_CURRENT_FILE, execute_command};
pub use diagnostics::{convert_diagnostic, to_diagnostics};
pub use document::{DocumentProvider, DocumentStore, XmlDocument};
pub use service::{
    CollectingSink, DiagnosticsSink, PassOutcome, Published, ServiceError, ValidationService,
};
pub use types::{
    CodeAction, CompletionItem, Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity,
    DocumentHighlight, DocumentHighlightKind, DocumentLink, LinkedEditingRanges, Location,
    TextEdit,
};
