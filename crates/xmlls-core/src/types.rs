//! Editor-facing result types.
//!
//! These types carry no protocol dependency. They serialize to JSON in the
//! shape editors expect, and ranges use 0-based lines and UTF-16 characters.

use serde::{Deserialize, Serialize};
use xmlls_error_reporting::DiagnosticKind;
use xmlls_source_map::{Position, PositionRange};

/// Diagnostic severity levels, numbered like the editor protocol's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl DiagnosticSeverity {
    pub fn from_diagnostic_kind(kind: DiagnosticKind) -> Self {
        match kind {
            DiagnosticKind::Error => Self::Error,
            DiagnosticKind::Warning => Self::Warning,
            DiagnosticKind::Info => Self::Information,
            DiagnosticKind::Hint => Self::Hint,
        }
    }
}

/// Related information for a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRelatedInformation {
    pub range: PositionRange,
    pub message: String,
}

/// A diagnostic positioned in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub range: PositionRange,
    pub severity: DiagnosticSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    pub fn new(range: PositionRange, severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            range,
            severity,
            code: None,
            source: Some("xml".to_string()),
            message: message.into(),
            related_information: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_related(mut self, range: PositionRange, message: impl Into<String>) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            range,
            message: message.into(),
        });
        self
    }
}

/// A place in some document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: PositionRange,
}

/// A link from a range in the document to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub range: PositionRange,
    pub target: String,
}

/// A textual replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: PositionRange,
    pub new_text: String,
}

impl TextEdit {
    pub fn insert(position: Position, new_text: impl Into<String>) -> Self {
        Self {
            range: PositionRange::new(position, position),
            new_text: new_text.into(),
        }
    }

    pub fn replace(range: PositionRange, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }
}

/// A quick fix: a title and the edits to one document that apply it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAction {
    pub title: String,
    pub uri: String,
    pub edits: Vec<TextEdit>,
}

/// Kinds of document highlights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentHighlightKind {
    Text = 1,
    Read = 2,
    Write = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHighlight {
    pub range: PositionRange,
    pub kind: DocumentHighlightKind,
}

/// Ranges that should be edited together, such as a start tag name and
/// its end tag name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedEditingRanges {
    pub ranges: Vec<PositionRange>,
}

/// One completion proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_edit: Option<TextEdit>,
}
