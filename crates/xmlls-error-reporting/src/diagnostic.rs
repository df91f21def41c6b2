//! Core diagnostic message types.

use serde::{Deserialize, Serialize};
use xmlls_source_map::Span;

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// The document violates well-formedness or its grammar
    Error,
    /// A problem that does not make the document invalid
    Warning,
    /// Informational message
    Info,
    /// A low-key suggestion, such as "no grammar is associated"
    Hint,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Info => "info",
            DiagnosticKind::Hint => "hint",
        }
    }
}

/// How detail items should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    Error,
    Info,
    Note,
}

/// The content of a message or detail item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum MessageContent {
    Plain(String),
    Markdown(String),
}

impl MessageContent {
    pub fn as_str(&self) -> &str {
        match self {
            MessageContent::Plain(s) | MessageContent::Markdown(s) => s,
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Plain(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Plain(s.to_string())
    }
}

/// A detail item in a diagnostic message.
///
/// A detail with a location becomes "related information" when the message
/// is handed to an editor, e.g. the first declaration of a duplicated ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailItem {
    pub kind: DetailKind,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Span>,
}

/// A diagnostic produced while analysing one document.
///
/// `location` is a byte span into the text snapshot the diagnostic was
/// computed from. A message without a location applies to the document as
/// a whole and is anchored at its start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    /// Stable error code (e.g., "ETagRequired", "dtd_not_found")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// The message shown to the user
    pub title: String,

    pub kind: DiagnosticKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<MessageContent>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<DetailItem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<MessageContent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Span>,
}

impl DiagnosticMessage {
    /// Create a new diagnostic message with just a title and kind.
    ///
    /// Prefer [`crate::DiagnosticMessageBuilder`] when the message needs
    /// details or hints.
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            code: None,
            title: title.into(),
            kind,
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            location: None,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    pub fn hint(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Hint, title)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_location(mut self, location: Span) -> Self {
        self.location = Some(location);
        self
    }

    /// Replace the kind, keeping everything else.
    ///
    /// Validators report grammar violations as errors; the pipeline then
    /// applies the severity configured for that category.
    pub fn with_kind(mut self, kind: DiagnosticKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// Documentation URL for this message's code, if the catalog has one.
    pub fn docs_url(&self) -> Option<&str> {
        self.code
            .as_ref()
            .and_then(|code| crate::catalog::get_docs_url(code))
    }

    /// Render as plain text.
    ///
    /// ```text
    /// error[ETagRequired]: The element type "a" must be terminated by the matching end-tag "</a>".
    /// ✖ detail
    /// ? hint
    /// ```
    pub fn to_text(&self) -> String {
        use std::fmt::Write;

        let mut result = String::new();
        let _ = match &self.code {
            Some(code) => writeln!(result, "{}[{}]: {}", self.kind.as_str(), code, self.title),
            None => writeln!(result, "{}: {}", self.kind.as_str(), self.title),
        };
        if let Some(problem) = &self.problem {
            let _ = writeln!(result, "{}", problem.as_str());
        }
        for detail in &self.details {
            let bullet = match detail.kind {
                DetailKind::Error => "✖",
                DetailKind::Info => "ℹ",
                DetailKind::Note => "•",
            };
            let _ = writeln!(result, "{} {}", bullet, detail.content.as_str());
        }
        for hint in &self.hints {
            let _ = writeln!(result, "? {}", hint.as_str());
        }
        result
    }

    /// Render as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_content_from_str() {
        let content: MessageContent = "test".into();
        assert_eq!(content.as_str(), "test");
        assert!(matches!(content, MessageContent::Plain(_)));
    }

    #[test]
    fn test_diagnostic_message_new() {
        let msg = DiagnosticMessage::new(DiagnosticKind::Error, "Test error");
        assert_eq!(msg.title, "Test error");
        assert_eq!(msg.kind, DiagnosticKind::Error);
        assert!(msg.code.is_none());
        assert!(msg.location.is_none());
    }

    #[test]
    fn test_with_code_and_location() {
        let msg = DiagnosticMessage::hint("No grammar constraints (DTD or XML Schema).")
            .with_code("NoGrammarConstraints")
            .with_location(Span::new(1, 5));
        assert!(msg.has_code("NoGrammarConstraints"));
        assert_eq!(msg.location, Some(Span::new(1, 5)));
        assert_eq!(msg.kind, DiagnosticKind::Hint);
    }

    #[test]
    fn test_with_kind_keeps_code() {
        let msg = DiagnosticMessage::error("x")
            .with_code("MSG_ELEMENT_NOT_DECLARED")
            .with_kind(DiagnosticKind::Warning);
        assert_eq!(msg.kind, DiagnosticKind::Warning);
        assert!(msg.has_code("MSG_ELEMENT_NOT_DECLARED"));
    }

    #[test]
    fn test_to_text() {
        let mut msg = DiagnosticMessage::error("Cannot find DTD 'missing.dtd'.")
            .with_code("dtd_not_found");
        msg.hints.push("Check the SYSTEM identifier?".into());
        insta::assert_snapshot!(msg.to_text().trim_end(), @r"
        error[dtd_not_found]: Cannot find DTD 'missing.dtd'.
        ? Check the SYSTEM identifier?
        ");
    }

    #[test]
    fn test_to_json() {
        let msg = DiagnosticMessage::warning("Something")
            .with_code("cvc-elt.1.a")
            .with_location(Span::new(3, 8));
        let json = msg.to_json();
        assert_eq!(json["kind"], "warning");
        assert_eq!(json["title"], "Something");
        assert_eq!(json["code"], "cvc-elt.1.a");
        assert_eq!(json["location"]["start"], 3);
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut msg = DiagnosticMessage::error("Duplicate").with_code("MSG_ID_NOT_UNIQUE");
        msg.details.push(DetailItem {
            kind: DetailKind::Info,
            content: "first declared here".into(),
            location: Some(Span::new(10, 14)),
        });
        let json = serde_json::to_string(&msg).unwrap();
        let back: DiagnosticMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
