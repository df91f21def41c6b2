//! Positioning validation results in a document.

use xmlls_error_reporting::DiagnosticMessage;

use crate::document::XmlDocument;
use crate::types::{Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity};
use xmlls_source_map::PositionRange;

/// Convert byte-located messages into editor diagnostics for `doc`.
pub fn to_diagnostics(doc: &XmlDocument, messages: &[DiagnosticMessage]) -> Vec<Diagnostic> {
    messages
        .iter()
        .map(|message| convert_diagnostic(doc, message))
        .collect()
}

/// Convert one message. Messages without a location land at the start of
/// the document.
pub fn convert_diagnostic(doc: &XmlDocument, msg: &DiagnosticMessage) -> Diagnostic {
    let range = msg
        .location
        .map(|span| doc.range_of(span))
        .unwrap_or_else(PositionRange::zero);

    let message = match &msg.problem {
        Some(problem) => format!("{}: {}", msg.title, problem.as_str()),
        None => msg.title.clone(),
    };

    let mut diagnostic = Diagnostic::new(range, DiagnosticSeverity::from_diagnostic_kind(msg.kind), message);
    if let Some(code) = &msg.code {
        diagnostic = diagnostic.with_code(code.clone());
    }

    for detail in &msg.details {
        if let Some(span) = detail.location {
            diagnostic.related_information.push(DiagnosticRelatedInformation {
                range: doc.range_of(span),
                message: detail.content.as_str().to_string(),
            });
        }
    }

    diagnostic
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmlls_error_reporting::DiagnosticKind;
    use xmlls_source_map::{Position, Span};

    #[test]
    fn test_convert_located_message() {
        let doc = XmlDocument::new("file:///a.xml", 1, "<a>\n  <b c=\"1\"/>\n</a>");
        let message = DiagnosticMessage::warning("Something odd")
            .with_code("W1")
            .with_location(Span::new(7, 8));
        let diagnostic = convert_diagnostic(&doc, &message);
        assert_eq!(diagnostic.range.start, Position::new(1, 3));
        assert_eq!(diagnostic.range.end, Position::new(1, 4));
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Warning);
        assert_eq!(diagnostic.code.as_deref(), Some("W1"));
        assert_eq!(diagnostic.source.as_deref(), Some("xml"));
    }

    #[test]
    fn test_unlocated_message_uses_document_start() {
        let doc = XmlDocument::new("file:///a.xml", 1, "<a/>");
        let message = DiagnosticMessage::new(DiagnosticKind::Hint, "Hint");
        let diagnostic = convert_diagnostic(&doc, &message);
        assert_eq!(diagnostic.range, PositionRange::zero());
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Hint);
    }
}
