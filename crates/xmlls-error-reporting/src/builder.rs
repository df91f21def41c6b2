//! Builder API for diagnostic messages.

use xmlls_source_map::Span;

use crate::diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage, MessageContent};

/// Builder for [`DiagnosticMessage`].
///
/// ```
/// use xmlls_error_reporting::DiagnosticMessageBuilder;
/// use xmlls_source_map::Span;
///
/// let msg = DiagnosticMessageBuilder::error("Attribute \"id\" was already specified for element \"a\".")
///     .with_code("AttributeNotUnique")
///     .with_location(Span::new(9, 11))
///     .add_located_detail("first occurrence", Span::new(3, 5))
///     .build();
/// assert_eq!(msg.details.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    message: DiagnosticMessage,
}

impl DiagnosticMessageBuilder {
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage::new(kind, title),
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

    /// Start a message whose title comes from the catalog template for `code`.
    pub fn from_code(kind: DiagnosticKind, code: &str, args: &[&str]) -> Self {
        Self::new(kind, crate::catalog::format_message(code, args)).with_code(code)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.message.code = Some(code.into());
        self
    }

    pub fn with_location(mut self, location: Span) -> Self {
        self.message.location = Some(location);
        self
    }

    pub fn problem(mut self, problem: impl Into<MessageContent>) -> Self {
        self.message.problem = Some(problem.into());
        self
    }

    pub fn add_detail(mut self, content: impl Into<MessageContent>) -> Self {
        self.message.details.push(DetailItem {
            kind: DetailKind::Error,
            content: content.into(),
            location: None,
        });
        self
    }

    pub fn add_info(mut self, content: impl Into<MessageContent>) -> Self {
        self.message.details.push(DetailItem {
            kind: DetailKind::Info,
            content: content.into(),
            location: None,
        });
        self
    }

    /// Add a detail that points at another place in the same document.
    pub fn add_located_detail(mut self, content: impl Into<MessageContent>, location: Span) -> Self {
        self.message.details.push(DetailItem {
            kind: DetailKind::Info,
            content: content.into(),
            location: Some(location),
        });
        self
    }

    pub fn add_hint(mut self, hint: impl Into<MessageContent>) -> Self {
        self.message.hints.push(hint.into());
        self
    }

    pub fn build(self) -> DiagnosticMessage {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let msg = DiagnosticMessageBuilder::warning("Unused entity")
            .problem("Entity `e` is declared but never referenced")
            .add_hint("Remove the declaration?")
            .build();
        assert_eq!(msg.kind, DiagnosticKind::Warning);
        assert_eq!(msg.title, "Unused entity");
        assert!(msg.problem.is_some());
        assert_eq!(msg.hints.len(), 1);
    }

    #[test]
    fn test_builder_from_code() {
        let msg = DiagnosticMessageBuilder::from_code(
            DiagnosticKind::Error,
            "ETagRequired",
            &["root"],
        )
        .build();
        assert_eq!(msg.code.as_deref(), Some("ETagRequired"));
        assert_eq!(
            msg.title,
            "The element type \"root\" must be terminated by the matching end-tag \"</root>\"."
        );
    }

    #[test]
    fn test_builder_details_keep_order() {
        let msg = DiagnosticMessageBuilder::error("x")
            .add_detail("one")
            .add_info("two")
            .add_located_detail("three", Span::new(0, 1))
            .build();
        let kinds: Vec<_> = msg.details.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DetailKind::Error, DetailKind::Info, DetailKind::Info]);
        assert_eq!(msg.details[2].location, Some(Span::new(0, 1)));
    }
}
