//! Syntax problems recorded while building the tree.

use thiserror::Error;
use xmlls_error_reporting::{DiagnosticKind, DiagnosticMessage, DiagnosticMessageBuilder};
use xmlls_source_map::Span;

/// A well-formedness problem.
///
/// The parser never stops on these; it records them and keeps building the
/// tree. Each carries the span the matching diagnostic points at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("premature end of file")]
    PrematureEof { location: Span },

    #[error("text is not allowed before the root element")]
    ContentIllegalInProlog { location: Span },

    #[error("text is not allowed after the root element")]
    ContentIllegalInTrailingMisc { location: Span },

    #[error("markup after the root element")]
    MarkupAfterRoot { location: Span },

    #[error("`<` does not start any markup")]
    MarkupNotRecognized { location: Span },

    #[error("start tag of `{element}` is not terminated")]
    ElementUnterminated { element: String, location: Span },

    #[error("element `{element}` has no end tag")]
    EndTagRequired { element: String, location: Span },

    #[error("end tag of `{element}` is not terminated")]
    EndTagUnterminated { element: String, location: Span },

    #[error("end tag `</{element}>` has no start tag")]
    OrphanEndTag { element: String, location: Span },

    #[error("attribute `{attribute}` of `{element}` has no `=`")]
    EqRequired {
        element: String,
        attribute: String,
        location: Span,
    },

    #[error("attribute `{attribute}` of `{element}` has no quoted value")]
    OpenQuoteExpected {
        element: String,
        attribute: String,
        location: Span,
    },

    #[error("attribute `{attribute}` is repeated on `{element}`")]
    AttributeNotUnique {
        element: String,
        attribute: String,
        location: Span,
    },

    #[error("{construct} is not terminated")]
    UnterminatedMarkup {
        construct: &'static str,
        location: Span,
    },
}

impl SyntaxError {
    /// The catalog code for this problem.
    pub fn code(&self) -> &'static str {
        match self {
            SyntaxError::PrematureEof { .. } => "PrematureEOF",
            SyntaxError::ContentIllegalInProlog { .. } => "ContentIllegalInProlog",
            SyntaxError::ContentIllegalInTrailingMisc { .. } => "ContentIllegalInTrailingMisc",
            SyntaxError::MarkupAfterRoot { .. } => "MarkupNotRecognizedInMisc",
            SyntaxError::MarkupNotRecognized { .. } => "MarkupNotRecognizedInContent",
            SyntaxError::ElementUnterminated { .. } => "ElementUnterminated",
            SyntaxError::EndTagRequired { .. } => "ETagRequired",
            SyntaxError::EndTagUnterminated { .. } => "ETagUnterminated",
            SyntaxError::OrphanEndTag { .. } => "OrphanEndTag",
            SyntaxError::EqRequired { .. } => "EqRequiredInAttribute",
            SyntaxError::OpenQuoteExpected { .. } => "OpenQuoteExpected",
            SyntaxError::AttributeNotUnique { .. } => "AttributeNotUnique",
            SyntaxError::UnterminatedMarkup { .. } => "MarkupEntityMismatch",
        }
    }

    pub fn location(&self) -> Span {
        match self {
            SyntaxError::PrematureEof { location }
            | SyntaxError::ContentIllegalInProlog { location }
            | SyntaxError::ContentIllegalInTrailingMisc { location }
            | SyntaxError::MarkupAfterRoot { location }
            | SyntaxError::MarkupNotRecognized { location }
            | SyntaxError::ElementUnterminated { location, .. }
            | SyntaxError::EndTagRequired { location, .. }
            | SyntaxError::EndTagUnterminated { location, .. }
            | SyntaxError::OrphanEndTag { location, .. }
            | SyntaxError::EqRequired { location, .. }
            | SyntaxError::OpenQuoteExpected { location, .. }
            | SyntaxError::AttributeNotUnique { location, .. }
            | SyntaxError::UnterminatedMarkup { location, .. } => *location,
        }
    }

    fn arguments(&self) -> Vec<&str> {
        match self {
            SyntaxError::ElementUnterminated { element, .. }
            | SyntaxError::EndTagRequired { element, .. }
            | SyntaxError::EndTagUnterminated { element, .. }
            | SyntaxError::OrphanEndTag { element, .. } => vec![element.as_str()],
            SyntaxError::EqRequired {
                element, attribute, ..
            }
            | SyntaxError::OpenQuoteExpected {
                element, attribute, ..
            }
            | SyntaxError::AttributeNotUnique {
                element, attribute, ..
            } => vec![element.as_str(), attribute.as_str()],
            _ => Vec::new(),
        }
    }

    /// Convert to an error diagnostic located at the problem's span.
    pub fn to_diagnostic(&self) -> DiagnosticMessage {
        DiagnosticMessageBuilder::from_code(DiagnosticKind::Error, self.code(), &self.arguments())
            .with_location(self.location())
            .build()
    }
}
