//! Grammar violations and the codes each grammar language reports them
//! under.

use xmlls_error_reporting::{DiagnosticKind, DiagnosticMessage, DiagnosticMessageBuilder};
use xmlls_source_map::Span;

use crate::grammar::GrammarType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Violation {
    UndeclaredElement {
        element: String,
    },
    RootMismatch {
        doctype: String,
        root: String,
    },
    /// A child the content model does not accept at this point.
    UnexpectedChild {
        element: String,
        model: String,
        child: String,
        expected: Vec<String>,
    },
    IncompleteContent {
        element: String,
        model: String,
        expected: Vec<String>,
    },
    TextNotAllowed {
        element: String,
        model: String,
        empty: bool,
    },
    UndeclaredAttribute {
        element: String,
        attribute: String,
    },
    MissingAttribute {
        element: String,
        attribute: String,
    },
    ValueNotInList {
        attribute: String,
        value: String,
        allowed: Vec<String>,
    },
    FixedValue {
        element: String,
        attribute: String,
        value: String,
        fixed: String,
    },
    DuplicateId {
        value: String,
    },
    DanglingIdRef {
        value: String,
    },
}

impl Violation {
    pub(crate) fn code_and_args(&self, grammar_type: GrammarType) -> (&'static str, Vec<String>) {
        let dtd = grammar_type == GrammarType::Dtd;
        match self {
            Violation::UndeclaredElement { element } => (
                if dtd { "MSG_ELEMENT_NOT_DECLARED" } else { "cvc-elt.1.a" },
                vec![element.clone()],
            ),
            Violation::RootMismatch { doctype, root } => (
                "RootElementTypeMustMatchDoctypedecl",
                vec![doctype.clone(), root.clone()],
            ),
            Violation::UnexpectedChild {
                element,
                model,
                child,
                expected,
            } => {
                if dtd {
                    ("MSG_CONTENT_INVALID", vec![element.clone(), model.clone()])
                } else if expected.is_empty() {
                    ("cvc-complex-type.2.4.d", vec![child.clone()])
                } else {
                    ("cvc-complex-type.2.4.a", vec![child.clone(), expected_list(expected)])
                }
            }
            Violation::IncompleteContent {
                element,
                model,
                expected,
            } => {
                if dtd {
                    ("MSG_CONTENT_INCOMPLETE", vec![element.clone(), model.clone()])
                } else {
                    ("cvc-complex-type.2.4.b", vec![element.clone(), expected_list(expected)])
                }
            }
            Violation::TextNotAllowed {
                element,
                model,
                empty,
            } => match (dtd, empty) {
                (true, _) => ("MSG_CONTENT_INVALID", vec![element.clone(), model.clone()]),
                (false, true) => ("cvc-complex-type.2.1", vec![element.clone()]),
                (false, false) => ("cvc-complex-type.2.3", vec![element.clone()]),
            },
            Violation::UndeclaredAttribute { element, attribute } => (
                if dtd { "MSG_ATTRIBUTE_NOT_DECLARED" } else { "cvc-complex-type.3.2.2" },
                vec![element.clone(), attribute.clone()],
            ),
            Violation::MissingAttribute { element, attribute } => (
                if dtd {
                    "MSG_REQUIRED_ATTRIBUTE_NOT_SPECIFIED"
                } else {
                    "cvc-complex-type.4"
                },
                vec![element.clone(), attribute.clone()],
            ),
            Violation::ValueNotInList {
                attribute,
                value,
                allowed,
            } => {
                if dtd {
                    (
                        "MSG_ATTRIBUTE_VALUE_NOT_IN_LIST",
                        vec![attribute.clone(), value.clone(), format!("({})", allowed.join("|"))],
                    )
                } else {
                    (
                        "cvc-enumeration-valid",
                        vec![value.clone(), format!("[{}]", allowed.join(", "))],
                    )
                }
            }
            Violation::FixedValue {
                element,
                attribute,
                value,
                fixed,
            } => (
                if dtd { "MSG_FIXED_ATTVALUE_INVALID" } else { "cvc-attribute.4" },
                vec![element.clone(), attribute.clone(), value.clone(), fixed.clone()],
            ),
            Violation::DuplicateId { value } => (
                if dtd { "MSG_ID_NOT_UNIQUE" } else { "cvc-id.2" },
                vec![value.clone()],
            ),
            Violation::DanglingIdRef { value } => (
                if dtd { "MSG_ELEMENT_WITH_ID_REQUIRED" } else { "cvc-id.1" },
                vec![value.clone()],
            ),
        }
    }

    pub(crate) fn to_diagnostic(
        &self,
        grammar_type: GrammarType,
        kind: DiagnosticKind,
        location: Span,
    ) -> DiagnosticMessage {
        let (code, args) = self.code_and_args(grammar_type);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        DiagnosticMessageBuilder::from_code(kind, code, &args)
            .with_location(location)
            .build()
    }
}

/// `{a, b}`, with wildcards spelled the way schema validators do.
fn expected_list(expected: &[String]) -> String {
    let names: Vec<&str> = expected
        .iter()
        .map(|name| if name == "*" { "WC[##any]" } else { name.as_str() })
        .collect();
    format!("{{{}}}", names.join(", "))
}
