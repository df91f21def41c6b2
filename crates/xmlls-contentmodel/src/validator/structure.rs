//! Validation of the element structure against a bound grammar.
//!
//! The validator consumes start/end/text events and keeps one frame per
//! open element, the way a streaming validator would.

use std::collections::HashMap;

use xmlls_dom::{Node, Rangeable, XSI_NS};
use xmlls_error_reporting::{DiagnosticKind, DiagnosticMessage};
use xmlls_source_map::Span;

use super::report::Violation;
use crate::content::{ContentMatcher, ContentModel};
use crate::grammar::GrammarType;
use crate::model::{
    CMAttributeDeclaration, CMDocument, CMElementDeclaration, dtd_attributes, find_attribute_in,
};

struct Frame<'g> {
    name: String,
    name_span: Span,
    decl: Option<CMElementDeclaration<'g>>,
    matcher: Option<ContentMatcher<'g>>,
    /// Nothing under a lax element is checked unless it is declared
    /// globally.
    lax: bool,
    failed: bool,
    text_reported: bool,
    text: String,
}

pub(crate) struct StructureValidator<'g> {
    grammar_type: GrammarType,
    documents: Vec<&'g CMDocument>,
    kind: DiagnosticKind,
    doctype_name: Option<String>,
    stack: Vec<Frame<'g>>,
    seen_root: bool,
    ids: HashMap<String, Span>,
    idrefs: Vec<(String, Span)>,
    diagnostics: Vec<DiagnosticMessage>,
}

impl<'g> StructureValidator<'g> {
    /// `documents` are searched in order; for DTDs pass the internal subset
    /// before the external one.
    pub(crate) fn new(
        grammar_type: GrammarType,
        documents: Vec<&'g CMDocument>,
        kind: DiagnosticKind,
        doctype_name: Option<String>,
    ) -> Self {
        Self {
            grammar_type,
            documents,
            kind,
            doctype_name,
            stack: Vec::new(),
            seen_root: false,
            ids: HashMap::new(),
            idrefs: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn is_dtd(&self) -> bool {
        self.grammar_type == GrammarType::Dtd
    }

    fn report(&mut self, violation: Violation, location: Span) {
        self.diagnostics
            .push(violation.to_diagnostic(self.grammar_type, self.kind, location));
    }

    fn global_for(&self, node: Node<'_>) -> Option<CMElementDeclaration<'g>> {
        let name = if self.is_dtd() { node.name()? } else { node.local_name()? };
        let namespace = node.namespace_uri();
        self.documents
            .iter()
            .filter(|document| document.covers_namespace(namespace))
            .find_map(|document| document.find_global(name))
    }

    pub(crate) fn start_element(&mut self, node: Node<'_>) {
        let dtd = self.is_dtd();
        let name = node.name().unwrap_or_default();
        let match_name = if dtd { name } else { node.local_name().unwrap_or(name) };
        let name_span = node.name_span().unwrap_or_else(|| node.span());

        if !self.seen_root {
            self.seen_root = true;
            if let Some(doctype) = self.doctype_name.clone().filter(|_| dtd) {
                if doctype != name {
                    self.report(
                        Violation::RootMismatch {
                            doctype,
                            root: name.to_string(),
                        },
                        name_span,
                    );
                }
            }
        }

        // Position the child in its parent's content model.
        let mut parent_lax = false;
        let mut via_wildcard = false;
        let mut rejected = None;
        if let Some(parent) = self.stack.last_mut() {
            parent_lax = parent.lax;
            if let (false, Some(parent_decl), Some(matcher)) =
                (parent.lax, parent.decl, parent.matcher.as_mut())
            {
                let expected = matcher.expected();
                let by_name = expected.iter().any(|e| e == match_name);
                if matcher.accept(match_name) {
                    via_wildcard = !by_name;
                } else if !parent.failed {
                    parent.failed = true;
                    if !dtd {
                        let violation = if parent_decl.is_empty() {
                            Violation::TextNotAllowed {
                                element: parent.name.clone(),
                                model: String::new(),
                                empty: true,
                            }
                        } else {
                            Violation::UnexpectedChild {
                                element: parent.name.clone(),
                                model: String::new(),
                                child: name.to_string(),
                                expected,
                            }
                        };
                        rejected = Some(violation);
                    }
                }
            }
        }
        if let Some(violation) = rejected {
            self.report(violation, name_span);
        }

        let parent_decl = self.stack.last().and_then(|parent| parent.decl);
        let decl = if dtd {
            self.global_for(node)
        } else {
            match parent_decl {
                Some(parent_decl) => parent_decl.find_child(match_name).or_else(|| {
                    if via_wildcard {
                        self.global_for(node)
                    } else {
                        None
                    }
                }),
                None => self.global_for(node),
            }
        };

        let mut lax = false;
        if decl.is_none() {
            if dtd || self.stack.is_empty() {
                self.report(
                    Violation::UndeclaredElement {
                        element: name.to_string(),
                    },
                    name_span,
                );
            }
            lax = !dtd;
        } else if parent_lax && !dtd {
            tracing::trace!(element = %name, "validating globally declared element under lax content");
        }

        if let Some(decl) = decl {
            self.check_attributes(node, decl, name);
        }
        self.stack.push(Frame {
            name: name.to_string(),
            name_span,
            decl,
            matcher: decl.map(|decl| decl.matcher()),
            lax,
            failed: false,
            text_reported: false,
            text: String::new(),
        });
    }

    fn check_attributes(&mut self, node: Node<'_>, decl: CMElementDeclaration<'g>, element: &str) {
        let dtd = self.is_dtd();
        // Both subsets of a DTD may declare attributes for the same element.
        let attributes: Vec<&'g CMAttributeDeclaration> = if dtd {
            dtd_attributes(&self.documents, element)
        } else {
            decl.attributes().iter().collect()
        };
        for attr in node.attributes() {
            if !dtd && (attr.is_xmlns() || attr.namespace_uri() == Some(XSI_NS)) {
                continue;
            }
            let Some(declared) = find_attribute_in(attributes.iter().copied(), attr.name()) else {
                if !decl.cm_type().any_attribute {
                    self.report(
                        Violation::UndeclaredAttribute {
                            element: element.to_string(),
                            attribute: attr.name().to_string(),
                        },
                        attr.name_span(),
                    );
                }
                continue;
            };
            let value = attr.normalized_value();
            let location = attr.value_span().unwrap_or_else(|| attr.name_span());
            let allowed = declared.enumeration_values();
            if !allowed.is_empty() && !allowed.iter().any(|candidate| candidate == value.trim()) {
                self.report(
                    Violation::ValueNotInList {
                        attribute: attr.name().to_string(),
                        value: value.to_string(),
                        allowed: allowed.to_vec(),
                    },
                    location,
                );
            }
            if let (true, Some(fixed)) = (declared.fixed, declared.default_value.as_deref()) {
                if value != fixed {
                    self.report(
                        Violation::FixedValue {
                            element: element.to_string(),
                            attribute: attr.name().to_string(),
                            value: value.to_string(),
                            fixed: fixed.to_string(),
                        },
                        location,
                    );
                }
            }
            if declared.is_id() {
                let id = value.trim();
                if self.ids.contains_key(id) {
                    self.report(Violation::DuplicateId { value: id.to_string() }, location);
                } else {
                    self.ids.insert(id.to_string(), location);
                }
            } else if declared.is_idref() {
                self.idrefs.extend(
                    value
                        .split_whitespace()
                        .map(|reference| (reference.to_string(), location)),
                );
            }
        }

        let name_span = node.name_span().unwrap_or_else(|| node.span());
        for declared in attributes.iter().filter(|declared| declared.required) {
            let present = node.attributes().any(|attr| {
                attr.name() == declared.name || attr.local_name() == declared.local_name()
            });
            if !present {
                self.report(
                    Violation::MissingAttribute {
                        element: element.to_string(),
                        attribute: declared.name.clone(),
                    },
                    name_span,
                );
            }
        }
    }

    /// Character data, from text nodes and CDATA sections.
    pub(crate) fn text(&mut self, node: Node<'_>) {
        let dtd = self.is_dtd();
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        let Some(decl) = frame.decl.filter(|_| !frame.lax) else {
            return;
        };
        let content = node.text_content();
        frame.text.push_str(content);
        if content.trim().is_empty() || decl.content().allows_text() || frame.text_reported {
            return;
        }
        frame.text_reported = true;
        if dtd {
            frame.failed = true;
            return;
        }
        let violation = Violation::TextNotAllowed {
            element: frame.name.clone(),
            model: String::new(),
            empty: decl.is_empty(),
        };
        self.report(violation, trimmed_span(node));
    }

    pub(crate) fn end_element(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let Some(decl) = frame.decl.filter(|_| !frame.lax) else {
            return;
        };
        let complete = frame.matcher.as_ref().is_none_or(|matcher| matcher.is_complete());
        if self.is_dtd() {
            let model = model_text(decl);
            if frame.failed {
                let violation = Violation::UnexpectedChild {
                    element: frame.name,
                    model,
                    child: String::new(),
                    expected: Vec::new(),
                };
                self.report(violation, frame.name_span);
            } else if !complete {
                let violation = Violation::IncompleteContent {
                    element: frame.name,
                    model,
                    expected: Vec::new(),
                };
                self.report(violation, frame.name_span);
            }
            return;
        }

        if !frame.failed && !complete {
            let expected = frame
                .matcher
                .as_ref()
                .map(|matcher| matcher.expected())
                .unwrap_or_default();
            let violation = Violation::IncompleteContent {
                element: frame.name.clone(),
                model: model_text(decl),
                expected,
            };
            self.report(violation, frame.name_span);
        }
        let allowed = &decl.cm_type().text_enumeration;
        let value = frame.text.trim();
        if !allowed.is_empty() && !allowed.iter().any(|candidate| candidate == value) {
            let violation = Violation::ValueNotInList {
                attribute: frame.name,
                value: value.to_string(),
                allowed: allowed.clone(),
            };
            self.report(violation, frame.name_span);
        }
    }

    /// Report IDREFs that never met their ID and hand back everything found.
    pub(crate) fn finish(mut self) -> Vec<DiagnosticMessage> {
        let dangling: Vec<(String, Span)> = std::mem::take(&mut self.idrefs)
            .into_iter()
            .filter(|(reference, _)| !self.ids.contains_key(reference))
            .collect();
        for (value, location) in dangling {
            self.report(Violation::DanglingIdRef { value }, location);
        }
        self.diagnostics
    }
}

/// The content model as shown in messages.
fn model_text(decl: CMElementDeclaration<'_>) -> String {
    if let Some(text) = decl.model_text() {
        return text.to_string();
    }
    match decl.content() {
        ContentModel::Empty => "EMPTY".to_string(),
        ContentModel::Any => "ANY".to_string(),
        ContentModel::Text => "(#PCDATA)".to_string(),
        ContentModel::Mixed(names) => format!("(#PCDATA|{})*", names.join("|")),
        ContentModel::Elements { particle, .. } => {
            format!("{{{}}}", particle.element_names().join(", "))
        }
    }
}

/// The span of a text node without its surrounding whitespace.
fn trimmed_span(node: Node<'_>) -> Span {
    let raw = node.text();
    let lead = raw.len() - raw.trim_start().len();
    let start = node.start() + lead;
    Span::new(start, (start + raw.trim().len()).max(start))
}
