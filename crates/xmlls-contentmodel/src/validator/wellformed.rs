//! Namespace and entity-reference checks that do not need a grammar.

use std::collections::HashSet;

use xmlls_dom::{Node, Rangeable};
use xmlls_error_reporting::{DiagnosticKind, DiagnosticMessage, DiagnosticMessageBuilder};
use xmlls_source_map::Span;

const PREDEFINED_ENTITIES: [&str; 5] = ["lt", "gt", "amp", "apos", "quot"];

pub(crate) struct WellFormedness {
    /// General entities declared by the bound DTDs. `None` when an external
    /// subset could not be read, since any reference may be declared there.
    known_entities: Option<HashSet<String>>,
    diagnostics: Vec<DiagnosticMessage>,
}

impl WellFormedness {
    pub(crate) fn new(known_entities: Option<HashSet<String>>) -> Self {
        Self {
            known_entities,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn start_element(&mut self, node: Node<'_>) {
        if let (Some(name), Some(prefix)) = (node.name(), node.prefix()) {
            if prefix != "xml" && prefix != "xmlns" && node.lookup_namespace_uri(Some(prefix)).is_none()
            {
                let location = node.name_span().unwrap_or_else(|| node.span());
                self.diagnostics.push(
                    DiagnosticMessageBuilder::from_code(
                        DiagnosticKind::Error,
                        "ElementPrefixUnbound",
                        &[name, prefix],
                    )
                    .with_location(location)
                    .build(),
                );
            }
        }
        for attr in node.attributes() {
            if let Some(span) = attr.value_content_span() {
                self.scan(node.slice(span), span.start);
            }
        }
    }

    pub(crate) fn text(&mut self, node: Node<'_>) {
        self.scan(node.text(), node.start());
    }

    /// Report `&name;` references to undeclared entities in raw text that
    /// starts at byte offset `base`.
    fn scan(&mut self, text: &str, base: usize) {
        let Some(known) = &self.known_entities else {
            return;
        };
        let mut undeclared = Vec::new();
        let mut rest = text;
        let mut offset = base;
        while let Some(amp) = rest.find('&') {
            let after = &rest[amp + 1..];
            let end = after
                .find(|c: char| c == ';' || c == '&' || c == '<' || c.is_whitespace())
                .filter(|end| after[*end..].starts_with(';'));
            if let Some(end) = end {
                let name = &after[..end];
                if !name.is_empty()
                    && !name.starts_with('#')
                    && !PREDEFINED_ENTITIES.contains(&name)
                    && !known.contains(name)
                {
                    let start = offset + amp;
                    undeclared.push((name.to_string(), Span::new(start, start + end + 2)));
                }
            }
            offset += amp + 1;
            rest = after;
        }
        for (name, location) in undeclared {
            self.diagnostics.push(
                DiagnosticMessageBuilder::from_code(
                    DiagnosticKind::Error,
                    "EntityNotDeclared",
                    &[&name],
                )
                .with_location(location)
                .build(),
            );
        }
    }

    pub(crate) fn finish(self) -> Vec<DiagnosticMessage> {
        self.diagnostics
    }
}
