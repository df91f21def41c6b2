//! DOCTYPE and markup declaration parsing.
//!
//! Declarations are tokenized loosely: quoted literals, balanced
//! parenthesized groups (with their occurrence suffix) and bare words. That
//! is enough to locate every name, type and literal while the user types,
//! without validating the declaration grammar itself.

use std::sync::Arc;

use xmlls_source_map::Span;

use crate::document::Document;
use crate::error::SyntaxError;
use crate::node::{
    AttDefData, AttlistDeclData, DocTypeData, ElementDeclData, EntityDeclData, NodeId, NodeKind,
    NotationDeclData,
};
use crate::parser::Parser;

/// Parse a standalone DTD file. Declarations become children of the
/// document node.
pub fn parse_dtd(text: impl Into<Arc<str>>, uri: Option<String>) -> Document {
    let mut parser = Parser::new(text.into(), uri);
    parser.doc.is_dtd = true;
    parser.pos = parser.markup_decls(0, NodeId::DOCUMENT, false);
    parser.finish()
}

struct DeclTokens {
    tokens: Vec<Span>,
    end: usize,
    closed: bool,
}

impl Parser {
    /// Parse `<!DOCTYPE ...>` starting at `start`; returns the offset after it.
    pub(crate) fn doctype(&mut self, start: usize, parent: NodeId) -> usize {
        let keyword_end = start + "<!DOCTYPE".len();
        let mut data = DocTypeData::default();

        let mut at = self.skip_ws(keyword_end);
        let name_end = self.scan_name(at);
        if name_end > at {
            data.name = Some(Span::new(at, name_end));
            at = self.skip_ws(name_end);
        }
        if let Some(kind) = self.keyword(at, &["SYSTEM", "PUBLIC"]) {
            data.kind = Some(kind);
            at = self.skip_ws(kind.end);
            if self.slice(kind) == "PUBLIC" {
                if let Some(public_id) = self.quoted(at) {
                    data.public_id = Some(public_id);
                    at = self.skip_ws(public_id.end);
                }
            }
            if let Some(system_id) = self.quoted(at) {
                data.system_id = Some(system_id);
                at = self.skip_ws(system_id.end);
            }
        }

        let id = self.add_node(
            NodeKind::DocumentType(DocTypeData::default()),
            Span::new(start, at),
            parent,
        );

        if self.byte(at) == Some(b'[') {
            let subset_start = at + 1;
            let subset_end = self.markup_decls(subset_start, id, true);
            data.internal_subset = Some(Span::new(subset_start, subset_end));
            at = subset_end;
            if self.byte(at) == Some(b']') {
                at = self.skip_ws(at + 1);
            }
        }

        if self.byte(at) == Some(b'>') {
            data.closed = true;
            at += 1;
        } else {
            self.problem(SyntaxError::UnterminatedMarkup {
                construct: "DOCTYPE declaration",
                location: Span::new(start, keyword_end),
            });
        }

        self.doc.nodes[id.index()].kind = NodeKind::DocumentType(data);
        self.set_end(id, at);
        at
    }

    /// Parse markup declarations from `from`; returns the offset where parsing
    /// stopped (the `]` closing an internal subset, or the end of the text).
    pub(crate) fn markup_decls(&mut self, from: usize, parent: NodeId, in_subset: bool) -> usize {
        let mut at = from;
        loop {
            at = self.skip_ws(at);
            if at >= self.len() {
                return at;
            }
            let rest = self.rest(at);
            at = if in_subset && rest.starts_with(']') {
                return at;
            } else if rest.starts_with("<!--") {
                self.comment(at, parent)
            } else if rest.starts_with("<?") {
                self.processing_instruction(at, parent)
            } else if rest.starts_with("<!ELEMENT") {
                self.element_decl(at, parent)
            } else if rest.starts_with("<!ATTLIST") {
                self.attlist_decl(at, parent)
            } else if rest.starts_with("<!ENTITY") {
                self.entity_decl(at, parent)
            } else if rest.starts_with("<!NOTATION") {
                self.notation_decl(at, parent)
            } else if rest.starts_with("<![") {
                // Conditional sections are skipped whole
                self.find_from(at, "]]>").map_or(self.len(), |idx| idx + 3)
            } else if rest.starts_with('%') {
                self.find_from(at, ";")
                    .filter(|semi| !self.rest(at)[..semi - at].contains(char::is_whitespace))
                    .map_or(at + 1, |semi| semi + 1)
            } else {
                self.skip_unknown(at, in_subset)
            };
        }
    }

    fn skip_unknown(&self, at: usize, in_subset: bool) -> usize {
        let stops: &[char] = if in_subset { &['<', ']'] } else { &['<'] };
        let after_first = at + self.rest(at).chars().next().map_or(1, char::len_utf8);
        self.rest(after_first)
            .find(stops)
            .map_or(self.len(), |idx| after_first + idx)
    }

    fn element_decl(&mut self, start: usize, parent: NodeId) -> usize {
        let decl = self.decl_tokens(start + "<!ELEMENT".len());
        let data = ElementDeclData {
            name: decl.tokens.first().copied(),
            content: decl.tokens.get(1).copied(),
            closed: decl.closed,
        };
        self.finish_decl(start, "<!ELEMENT", NodeKind::ElementDecl(data), &decl, parent)
    }

    fn attlist_decl(&mut self, start: usize, parent: NodeId) -> usize {
        let decl = self.decl_tokens(start + "<!ATTLIST".len());
        let mut data = AttlistDeclData {
            element_name: decl.tokens.first().copied(),
            definitions: Vec::new(),
            closed: decl.closed,
        };

        let mut tokens = decl.tokens.iter().skip(1).copied().peekable();
        while let Some(name) = tokens.next() {
            let mut def = AttDefData {
                name,
                att_type: None,
                default_kind: None,
                default_value: None,
            };
            if let Some(token) = tokens.next_if(|t| !self.is_default_token(*t)) {
                def.att_type = Some(token);
                // NOTATION (a|b)
                if self.slice(token) == "NOTATION" {
                    if let Some(group) = tokens.next_if(|t| self.slice(*t).starts_with('(')) {
                        def.att_type = Some(Span::new(token.start, group.end));
                    }
                }
            }
            if let Some(token) = tokens.next_if(|t| self.slice(*t).starts_with('#')) {
                def.default_kind = Some(token);
            }
            let takes_value = def
                .default_kind
                .is_none_or(|kind| self.slice(kind) == "#FIXED");
            if takes_value {
                def.default_value = tokens.next_if(|t| is_quoted(self.slice(*t)));
            }
            data.definitions.push(def);
        }

        self.finish_decl(start, "<!ATTLIST", NodeKind::AttlistDecl(data), &decl, parent)
    }

    fn is_default_token(&self, token: Span) -> bool {
        let text = self.slice(token);
        text.starts_with('#') || is_quoted(text)
    }

    fn entity_decl(&mut self, start: usize, parent: NodeId) -> usize {
        let decl = self.decl_tokens(start + "<!ENTITY".len());
        let mut data = EntityDeclData {
            closed: decl.closed,
            ..EntityDeclData::default()
        };

        let mut tokens = decl.tokens.iter().copied().peekable();
        data.parameter = tokens.next_if(|t| self.slice(*t) == "%").is_some();
        data.name = tokens.next();
        match tokens.next() {
            Some(token) if is_quoted(self.slice(token)) => data.value = Some(token),
            Some(token) => {
                let (public_id, system_id) = self.external_id(token, &mut tokens);
                data.kind = Some(token);
                data.public_id = public_id;
                data.system_id = system_id;
                if tokens.next_if(|t| self.slice(*t) == "NDATA").is_some() {
                    data.ndata = tokens.next();
                }
            }
            None => {}
        }

        self.finish_decl(start, "<!ENTITY", NodeKind::EntityDecl(data), &decl, parent)
    }

    fn notation_decl(&mut self, start: usize, parent: NodeId) -> usize {
        let decl = self.decl_tokens(start + "<!NOTATION".len());
        let mut tokens = decl.tokens.iter().copied().peekable();
        let mut data = NotationDeclData {
            name: tokens.next(),
            closed: decl.closed,
            ..NotationDeclData::default()
        };
        if let Some(kind) = tokens.next() {
            let (public_id, system_id) = self.external_id(kind, &mut tokens);
            data.kind = Some(kind);
            data.public_id = public_id;
            data.system_id = system_id;
        }
        self.finish_decl(start, "<!NOTATION", NodeKind::NotationDecl(data), &decl, parent)
    }

    /// Literals following a `SYSTEM` or `PUBLIC` keyword.
    fn external_id(
        &self,
        kind: Span,
        tokens: &mut std::iter::Peekable<impl Iterator<Item = Span>>,
    ) -> (Option<Span>, Option<Span>) {
        let quoted = |t: &Span| is_quoted(self.slice(*t));
        match self.slice(kind) {
            "SYSTEM" => (None, tokens.next_if(quoted)),
            "PUBLIC" => {
                let public_id = tokens.next_if(quoted);
                (public_id, tokens.next_if(quoted))
            }
            _ => (None, None),
        }
    }

    fn finish_decl(
        &mut self,
        start: usize,
        keyword: &'static str,
        kind: NodeKind,
        decl: &DeclTokens,
        parent: NodeId,
    ) -> usize {
        if !decl.closed {
            self.problem(SyntaxError::UnterminatedMarkup {
                construct: "markup declaration",
                location: Span::new(start, start + keyword.len()),
            });
        }
        self.add_node(kind, Span::new(start, decl.end), parent);
        decl.end
    }

    fn decl_tokens(&self, from: usize) -> DeclTokens {
        let mut tokens = Vec::new();
        let mut at = from;
        loop {
            at = self.skip_ws(at);
            match self.byte(at) {
                None => {
                    return DeclTokens { tokens, end: at, closed: false };
                }
                Some(b'>') => {
                    return DeclTokens { tokens, end: at + 1, closed: true };
                }
                Some(b'<') => {
                    return DeclTokens { tokens, end: at, closed: false };
                }
                Some(b'"' | b'\'') => {
                    let span = self.quoted(at).unwrap_or(Span::new(at, at + 1));
                    tokens.push(span);
                    at = span.end;
                }
                Some(b'(') => {
                    let end = self.group_end(at);
                    tokens.push(Span::new(at, end));
                    at = end;
                }
                Some(_) => {
                    let end = self.scan_while(at, |c| {
                        !c.is_whitespace() && !matches!(c, '>' | '<' | '(' | '"' | '\'')
                    });
                    let end = if end == at { at + 1 } else { end };
                    tokens.push(Span::new(at, end));
                    at = end;
                }
            }
        }
    }

    /// End of a balanced parenthesized group, including a trailing `?`, `*`
    /// or `+`. An unbalanced group stops before `>` or `<`.
    fn group_end(&self, at: usize) -> usize {
        let mut depth = 0usize;
        for (idx, b) in self.rest(at).bytes().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        let end = at + idx + 1;
                        return match self.byte(end) {
                            Some(b'?' | b'*' | b'+') => end + 1,
                            _ => end,
                        };
                    }
                }
                b'>' | b'<' => return at + idx,
                _ => {}
            }
        }
        self.len()
    }

    /// A quoted literal at `at`, quotes included. An unterminated literal
    /// stops before the next `>` or `<`.
    pub(crate) fn quoted(&self, at: usize) -> Option<Span> {
        let quote = match self.byte(at)? {
            q @ (b'"' | b'\'') => q,
            _ => return None,
        };
        let body = self.rest(at + 1);
        if let Some(idx) = body.bytes().position(|b| b == quote) {
            return Some(Span::new(at, at + 1 + idx + 1));
        }
        let stop = body.find(['>', '<']).map_or(self.len(), |idx| at + 1 + idx);
        Some(Span::new(at, stop))
    }

    fn keyword(&self, at: usize, candidates: &[&str]) -> Option<Span> {
        let end = self.scan_while(at, |c| c.is_ascii_alphabetic());
        let word = self.slice(Span::new(at, end));
        candidates
            .contains(&word)
            .then(|| Span::new(at, end))
    }
}

fn is_quoted(text: &str) -> bool {
    text.starts_with(['"', '\''])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Rangeable;
    use crate::parse;

    #[test]
    fn test_doctype_with_system_id() {
        let doc = parse("<!DOCTYPE note SYSTEM \"note.dtd\">\n<note/>");
        let doctype = doc.doctype().unwrap();
        let data = doctype.doctype_data().unwrap();
        assert_eq!(doctype.name(), Some("note"));
        assert_eq!(data.kind.map(|s| doctype.slice(s)), Some("SYSTEM"));
        assert_eq!(data.system_id.map(|s| doctype.slice(s)), Some("\"note.dtd\""));
        assert!(data.public_id.is_none());
        assert!(data.closed);
        assert_eq!(doctype.span(), Span::new(0, 33));
    }

    #[test]
    fn test_doctype_with_public_id() {
        let doc = parse("<!DOCTYPE html PUBLIC '-//W3C//DTD XHTML 1.0//EN' 'x.dtd'><html/>");
        let data = doc.doctype().unwrap().doctype_data().unwrap();
        assert_eq!(data.public_id.map(|s| s.slice(doc.text())), Some("'-//W3C//DTD XHTML 1.0//EN'"));
        assert_eq!(data.system_id.map(|s| s.slice(doc.text())), Some("'x.dtd'"));
    }

    #[test]
    fn test_internal_subset_declarations() {
        let text = "<!DOCTYPE r [\n  <!ELEMENT r (a|b)*>\n  <!ATTLIST r id ID #REQUIRED kind (x|y) \"x\">\n  <!ENTITY % pe 'p'>\n]>\n<r/>";
        let doc = parse(text);
        assert!(doc.syntax_errors().is_empty());
        let doctype = doc.doctype().unwrap();
        let kinds: Vec<_> = doctype.children().map(|n| n.kind_name()).collect();
        assert_eq!(kinds, vec!["element-decl", "attlist-decl", "entity-decl"]);

        let element = doctype.first_child().unwrap();
        let content = element.element_decl_data().unwrap().content.unwrap();
        assert_eq!(content.slice(text), "(a|b)*");

        let attlist = element.next_sibling().unwrap();
        assert_eq!(attlist.name(), Some("r"));
        let defs = &attlist.attlist_decl_data().unwrap().definitions;
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name.slice(text), "id");
        assert_eq!(defs[0].att_type.map(|s| s.slice(text)), Some("ID"));
        assert_eq!(defs[0].default_kind.map(|s| s.slice(text)), Some("#REQUIRED"));
        assert!(defs[0].default_value.is_none());
        assert_eq!(defs[1].att_type.map(|s| s.slice(text)), Some("(x|y)"));
        assert_eq!(defs[1].default_value.map(|s| s.slice(text)), Some("\"x\""));

        let entity = attlist.next_sibling().unwrap();
        assert!(entity.entity_decl_data().unwrap().parameter);
        assert_eq!(entity.name(), Some("pe"));
    }

    #[test]
    fn test_unterminated_doctype() {
        let doc = parse("<!DOCTYPE r\n<r/>");
        assert_eq!(doc.syntax_errors()[0].code(), "MarkupEntityMismatch");
        assert_eq!(doc.root_element().and_then(|n| n.name()), Some("r"));
    }

    #[test]
    fn test_parse_dtd_file() {
        let text = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!ELEMENT note (to,from)>\n<!ELEMENT to (#PCDATA)>\n<!NOTATION gif SYSTEM \"image/gif\">\n<!ENTITY logo SYSTEM \"logo.gif\" NDATA gif>\n";
        let doc = parse_dtd(text, Some("file:///note.dtd".to_string()));
        assert!(doc.is_dtd());
        assert!(doc.syntax_errors().is_empty());
        let names: Vec<_> = doc
            .document_node()
            .children()
            .filter(|n| n.is_dtd_decl())
            .filter_map(|n| n.name())
            .collect();
        assert_eq!(names, vec!["note", "to", "gif", "logo"]);

        let logo = doc.document_node().last_child().unwrap();
        let data = logo.entity_decl_data().unwrap();
        assert_eq!(data.system_id.map(|s| s.slice(text)), Some("\"logo.gif\""));
        assert_eq!(data.ndata.map(|s| s.slice(text)), Some("gif"));
    }

    #[test]
    fn test_unterminated_declaration_stops_at_next_markup() {
        let text = "<!ELEMENT a (b\n<!ELEMENT b EMPTY>";
        let doc = parse_dtd(text, None);
        let decls: Vec<_> = doc.document_node().children().collect();
        assert_eq!(decls.len(), 2);
        assert!(!decls[0].element_decl_data().unwrap().closed);
        assert!(decls[1].element_decl_data().unwrap().closed);
        assert_eq!(doc.syntax_errors().len(), 1);
    }
}
