//! Tolerant XML parser that builds the [`Document`] arena.
//!
//! The parser never fails. Malformed markup is recorded as a
//! [`SyntaxError`] and the tree is built from whatever structure can be
//! recovered, because it is rebuilt on every keystroke while the user is
//! still typing.

use std::sync::Arc;

use xmlls_source_map::Span;

use crate::document::Document;
use crate::error::SyntaxError;
use crate::node::{AttrData, AttrId, ElementData, EndTag, NodeData, NodeId, NodeKind};

/// Parse XML text into a tree.
///
/// ```rust
/// use xmlls_dom::parse;
///
/// let doc = parse("<root><child attr=\"v\"/></root>");
/// let root = doc.root_element().unwrap();
/// assert_eq!(root.name(), Some("root"));
/// assert_eq!(doc.find_attr_at(15).map(|a| a.value()), Some("v"));
/// ```
pub fn parse(text: &str) -> Document {
    parse_shared(Arc::from(text), None)
}

/// Parse XML text that lives at `uri`; the uri is the base for resolving
/// relative system identifiers and schema locations.
pub fn parse_with_uri(text: impl Into<Arc<str>>, uri: impl Into<String>) -> Document {
    parse_shared(text.into(), Some(uri.into()))
}

/// Parse an already shared text snapshot.
pub fn parse_shared(text: Arc<str>, uri: Option<String>) -> Document {
    let mut parser = Parser::new(text, uri);
    parser.parse_content();
    parser.finish()
}

pub(crate) struct Parser {
    text: Arc<str>,
    pub(crate) pos: usize,
    pub(crate) doc: Document,
    /// Open elements; the document node sits at the bottom.
    stack: Vec<NodeId>,
    seen_root: bool,
}

impl Parser {
    pub(crate) fn new(text: Arc<str>, uri: Option<String>) -> Self {
        let doc = Document::empty(Arc::clone(&text), uri);
        Self {
            text,
            pos: 0,
            doc,
            stack: vec![NodeId::DOCUMENT],
            seen_root: false,
        }
    }

    // ====== Low-level scanning ======

    pub(crate) fn len(&self) -> usize {
        self.text.len()
    }

    pub(crate) fn byte(&self, at: usize) -> Option<u8> {
        self.text.as_bytes().get(at).copied()
    }

    pub(crate) fn rest(&self, at: usize) -> &str {
        self.text.get(at..).unwrap_or_default()
    }

    pub(crate) fn slice(&self, span: Span) -> &str {
        span.slice(&self.text)
    }

    pub(crate) fn skip_ws(&self, at: usize) -> usize {
        self.scan_while(at, char::is_whitespace)
    }

    pub(crate) fn scan_while(&self, at: usize, pred: impl Fn(char) -> bool) -> usize {
        let rest = self.rest(at);
        let stop = rest
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map_or(rest.len(), |(idx, _)| idx);
        at + stop
    }

    /// End of the XML name starting at `at` (`at` itself if there is none).
    pub(crate) fn scan_name(&self, at: usize) -> usize {
        match self.rest(at).chars().next() {
            Some(c) if is_name_start_char(c) => self.scan_while(at, is_name_char),
            _ => at,
        }
    }

    pub(crate) fn find_from(&self, at: usize, pattern: &str) -> Option<usize> {
        self.rest(at).find(pattern).map(|idx| at + idx)
    }

    // ====== Arena ======

    pub(crate) fn add_node(&mut self, kind: NodeKind, span: Span, parent: NodeId) -> NodeId {
        let id = NodeId(self.doc.nodes.len() as u32);
        self.doc.nodes.push(NodeData::new(kind, span, Some(parent)));
        self.doc.nodes[parent.index()].children.push(id);
        id
    }

    pub(crate) fn set_end(&mut self, id: NodeId, end: usize) {
        let span = &mut self.doc.nodes[id.index()].span;
        span.end = end.max(span.start);
    }

    pub(crate) fn problem(&mut self, problem: SyntaxError) {
        self.doc.problems.push(problem);
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(NodeId::DOCUMENT)
    }

    fn element_name(&self, id: NodeId) -> String {
        self.doc.node(id).name().unwrap_or_default().to_string()
    }

    // ====== Content ======

    fn parse_content(&mut self) {
        while self.pos < self.len() {
            let at = self.pos;
            let parent = self.current();
            let rest = self.rest(at);
            self.pos = if rest.starts_with("<!--") {
                self.comment(at, parent)
            } else if rest.starts_with("<![CDATA[") {
                self.cdata(at, parent)
            } else if rest.starts_with("<!DOCTYPE") {
                self.doctype(at, parent)
            } else if rest.starts_with("<?") {
                self.processing_instruction(at, parent)
            } else if rest.starts_with("</") {
                self.end_tag(at)
            } else if rest.starts_with('<') {
                self.start_tag(at)
            } else {
                self.text_node(at)
            };
        }
    }

    pub(crate) fn finish(mut self) -> Document {
        let len = self.len();
        while self.stack.len() > 1 {
            if let Some(id) = self.stack.pop() {
                self.set_end(id, len);
                self.report_missing_end_tag(id);
            }
        }
        if !self.seen_root && !self.doc.is_dtd {
            self.problem(SyntaxError::PrematureEof {
                location: Span::empty_at(len),
            });
        }
        self.doc
    }

    fn report_missing_end_tag(&mut self, id: NodeId) {
        let node = self.doc.node(id);
        // An unterminated start tag has already been reported
        if !node.is_start_tag_closed() {
            return;
        }
        let Some(location) = node.name_span() else {
            return;
        };
        let element = self.element_name(id);
        self.problem(SyntaxError::EndTagRequired { element, location });
    }

    pub(crate) fn comment(&mut self, start: usize, parent: NodeId) -> usize {
        let end = match self.find_from(start + 4, "-->") {
            Some(idx) => idx + 3,
            None => {
                self.problem(SyntaxError::UnterminatedMarkup {
                    construct: "comment",
                    location: Span::new(start, start + 4),
                });
                self.len()
            }
        };
        self.add_node(NodeKind::Comment, Span::new(start, end), parent);
        end
    }

    fn cdata(&mut self, start: usize, parent: NodeId) -> usize {
        let end = match self.find_from(start + 9, "]]>") {
            Some(idx) => idx + 3,
            None => {
                self.problem(SyntaxError::UnterminatedMarkup {
                    construct: "CDATA section",
                    location: Span::new(start, start + 9),
                });
                self.len()
            }
        };
        self.add_node(NodeKind::CData, Span::new(start, end), parent);
        end
    }

    pub(crate) fn processing_instruction(&mut self, start: usize, parent: NodeId) -> usize {
        let target_end = self.scan_name(start + 2);
        let target = (target_end > start + 2).then(|| Span::new(start + 2, target_end));
        let (end, closed) = match self.find_from(start + 2, "?>") {
            Some(idx) => (idx + 2, true),
            None => {
                self.problem(SyntaxError::UnterminatedMarkup {
                    construct: "processing instruction",
                    location: Span::new(start, target_end),
                });
                let stop = self.find_from(start + 2, "<").unwrap_or(self.len());
                (stop, false)
            }
        };
        self.add_node(
            NodeKind::ProcessingInstruction { target, closed },
            Span::new(start, end),
            parent,
        );
        end
    }

    fn text_node(&mut self, start: usize) -> usize {
        let end = self.find_from(start, "<").unwrap_or(self.len());
        let parent = self.current();
        let raw = self.slice(Span::new(start, end));
        if parent != NodeId::DOCUMENT {
            self.add_node(NodeKind::Text, Span::new(start, end), parent);
            return end;
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return end;
        }
        let lead = raw.len() - raw.trim_start().len();
        let location = Span::new(start + lead, start + lead + trimmed.len());
        self.problem(if self.seen_root {
            SyntaxError::ContentIllegalInTrailingMisc { location }
        } else {
            SyntaxError::ContentIllegalInProlog { location }
        });
        self.add_node(NodeKind::Text, Span::new(start, end), parent);
        end
    }

    // ====== Tags ======

    fn start_tag(&mut self, start: usize) -> usize {
        let parent = self.current();
        let name_end = self.scan_name(start + 1);
        if name_end == start + 1 {
            self.problem(SyntaxError::MarkupNotRecognized {
                location: Span::new(start, start + 1),
            });
            let data = ElementData::default();
            self.add_node(NodeKind::Element(data), Span::new(start, start + 1), parent);
            return start + 1;
        }

        let tag_name = Span::new(start + 1, name_end);
        if parent == NodeId::DOCUMENT {
            if self.seen_root {
                self.problem(SyntaxError::MarkupAfterRoot { location: tag_name });
            }
            self.seen_root = true;
        }
        let data = ElementData {
            tag_name: Some(tag_name),
            ..ElementData::default()
        };
        let id = self.add_node(NodeKind::Element(data), Span::new(start, name_end), parent);

        let mut at = name_end;
        loop {
            at = self.skip_ws(at);
            match self.byte(at) {
                Some(b'>') => {
                    self.set_start_tag_close(id, at, false);
                    at += 1;
                    self.stack.push(id);
                    break;
                }
                Some(b'/') if self.byte(at + 1) == Some(b'>') => {
                    self.set_start_tag_close(id, at, true);
                    at += 2;
                    break;
                }
                None | Some(b'<') => {
                    let element = self.element_name(id);
                    self.problem(SyntaxError::ElementUnterminated {
                        element,
                        location: tag_name,
                    });
                    // Stays open so a following end tag can still close it
                    self.stack.push(id);
                    break;
                }
                Some(_) => {
                    let name_end = self.scan_attribute_name(at);
                    at = if name_end > at {
                        self.attribute(id, at, name_end)
                    } else {
                        at + self.rest(at).chars().next().map_or(1, char::len_utf8)
                    };
                }
            }
        }
        self.set_end(id, at);
        at
    }

    fn set_start_tag_close(&mut self, id: NodeId, at: usize, self_closed: bool) {
        if let Some(data) = self.doc.nodes[id.index()].element_mut() {
            data.start_tag_close = Some(at);
            data.self_closed = self_closed;
        }
    }

    fn scan_attribute_name(&self, at: usize) -> usize {
        self.scan_while(at, |c| {
            !c.is_whitespace() && !matches!(c, '=' | '>' | '<' | '/' | '"' | '\'')
        })
    }

    /// Parse one attribute whose name spans `name_start..name_end`; returns
    /// the offset after it.
    fn attribute(&mut self, owner: NodeId, name_start: usize, name_end: usize) -> usize {
        let name = Span::new(name_start, name_end);
        let element = self.element_name(owner);
        let attribute = self.slice(name).to_string();

        let after_ws = self.skip_ws(name_end);
        let (delimiter, value, next) = if self.byte(after_ws) == Some(b'=') {
            let value_start = self.skip_ws(after_ws + 1);
            match self.byte(value_start) {
                Some(quote @ (b'"' | b'\'')) => {
                    let body = self.rest(value_start + 1);
                    let stop = body
                        .bytes()
                        .position(|b| b == quote || b == b'<')
                        .map_or(self.len(), |idx| value_start + 1 + idx);
                    let end = if self.byte(stop) == Some(quote) {
                        stop + 1
                    } else {
                        stop
                    };
                    (Some(after_ws), Some(Span::new(value_start, end)), end)
                }
                Some(b) if !b.is_ascii_whitespace() && b != b'>' && b != b'<' && b != b'/' => {
                    let end = self.scan_while(value_start, |c| {
                        !c.is_whitespace() && !matches!(c, '>' | '<')
                    });
                    self.problem(SyntaxError::OpenQuoteExpected {
                        element: element.clone(),
                        attribute: attribute.clone(),
                        location: name,
                    });
                    (Some(after_ws), Some(Span::new(value_start, end)), end)
                }
                _ => {
                    self.problem(SyntaxError::OpenQuoteExpected {
                        element: element.clone(),
                        attribute: attribute.clone(),
                        location: name,
                    });
                    (Some(after_ws), None, after_ws + 1)
                }
            }
        } else {
            self.problem(SyntaxError::EqRequired {
                element: element.clone(),
                attribute: attribute.clone(),
                location: name,
            });
            (None, None, name_end)
        };

        let duplicate = self
            .doc
            .node(owner)
            .attributes()
            .any(|existing| existing.name() == attribute);
        if duplicate {
            self.problem(SyntaxError::AttributeNotUnique {
                element,
                attribute,
                location: name,
            });
        }

        let id = AttrId(self.doc.attrs.len() as u32);
        self.doc.attrs.push(AttrData {
            owner,
            name,
            delimiter,
            value,
            normalized: Default::default(),
        });
        if let Some(data) = self.doc.nodes[owner.index()].element_mut() {
            data.attributes.push(id);
        }
        next
    }

    fn end_tag(&mut self, start: usize) -> usize {
        let name_end = self.scan_name(start + 2);
        let name = (name_end > start + 2).then(|| Span::new(start + 2, name_end));
        let after = self.skip_ws(name_end);
        let (end, closed) = if self.byte(after) == Some(b'>') {
            (after + 1, true)
        } else {
            // Skip junk up to a '>' unless a new tag starts first
            match self.rest(after).find(['>', '<']) {
                Some(idx) if self.byte(after + idx) == Some(b'>') => (after + idx + 1, true),
                Some(idx) => (after + idx, false),
                None => (self.len(), false),
            }
        };
        let span = Span::new(start, end);
        let tag = EndTag { span, name, closed };
        let element = name.map(|n| self.slice(n).to_string()).unwrap_or_default();
        let strict_close = self.byte(after) == Some(b'>');
        if !strict_close {
            self.problem(SyntaxError::EndTagUnterminated {
                element: element.clone(),
                location: name.unwrap_or(Span::new(start, start + 2)),
            });
        }

        let open = self.stack.iter().rposition(|id| {
            *id != NodeId::DOCUMENT && name.is_some() && self.doc.node(*id).name() == Some(element.as_str())
        });
        match open {
            Some(depth) => {
                // Everything opened after the match is closed implicitly
                while self.stack.len() > depth + 1 {
                    if let Some(inner) = self.stack.pop() {
                        self.set_end(inner, start);
                        self.report_missing_end_tag(inner);
                    }
                }
                if let Some(id) = self.stack.pop() {
                    if let Some(data) = self.doc.nodes[id.index()].element_mut() {
                        data.end_tag = Some(tag);
                    }
                    self.set_end(id, end);
                }
            }
            None => {
                let parent = self.current();
                let data = ElementData {
                    end_tag: Some(tag),
                    orphan_end_tag: true,
                    ..ElementData::default()
                };
                self.add_node(NodeKind::Element(data), span, parent);
                match name {
                    Some(location) => self.problem(SyntaxError::OrphanEndTag { element, location }),
                    None => self.problem(SyntaxError::MarkupNotRecognized {
                        location: Span::new(start, start + 2),
                    }),
                }
            }
        }
        end
    }
}

pub(crate) fn is_name_start_char(c: char) -> bool {
    c == ':' || c == '_' || c.is_ascii_alphabetic() || (!c.is_ascii() && c.is_alphabetic())
}

pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || c.is_ascii_digit()
        || matches!(c, '-' | '.' | '\u{B7}')
        || (!c.is_ascii() && c.is_alphanumeric())
}
