//! Flattening a tree back into start/end events.
//!
//! Validators walk the tree as a stream of events so they can keep their
//! own element stack, the way a streaming validator would over raw XML.

use crate::document::{Document, Node};

/// One step of a depth-first walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XmlEvent<'a> {
    StartElement(Node<'a>),
    EndElement(Node<'a>),
    Text(Node<'a>),
    CData(Node<'a>),
    Comment(Node<'a>),
    ProcessingInstruction(Node<'a>),
    DocumentType(Node<'a>),
}

enum Step<'a> {
    Enter(Node<'a>),
    Leave(Node<'a>),
}

/// Iterator returned by [`Document::events`].
pub struct Events<'a> {
    stack: Vec<Step<'a>>,
}

impl<'a> Iterator for Events<'a> {
    type Item = XmlEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(step) = self.stack.pop() {
            let node = match step {
                Step::Leave(node) => return Some(XmlEvent::EndElement(node)),
                Step::Enter(node) => node,
            };
            if node.is_element() {
                // Orphan end tags and bare `<` carry no element
                if node.is_orphan_end_tag() || node.name().is_none() {
                    continue;
                }
                self.stack.push(Step::Leave(node));
                push_children(&mut self.stack, node);
                return Some(XmlEvent::StartElement(node));
            }
            let event = if node.is_text() {
                XmlEvent::Text(node)
            } else if node.is_cdata() {
                XmlEvent::CData(node)
            } else if node.is_comment() {
                XmlEvent::Comment(node)
            } else if node.is_processing_instruction() {
                XmlEvent::ProcessingInstruction(node)
            } else if node.is_doctype() {
                XmlEvent::DocumentType(node)
            } else {
                continue;
            };
            return Some(event);
        }
        None
    }
}

fn push_children<'a>(stack: &mut Vec<Step<'a>>, node: Node<'a>) {
    let children: Vec<_> = node.children().collect();
    stack.extend(children.into_iter().rev().map(Step::Enter));
}

impl Document {
    /// Depth-first events for the whole document.
    pub fn events(&self) -> Events<'_> {
        let mut stack = Vec::new();
        push_children(&mut stack, self.document_node());
        Events { stack }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn trace(doc: &Document) -> Vec<String> {
        doc.events()
            .map(|event| match event {
                XmlEvent::StartElement(n) => format!("<{}", n.name().unwrap_or_default()),
                XmlEvent::EndElement(n) => format!("{}>", n.name().unwrap_or_default()),
                XmlEvent::Text(n) => format!("'{}'", n.text()),
                XmlEvent::CData(_) => "cdata".to_string(),
                XmlEvent::Comment(_) => "comment".to_string(),
                XmlEvent::ProcessingInstruction(_) => "pi".to_string(),
                XmlEvent::DocumentType(_) => "doctype".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_events_in_document_order() {
        let doc = parse("<!DOCTYPE a><a><b>x</b><!--c--><c/></a>");
        assert_eq!(
            trace(&doc),
            vec!["doctype", "<a", "<b", "'x'", "b>", "comment", "<c", "c>", "a>"]
        );
    }

    #[test]
    fn test_events_skip_orphans() {
        let doc = parse("<a></b></a>");
        assert_eq!(trace(&doc), vec!["<a", "a>"]);
    }
}
