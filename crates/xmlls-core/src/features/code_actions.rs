//! Quick fixes for elements whose start tag or element is left open, and
//! for elements their parent's content model does not allow.

use xmlls_contentmodel::{CMElementDeclaration, ContentModelManager, GrammarType};
use xmlls_dom::{Node, Parented, Rangeable};

use crate::document::XmlDocument;
use crate::types::{CodeAction, TextEdit};

/// Fixes for the element at `offset`, which is usually the location of an
/// `ElementUnterminated` or `ETagRequired` diagnostic (the element name).
///
/// * unterminated start tag of an unclosed element: insert `/>` or
///   `></name>`, or just `>` after a dangling `/`;
/// * unterminated start tag of a closed element: insert `>`;
/// * closed start tag without end tag: insert `</name>` after the content.
pub fn close_start_tag_fixes(doc: &XmlDocument, offset: usize) -> Vec<CodeAction> {
    let Some(element) = doc.dom().find_node_at(offset).filter(Node::is_element) else {
        return Vec::new();
    };
    let Some(name) = element.name() else {
        return Vec::new();
    };
    let text = doc.dom().text();
    let action = |title: String, at: usize, new_text: String| CodeAction {
        title,
        uri: doc.uri().to_string(),
        edits: vec![TextEdit::insert(doc.text().position_at(at), new_text)],
    };

    if !element.is_start_tag_closed() {
        let Some(start_tag) = element.start_tag_span() else {
            return Vec::new();
        };
        let at = start_tag.end;
        if element.is_closed() {
            return vec![action("Close with '>'".to_string(), at, ">".to_string())];
        }
        let rest = &text[at..element.end()];
        let padding = rest.len() - rest.trim_start().len();
        if rest.trim_start().starts_with('/') {
            let slash_end = at + padding + 1;
            return vec![action("Close with '>'".to_string(), slash_end, ">".to_string())];
        }
        return vec![
            action("Close with '/>'".to_string(), at, "/>".to_string()),
            action(format!("Close with '></{name}>'"), at, format!("></{name}>")),
        ];
    }

    if element.is_closed() {
        return Vec::new();
    }
    let Some(at) = content_end(element) else {
        return Vec::new();
    };
    vec![action(format!("Close with '</{name}>'"), at, format!("</{name}>"))]
}

/// A suggestion is "similar" when its edit distance to the current name is
/// within this share of the suggestion's length.
const MAX_DISTANCE_RATIO: f32 = 0.4;

/// Renames for the element at `offset` when its parent's content model
/// does not allow it there, usually the location of a
/// `cvc-complex-type.2.4.a` diagnostic (the element name).
///
/// Every element the model accepts at that position is offered, with names
/// close to the current one first as "Did you mean" fixes. Each fix renames
/// the start tag and the end tag.
pub fn unexpected_element_fixes(
    doc: &XmlDocument,
    offset: usize,
    manager: &ContentModelManager,
) -> Vec<CodeAction> {
    let Some(element) = doc.dom().find_node_at(offset).filter(Node::is_element) else {
        return Vec::new();
    };
    let Some(parent) = element.parent().filter(Node::is_element) else {
        return Vec::new();
    };
    let Some(parent_decl) = manager.find_cm_element(parent) else {
        return Vec::new();
    };
    let dtd = parent_decl.document.grammar_type() == GrammarType::Dtd;
    let current = if dtd { element.name() } else { element.local_name() };
    let Some(current) = current else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    ranges.extend(element.name_span().map(|span| doc.range_of(span)));
    ranges.extend(element.end_tag_name_span().map(|span| doc.range_of(span)));
    let prefix = element.prefix().filter(|_| !dtd);
    let action = |title: String, name: &str| {
        let new_text = match prefix {
            Some(prefix) => format!("{prefix}:{name}"),
            None => name.to_string(),
        };
        CodeAction {
            title,
            uri: doc.uri().to_string(),
            edits: ranges
                .iter()
                .map(|range| TextEdit::replace(*range, new_text.clone()))
                .collect(),
        }
    };

    let candidates: Vec<String> = expected_before(parent_decl.declaration(), element, dtd)
        .into_iter()
        .filter(|name| name != "*" && name != current)
        .collect();
    let (similar, other): (Vec<&String>, Vec<&String>) =
        candidates.iter().partition(|name| is_similar(name, current));
    similar
        .into_iter()
        .map(|name| action(format!("Did you mean '{name}'?"), name))
        .chain(
            other
                .into_iter()
                .map(|name| action(format!("Replace with '{name}'"), name)),
        )
        .collect()
}

/// The children `decl` accepts in place of `element`, given the siblings
/// before it. When an earlier sibling is already out of place every
/// allowed child is returned.
fn expected_before(decl: CMElementDeclaration<'_>, element: Node<'_>, dtd: bool) -> Vec<String> {
    let all = || decl.possible_children().into_iter().map(str::to_string).collect();
    let Some(parent) = element.parent() else {
        return all();
    };
    let mut matcher = decl.matcher();
    for sibling in parent.child_elements().take_while(|sibling| sibling.id() != element.id()) {
        let name = if dtd { sibling.name() } else { sibling.local_name() };
        if !matcher.accept(name.unwrap_or_default()) {
            return all();
        }
    }
    matcher.expected()
}

fn is_similar(suggestion: &str, current: &str) -> bool {
    let threshold = (MAX_DISTANCE_RATIO * suggestion.chars().count() as f32).round() as usize;
    strsim::levenshtein(suggestion, current) <= threshold
}

/// Where an end tag for `element` goes: after its last child, ignoring
/// trailing whitespace, or right after the start tag.
fn content_end(element: Node<'_>) -> Option<usize> {
    match element.last_child() {
        Some(child) if child.is_text() => Some(child.start() + child.text().trim_end().len()),
        Some(child) => Some(child.end()),
        None => element.start_tag_close_offset().map(|close| close + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixes(text: &str, offset: usize) -> Vec<(String, u32, String)> {
        let doc = XmlDocument::new("file:///a.xml", 1, text);
        close_start_tag_fixes(&doc, offset)
            .into_iter()
            .map(|action| {
                let edit = &action.edits[0];
                (action.title, edit.range.start.character, edit.new_text.clone())
            })
            .collect()
    }

    #[test]
    fn test_unterminated_unclosed_element() {
        assert_eq!(
            fixes("<a", 1),
            vec![
                ("Close with '/>'".to_string(), 2, "/>".to_string()),
                ("Close with '></a>'".to_string(), 2, "></a>".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_start_tag_with_end_tag() {
        assert_eq!(
            fixes("<div><div</div>", 7),
            vec![("Close with '>'".to_string(), 9, ">".to_string())]
        );
    }

    #[test]
    fn test_missing_end_tag() {
        assert_eq!(
            fixes("<a><b><c></a>", 4),
            vec![("Close with '</b>'".to_string(), 9, "</b>".to_string())]
        );
        assert_eq!(
            fixes("<a><b>text \n</a>", 4),
            vec![("Close with '</b>'".to_string(), 10, "</b>".to_string())]
        );
    }

    #[test]
    fn test_closed_element_needs_nothing() {
        assert!(fixes("<a></a>", 1).is_empty());
    }

    const MEMO: &str = r#"<!DOCTYPE memo [
<!ELEMENT memo (to, (body | from | date))>
<!ELEMENT to (#PCDATA)>
<!ELEMENT body (#PCDATA)>
<!ELEMENT from (#PCDATA)>
<!ELEMENT date (#PCDATA)>
]>
"#;

    fn rename_fixes(body: &str, at: &str) -> Vec<(String, Vec<String>)> {
        let text = format!("{MEMO}{body}");
        let offset = MEMO.len() + body.find(at).unwrap() + 1;
        let doc = XmlDocument::new("file:///memo.xml", 1, text);
        let manager = ContentModelManager::default();
        unexpected_element_fixes(&doc, offset, &manager)
            .into_iter()
            .map(|action| {
                let texts = action.edits.into_iter().map(|edit| edit.new_text).collect();
                (action.title, texts)
            })
            .collect()
    }

    #[test]
    fn test_unexpected_element_suggests_allowed_names() {
        let found = rename_fixes("<memo><to/><bdy>x</bdy></memo>", "bdy");
        let titles: Vec<&str> = found.iter().map(|(title, _)| title.as_str()).collect();
        assert_eq!(titles[0], "Did you mean 'body'?");
        let mut rest = titles[1..].to_vec();
        rest.sort_unstable();
        assert_eq!(rest, vec!["Replace with 'date'", "Replace with 'from'"]);
        assert_eq!(found[0].1, vec!["body".to_string(), "body".to_string()]);
    }

    #[test]
    fn test_unexpected_element_uses_position_in_model() {
        let found = rename_fixes("<memo><too/></memo>", "too");
        assert_eq!(
            found,
            vec![("Did you mean 'to'?".to_string(), vec!["to".to_string()])]
        );
        assert!(rename_fixes("<memo><to/></memo>", "memo").is_empty());
    }
}
