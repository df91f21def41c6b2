//! Start and end tag names that are renamed together.

use xmlls_source_map::Span;

use crate::document::XmlDocument;
use crate::types::LinkedEditingRanges;

/// The start and end tag name ranges of the element whose tag name contains
/// `offset`. `None` unless the element has a matching end tag.
pub fn linked_editing_ranges(doc: &XmlDocument, offset: usize) -> Option<LinkedEditingRanges> {
    let element = doc.dom().find_node_at(offset)?;
    if !element.is_element() || element.is_orphan_end_tag() {
        return None;
    }
    let start_name = element.name_span()?;
    let end_name = element.end_tag_name_span()?;
    if !start_name.touches(offset) && !end_name.touches(offset) {
        return None;
    }
    if element.slice(start_name) != element.slice(end_name) {
        return None;
    }
    Some(LinkedEditingRanges {
        ranges: [start_name, end_name]
            .into_iter()
            .map(|span: Span| doc.range_of(span))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(text: &str, offset: usize) -> Option<Vec<(u32, u32)>> {
        let doc = XmlDocument::new("file:///a.xml", 1, text);
        linked_editing_ranges(&doc, offset).map(|linked| {
            linked
                .ranges
                .iter()
                .map(|range| (range.start.character, range.end.character))
                .collect()
        })
    }

    #[test]
    fn test_start_and_end_names() {
        let text = "<root><item>x</item></root>";
        assert_eq!(ranges(text, 8), Some(vec![(7, 11), (15, 19)]));
        assert_eq!(ranges(text, 17), Some(vec![(7, 11), (15, 19)]));
        // Inside the text content.
        assert_eq!(ranges(text, 12), None);
    }

    #[test]
    fn test_self_closed_element_has_no_pair() {
        assert_eq!(ranges("<root><item/></root>", 8), None);
    }
}
