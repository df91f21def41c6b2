//! Immutable text snapshots with editor position conversion.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::file_info::FileInformation;
use crate::types::{Position, PositionRange, Span};

/// A versioned snapshot of a document's text.
///
/// Snapshots are never edited in place; a text change produces a new
/// `TextDocument` with a higher version. The text is shared behind an
/// `Arc<str>` so parse trees built from it can hold on to it cheaply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDocument {
    uri: String,
    version: i32,
    text: Arc<str>,
    info: FileInformation,
}

impl TextDocument {
    pub fn new(uri: impl Into<String>, version: i32, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let info = FileInformation::new(&text);
        Self {
            uri: uri.into(),
            version,
            text,
            info,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Shared handle to the text.
    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    /// Build the next version of this document with new text.
    pub fn with_text(&self, version: i32, text: impl Into<Arc<str>>) -> Self {
        Self::new(self.uri.clone(), version, text)
    }

    /// Convert a byte offset to a line / UTF-16 character position.
    ///
    /// Offsets past the end of the text are clamped to the end, and offsets
    /// inside a multi-byte character are moved back to its start.
    pub fn position_at(&self, offset: usize) -> Position {
        let info = &self.info;
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let Some(loc) = info.offset_to_location(offset) else {
            return Position::default();
        };
        let line_start = offset - loc.column;
        let character: usize = self.text[line_start..offset]
            .chars()
            .map(char::len_utf16)
            .sum();
        Position::new(loc.row as u32, character as u32)
    }

    /// Convert a position back to a byte offset.
    ///
    /// Lines past the end clamp to the end of the text; characters past the
    /// end of a line clamp to the end of that line.
    pub fn offset_at(&self, position: Position) -> usize {
        let info = &self.info;
        let row = position.line as usize;
        let (Some(start), Some(end)) = (info.line_start(row), info.line_end(row)) else {
            return self.text.len();
        };
        let line = &self.text[start..end];
        let mut remaining = position.character as usize;
        for (idx, ch) in line.char_indices() {
            if remaining == 0 {
                return start + idx;
            }
            remaining = remaining.saturating_sub(ch.len_utf16());
        }
        end
    }

    pub fn range_of(&self, span: Span) -> PositionRange {
        PositionRange::new(self.position_at(span.start), self.position_at(span.end))
    }

    pub fn span_of(&self, range: PositionRange) -> Span {
        let start = self.offset_at(range.start);
        let end = self.offset_at(range.end).max(start);
        Span::new(start, end)
    }

    /// Text of `row` without its line terminator.
    pub fn line_text(&self, row: usize) -> Option<&str> {
        let info = &self.info;
        let start = info.line_start(row)?;
        let end = info.line_end(row)?;
        let line = &self.text[start..end];
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    pub fn line_count(&self) -> usize {
        self.info.line_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_at_ascii() {
        let doc = TextDocument::new("file:///a.xml", 1, "<a>\n  <b/>\n</a>");
        assert_eq!(doc.position_at(0), Position::new(0, 0));
        assert_eq!(doc.position_at(3), Position::new(0, 3));
        assert_eq!(doc.position_at(4), Position::new(1, 0));
        assert_eq!(doc.position_at(6), Position::new(1, 2));
        assert_eq!(doc.position_at(999), Position::new(2, 4));
    }

    #[test]
    fn test_position_at_counts_utf16_units() {
        // '𝄞' is 4 bytes in UTF-8 and 2 UTF-16 code units
        let doc = TextDocument::new("file:///a.xml", 1, "<a>𝄞é</a>");
        assert_eq!(doc.position_at(3), Position::new(0, 3));
        assert_eq!(doc.position_at(7), Position::new(0, 5));
        assert_eq!(doc.position_at(9), Position::new(0, 6));
        // Inside the surrogate pair falls back to its start
        assert_eq!(doc.position_at(5), Position::new(0, 3));
    }

    #[test]
    fn test_offset_at_roundtrip() {
        let text = "<a>𝄞\n  <b é='1'/>\n</a>";
        let doc = TextDocument::new("file:///a.xml", 1, text);
        for (offset, _) in text.char_indices() {
            assert_eq!(doc.offset_at(doc.position_at(offset)), offset);
        }
    }

    #[test]
    fn test_offset_at_clamps() {
        let doc = TextDocument::new("file:///a.xml", 1, "ab\ncd");
        assert_eq!(doc.offset_at(Position::new(0, 10)), 2);
        assert_eq!(doc.offset_at(Position::new(7, 0)), 5);
    }

    #[test]
    fn test_line_text_strips_crlf() {
        let doc = TextDocument::new("file:///a.xml", 1, "<a>\r\n</a>");
        assert_eq!(doc.line_text(0), Some("<a>"));
        assert_eq!(doc.line_text(1), Some("</a>"));
        assert_eq!(doc.line_text(2), None);
    }

    #[test]
    fn test_with_text_keeps_uri() {
        let doc = TextDocument::new("file:///a.xml", 1, "<a/>");
        let next = doc.with_text(2, "<b/>");
        assert_eq!(next.uri(), "file:///a.xml");
        assert_eq!(next.version(), 2);
        assert_eq!(next.text(), "<b/>");
    }
}
