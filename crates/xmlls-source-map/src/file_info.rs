//! Line-break index for location lookups

use crate::types::Location;
use serde::{Deserialize, Serialize};

/// Line-break index over a text snapshot
///
/// Stores the byte offset of every `\n` so that offset → (row, column)
/// and (row, column) → offset conversions run in O(log n) and O(1)
/// without rescanning the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInformation {
    /// Offset of every `\n`, ascending
    line_breaks: Vec<usize>,
    total_length: usize,
}

impl FileInformation {
    /// Index the line breaks of `content`.
    ///
    ///
    /// ```
    /// use xmlls_source_map::FileInformation;
    ///
    /// let info = FileInformation::new("<a>\n</a>");
    /// assert_eq!(info.line_count(), 2);
    /// ```
    pub fn new(content: &str) -> Self {
        Self {
            line_breaks: content.match_indices('\n').map(|(at, _)| at).collect(),
            total_length: content.len(),
        }
    }

    /// Row and byte column of `offset`, or `None` past the end of the text.
    ///
    /// ```
    /// use xmlls_source_map::FileInformation;
    ///
    /// let info = FileInformation::new("hello\nworld");
    /// let loc = info.offset_to_location(6).unwrap();
    /// assert_eq!(loc.row, 1);
    /// assert_eq!(loc.column, 0);
    /// ```
    pub fn offset_to_location(&self, offset: usize) -> Option<Location> {
        if offset > self.total_length {
            return None;
        }

        // A newline belongs to the line it terminates
        let row = match self.line_breaks.binary_search(&offset) {
            Ok(idx) | Err(idx) => idx,
        };
        let column = offset - self.line_start_unchecked(row);

        Some(Location {
            offset,
            row,
            column,
        })
    }

    /// Convert a (row, byte column) pair to an offset
    ///
    /// Returns None if the row does not exist or the column runs past the
    /// end of the row.
    pub fn location_to_offset(&self, row: usize, column: usize) -> Option<usize> {
        let start = self.line_start(row)?;
        let end = self.line_end(row)?;
        let offset = start + column;
        (offset <= end).then_some(offset)
    }

    /// Byte offset at which `row` begins.
    pub fn line_start(&self, row: usize) -> Option<usize> {
        (row < self.line_count()).then(|| self.line_start_unchecked(row))
    }

    /// Byte offset of the end of `row`, excluding its line terminator.
    pub fn line_end(&self, row: usize) -> Option<usize> {
        if row >= self.line_count() {
            return None;
        }
        Some(
            self.line_breaks
                .get(row)
                .copied()
                .unwrap_or(self.total_length),
        )
    }

    fn line_start_unchecked(&self, row: usize) -> usize {
        if row == 0 {
            0
        } else {
            self.line_breaks[row - 1] + 1
        }
    }

    /// Length of the indexed text in bytes.
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Lines in the text; a trailing newline starts an empty last line.
    pub fn line_count(&self) -> usize {
        self.line_breaks.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_one_line() {
        let info = FileInformation::new("");
        assert_eq!((info.total_length(), info.line_count()), (0, 1));
        let loc = info.offset_to_location(0).unwrap();
        assert_eq!((loc.row, loc.column), (0, 0));
    }

    #[test]
    fn test_multiple_lines() {
        let content = "line 1\nline 2\nline 3";
        let info = FileInformation::new(content);
        assert_eq!(info.line_count(), 3);

        // At first newline (offset 6 is '\n')
        let loc = info.offset_to_location(6).unwrap();
        assert_eq!(loc.row, 0);
        assert_eq!(loc.column, 6);

        // Start of second line
        let loc = info.offset_to_location(7).unwrap();
        assert_eq!(loc.row, 1);
        assert_eq!(loc.column, 0);

        // End of file
        let loc = info.offset_to_location(20).unwrap();
        assert_eq!(loc.row, 2);
        assert_eq!(loc.column, 6);
    }

    #[test]
    fn test_out_of_bounds() {
        let info = FileInformation::new("hello");
        assert!(info.offset_to_location(100).is_none());
        assert!(info.location_to_offset(1, 0).is_none());
        assert!(info.location_to_offset(0, 6).is_none());
    }

    #[test]
    fn test_location_to_offset_roundtrip() {
        let content = "<a>\n  <b/>\n</a>";
        let info = FileInformation::new(content);
        for offset in 0..=content.len() {
            let loc = info.offset_to_location(offset).unwrap();
            assert_eq!(info.location_to_offset(loc.row, loc.column), Some(offset));
        }
    }

    #[test]
    fn test_line_bounds() {
        let info = FileInformation::new("ab\ncde\n");
        assert_eq!(info.line_start(1), Some(3));
        assert_eq!(info.line_end(1), Some(6));
        assert_eq!(info.line_start(2), Some(7));
        assert_eq!(info.line_end(2), Some(7));
        assert_eq!(info.line_start(3), None);
    }

    #[test]
    fn test_columns_count_bytes() {
        let info = FileInformation::new("<é>\n<ö/>");
        let loc = info.offset_to_location(4).unwrap();
        assert_eq!((loc.row, loc.column), (0, 4));
        let loc = info.offset_to_location(5).unwrap();
        assert_eq!((loc.row, loc.column), (1, 0));
    }
}
