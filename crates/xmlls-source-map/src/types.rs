//! Core position and range types

use serde::{Deserialize, Serialize};

/// A location in source text (0-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Byte offset from start of source
    pub offset: usize,
    /// Row number (0-indexed)
    pub row: usize,
    /// Column number (0-indexed, in bytes from the start of the row)
    pub column: usize,
}

/// A range in source text from start to end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Start location (inclusive)
    pub start: Location,
    /// End location (exclusive)
    pub end: Location,
}

/// A half-open `[start, end)` range of byte offsets into a text snapshot.
///
/// Spans are the currency of the parse tree: every node and attribute
/// stores them, and diagnostics carry one to point back into the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span. `start` must not exceed `end`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} after end {end}");
        Span { start, end }
    }

    /// A zero-length span at `offset`.
    pub fn empty_at(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Half-open containment: `start <= offset < end`.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Closed containment: `start <= offset <= end`.
    ///
    /// Used for cursor positions, where a caret sitting right after the last
    /// character still "touches" the span.
    pub fn touches(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// Whether `other` lies entirely within this span.
    pub fn encloses(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersects(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Slice `text` at this span, returning `""` when the span is out of
    /// bounds or not on character boundaries.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start..self.end).unwrap_or_default()
    }
}

/// An editor-facing position: 0-based line and UTF-16 character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A range of editor-facing positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PositionRange {
    pub start: Position,
    pub end: Position,
}

impl PositionRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// The `(0,0)-(0,0)` range used when nothing better is known.
    pub fn zero() -> Self {
        Self::default()
    }
}
