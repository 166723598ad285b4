//! Source positions shared by every layer of the mapper.
//!
//! Byte offsets are the currency inside the engine (grammar spans, rewrite
//! ranges). Line/column pairs are what crosses the wire to the client and the
//! engine. [`LineIndex`] converts between the two for one specific text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open byte range `[start, end)` in one specific text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// An empty span sitting at `offset`.
    pub fn at(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A 1-based line/column position. Columns count characters, not bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
}

impl LineCol {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for LineCol {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Offset ⇄ line/column conversion over one text.
///
/// Out-of-range inputs are clamped to the nearest position in the text.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self { text, line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Converts a byte offset to a 1-based line/column.
    pub fn line_col(&self, offset: usize) -> LineCol {
        let offset = self.floor_char_boundary(offset.min(self.text.len()));
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let column = self.text[self.line_starts[line]..offset].chars().count() + 1;
        LineCol { line: line + 1, column }
    }

    /// Converts a 1-based line/column back to a byte offset.
    pub fn offset(&self, position: LineCol) -> usize {
        let line = position.line.max(1);
        let Some(&line_start) = self.line_starts.get(line - 1) else {
            return self.text.len();
        };
        let line_end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let line_text = &self.text[line_start..line_end];
        let skip = position.column.max(1) - 1;
        line_text
            .char_indices()
            .nth(skip)
            .map(|(i, _)| line_start + i)
            .unwrap_or(line_end)
    }

    fn floor_char_boundary(&self, mut offset: usize) -> usize {
        while offset > 0 && !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_round_trips_on_multiline_text() {
        let text = "int x;\nbool y = true;\n\nclock c;";
        let index = LineIndex::new(text);
        for offset in 0..=text.len() {
            let lc = index.line_col(offset);
            assert_eq!(index.offset(lc), offset, "offset {offset} via {lc}");
        }
        assert_eq!(index.line_col(7), LineCol::new(2, 1));
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn columns_count_characters() {
        let text = "x = \"äö\"; y";
        let index = LineIndex::new(text);
        let y = text.find('y').unwrap();
        assert_eq!(index.line_col(y).column, 11);
    }

    #[test]
    fn out_of_range_positions_clamp() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.offset(LineCol::new(1, 10)), 2);
        assert_eq!(index.offset(LineCol::new(9, 1)), 5);
        assert_eq!(index.line_col(99), LineCol::new(2, 3));
    }

    #[test]
    fn span_cover_and_len() {
        let a = Span::new(2, 5);
        let b = Span::new(4, 9);
        assert_eq!(a.cover(b), Span::new(2, 9));
        assert_eq!(a.len(), 3);
        assert!(Span::at(3).is_empty());
    }
}
