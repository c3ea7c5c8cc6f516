//! # Coordinate Index
//!
//! Offset <-> line/column conversion for one immutable source text.
//!
//! ## Key Invariants
//!
//! 1. `line_starts` is strictly increasing and always begins with `0`.
//! 2. Lines are 1-based, columns are 0-based and counted in `char`s.
//! 3. The index is never mutated after construction.

use serde::{Deserialize, Serialize};

/// Half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Range { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Moves the range back by `delta` (a generated-minus-original distance).
    pub fn shifted(&self, delta: isize) -> Range {
        Range {
            start: (self.start as isize - delta) as usize,
            end: (self.end as isize - delta) as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone)]
pub struct CoordinateIndex {
    text: String,
    line_starts: Vec<usize>,
}

impl CoordinateIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        CoordinateIndex {
            text: text.to_string(),
            line_starts,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Offsets past the end clamp to the last position.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let line_start = self.line_starts[line];
        let column = self
            .text
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - line_start);
        Position {
            line: line + 1,
            column,
        }
    }

    pub fn location(&self, range: Range) -> SourceLocation {
        SourceLocation {
            start: self.position(range.start),
            end: self.position(range.end),
        }
    }

    pub fn offset(&self, position: Position) -> Option<usize> {
        let line_start = *self.line_starts.get(position.line.checked_sub(1)?)?;
        let line_end = self
            .line_starts
            .get(position.line)
            .copied()
            .unwrap_or(self.text.len());
        let line_text = &self.text[line_start..line_end];
        if position.column == 0 {
            return Some(line_start);
        }
        line_text
            .char_indices()
            .nth(position.column)
            .map(|(i, _)| line_start + i)
            .or_else(|| {
                (line_text.chars().count() == position.column).then_some(line_end)
            })
    }

    pub fn slice(&self, range: Range) -> &str {
        self.text.get(range.start..range.end).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_of_offsets() {
        let index = CoordinateIndex::new("ab\ncd\n\nef");
        assert_eq!(index.position(0), Position { line: 1, column: 0 });
        assert_eq!(index.position(2), Position { line: 1, column: 2 });
        assert_eq!(index.position(3), Position { line: 2, column: 0 });
        assert_eq!(index.position(6), Position { line: 3, column: 0 });
        assert_eq!(index.position(8), Position { line: 4, column: 1 });
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn test_offset_round_trip() {
        let text = "let a = 1;\n  let b = 'é';\nfoo()";
        let index = CoordinateIndex::new(text);
        for (offset, _) in text.char_indices() {
            let pos = index.position(offset);
            assert_eq!(index.offset(pos), Some(offset), "offset {offset} via {pos:?}");
        }
        assert_eq!(index.offset(Position { line: 9, column: 0 }), None);
    }

    #[test]
    fn test_columns_count_chars() {
        let index = CoordinateIndex::new("'é' + x");
        assert_eq!(index.position(5).column, 4, "é is one column");
    }

    #[test]
    fn test_shifted_range() {
        assert_eq!(Range::new(10, 14).shifted(6), Range::new(4, 8));
        assert_eq!(Range::new(4, 8).shifted(-6), Range::new(10, 14));
    }
}
