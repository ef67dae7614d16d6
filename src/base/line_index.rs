//! Byte offset to line/column conversion.
//!
//! XML diagnostics carry the (line, column) of the failure; the reader
//! only knows byte offsets, so each loaded document builds a line index
//! once and converts on demand.

/// A 1-indexed line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
}

/// Sorted newline offsets of one document.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first character of each line.
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &[u8]) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.iter().enumerate() {
            if *b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-indexed line/column pair. Offsets
    /// past the end of the document map to the last line.
    pub fn line_col(&self, offset: usize) -> LineCol {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        LineCol {
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        let index = LineIndex::new(b"abc\ndef\n");
        assert_eq!(index.line_col(0), LineCol { line: 1, column: 1 });
        assert_eq!(index.line_col(2), LineCol { line: 1, column: 3 });
    }

    #[test]
    fn test_line_boundaries() {
        let index = LineIndex::new(b"abc\ndef\n");
        assert_eq!(index.line_col(3), LineCol { line: 1, column: 4 });
        assert_eq!(index.line_col(4), LineCol { line: 2, column: 1 });
        assert_eq!(index.line_col(7), LineCol { line: 2, column: 4 });
    }

    #[test]
    fn test_empty_document() {
        let index = LineIndex::new(b"");
        assert_eq!(index.line_col(0), LineCol { line: 1, column: 1 });
    }
}
