//! Source file and span utilities

use crate::diagnostics::Span;
use std::path::{Path, PathBuf};

/// A source file with its content and line start table
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    content: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Create a new source file
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let content = content.into();
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            path: path.into(),
            content,
            line_starts,
        }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the file content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Create a span for a byte range
    pub fn span(&self, start: usize, end: usize) -> Span {
        let (start_line, start_col) = self.line_col(start);
        let (end_line, end_col) = self.line_col(end);

        Span {
            file: self.path.clone(),
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Span covering the end of the input
    pub fn eof_span(&self) -> Span {
        self.span(self.content.len(), self.content.len())
    }

    /// Convert a byte offset to line and column (1-indexed, column in chars)
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        let col = self
            .content
            .get(line_start..offset.min(self.content.len()))
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start);
        (line + 1, col + 1)
    }

    /// Get a line by number (1-indexed)
    pub fn get_line(&self, line: usize) -> Option<&str> {
        if line == 0 || line > self.line_starts.len() {
            return None;
        }

        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .map(|&e| e.saturating_sub(1))
            .unwrap_or(self.content.len());

        self.content.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_counts_chars() {
        let file = SourceFile::new("t.omn", "let a = 1\nprint(\"é\" + b)\n");
        // `b` sits after a two-byte character on line 2
        let offset = file.content().find('b').unwrap_or_default();
        assert_eq!(file.line_col(offset), (2, 13));
        assert_eq!(file.line_col(0), (1, 1));
    }

    #[test]
    fn test_get_line() {
        let file = SourceFile::new("t.omn", "first\nsecond\nthird");
        assert_eq!(file.get_line(2), Some("second"));
        assert_eq!(file.get_line(3), Some("third"));
        assert_eq!(file.get_line(4), None);
        assert_eq!(file.get_line(0), None);
    }

    #[test]
    fn test_eof_span() {
        let file = SourceFile::new("t.omn", "a\nbc");
        let span = file.eof_span();
        assert_eq!(span.start, 4);
        assert_eq!((span.start_line, span.start_col), (2, 3));
    }
}
