//! Line boundaries derived from document text.

use std::ops::Range;

/// Byte offsets at which each line of a text starts.
///
/// Lines are separated by `\n` only; a `\r` before it stays part of the line.
/// An index always holds at least one line, so the empty text has one empty
/// line and a trailing newline opens a final empty line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    /// Builds the index for `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(index, _)| index + 1));
        Self { starts }
    }

    /// Number of lines in the indexed text.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Byte offset of the first character of `line`.
    #[must_use]
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.starts.get(line).copied()
    }

    /// Byte range of `line` within `text`, excluding its terminator.
    ///
    /// `text` must be the text this index was built from.
    #[must_use]
    pub fn line_span(&self, text: &str, line: usize) -> Option<Range<usize>> {
        let start = self.line_start(line)?;
        let end = self
            .line_start(line + 1)
            .map_or(text.len(), |next| next.saturating_sub(1));
        Some(start..end)
    }
}
