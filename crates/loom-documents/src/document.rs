//! A snapshot of one open document.

use crate::LineIndex;

/// Text and version of an open document, together with its line index.
///
/// The line index is rebuilt whenever the text changes, so
/// [`Document::line`] always reflects [`Document::text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    uri: String,
    text: String,
    version: i32,
    lines: LineIndex,
}

impl Document {
    /// Creates a document from its full text.
    #[must_use]
    pub fn new(uri: impl Into<String>, text: impl Into<String>, version: i32) -> Self {
        let content: String = text.into();
        let lines = LineIndex::new(&content);
        Self {
            uri: uri.into(),
            text: content,
            version,
            lines,
        }
    }

    /// Document URI as sent by the client.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Current full text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Version of the text, as assigned by the client.
    #[must_use]
    pub const fn version(&self) -> i32 {
        self.version
    }

    /// Line boundaries of the current text.
    #[must_use]
    pub const fn lines(&self) -> &LineIndex {
        &self.lines
    }

    /// Number of lines; never zero.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.line_count()
    }

    /// Content of line `line` without its `\n` terminator.
    #[must_use]
    pub fn line(&self, line: usize) -> Option<&str> {
        let span = self.lines.line_span(&self.text, line)?;
        self.text.get(span)
    }

    /// Replaces the text and version of this snapshot.
    pub fn replace(&mut self, text: impl Into<String>, version: i32) {
        self.text = text.into();
        self.lines = LineIndex::new(&self.text);
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn splits_lines_on_newline() {
        let document = Document::new("file:///a.loom", "x = 1\ny = 2", 1);

        assert_eq!(document.line_count(), 2);
        assert_eq!(document.line(0), Some("x = 1"));
        assert_eq!(document.line(1), Some("y = 2"));
        assert_eq!(document.line(2), None);
    }

    #[rstest]
    fn replace_rebuilds_line_index() {
        let mut document = Document::new("file:///a.loom", "one", 1);
        document.replace("one\ntwo\nthree", 2);

        assert_eq!(document.version(), 2);
        assert_eq!(document.line_count(), 3);
        assert_eq!(document.line(2), Some("three"));
    }
}
