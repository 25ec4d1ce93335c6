//! Range edits expressed in LSP positions.

use lsp_types::{Position, Range};

use crate::LineIndex;

/// Replaces the text covered by `range` with `new_text`.
///
/// Positions are resolved leniently, matching how editors behave when the
/// server's view of a document lags behind:
///
/// - a column past the end of its line clamps to the line end;
/// - a column inside a surrogate pair snaps to the start of that character;
/// - a start line past the last line leaves `text` unchanged;
/// - an end line past the last line clamps to the end of the text;
/// - an end that precedes the start collapses to the start, so the edit
///   becomes an insertion.
#[must_use]
pub fn apply_range_edit(text: &str, range: Range, new_text: &str) -> String {
    let index = LineIndex::new(text);
    let Some(start) = resolve_position(text, &index, range.start) else {
        return String::from(text);
    };
    let end = resolve_position(text, &index, range.end)
        .unwrap_or(text.len())
        .max(start);

    let mut updated = String::with_capacity(text.len() - (end - start) + new_text.len());
    updated.push_str(text.get(..start).unwrap_or_default());
    updated.push_str(new_text);
    updated.push_str(text.get(end..).unwrap_or_default());
    updated
}

/// Byte offset of `position` in `text`, or `None` when its line is past the
/// last line. Columns are clamped as in [`apply_range_edit`].
#[must_use]
pub fn offset_at(text: &str, position: Position) -> Option<usize> {
    resolve_position(text, &LineIndex::new(text), position)
}

fn resolve_position(text: &str, index: &LineIndex, position: Position) -> Option<usize> {
    let line = usize::try_from(position.line).ok()?;
    let span = index.line_span(text, line)?;
    let line_content = text.get(span.clone())?;
    Some(span.start + utf16_column_to_byte(line_content, position.character))
}

fn utf16_column_to_byte(line_content: &str, column: u32) -> usize {
    let mut utf16_units = 0_u32;
    for (index, character) in line_content.char_indices() {
        let char_width = u32::try_from(character.len_utf16()).unwrap_or(u32::MAX);
        if utf16_units.saturating_add(char_width) > column {
            return index;
        }
        utf16_units += char_width;
    }
    line_content.len()
}
