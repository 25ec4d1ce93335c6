//! Front end used until a language is plugged in.
//!
//! It knows nothing about any grammar beyond bracket pairing, which is enough
//! to exercise diagnostics publication end to end.

use lsp_types::{Position, Range};

use crate::frontend::{Frontend, SourceError};

const FRONTEND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::frontend::placeholder");

/// Reports unbalanced `()`, `[]` and `{}` as syntax errors.
///
/// String literals and comments are not recognised, so brackets inside them
/// count too.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderFrontend;

impl Frontend for PlaceholderFrontend {
    type Module = ();
    type Scopes = ();
    type Symbols = ();

    fn parse(&self, text: &str) -> (Self::Module, Vec<SourceError>) {
        let errors = bracket_errors(text);
        tracing::debug!(
            target: FRONTEND_TARGET,
            errors = errors.len(),
            "checked bracket balance"
        );
        ((), errors)
    }

    fn build_scopes(&self, _module: &Self::Module) -> Self::Scopes {}

    fn resolve(
        &self,
        _module: &Self::Module,
        _scopes: &Self::Scopes,
    ) -> (Vec<SourceError>, Self::Symbols) {
        (Vec::new(), ())
    }
}

const fn closer_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

fn bracket_errors(text: &str) -> Vec<SourceError> {
    let mut errors = Vec::new();
    let mut open: Vec<(char, Position)> = Vec::new();

    for (line_index, line) in text.split('\n').enumerate() {
        let line_number = u32::try_from(line_index).unwrap_or(u32::MAX);
        let mut column = 0_u32;
        for character in line.chars() {
            let width = u32::try_from(character.len_utf16()).unwrap_or(1);
            let position = Position::new(line_number, column);
            if closer_for(character).is_some() {
                open.push((character, position));
            } else if matches!(character, ')' | ']' | '}') {
                let expected = open.last().and_then(|(opener, _)| closer_for(*opener));
                if expected == Some(character) {
                    open.pop();
                } else {
                    errors.push(SourceError::new(
                        char_range(position, width),
                        format!("unmatched '{character}'"),
                    ));
                }
            }
            column = column.saturating_add(width);
        }
    }

    errors.extend(open.into_iter().map(|(opener, position)| {
        SourceError::new(char_range(position, 1), format!("unclosed '{opener}'"))
    }));
    errors.sort_by_key(|error| (error.range.start.line, error.range.start.character));
    errors
}

const fn char_range(start: Position, width: u32) -> Range {
    Range {
        start,
        end: Position {
            line: start.line,
            character: start.character.saturating_add(width),
        },
    }
}
