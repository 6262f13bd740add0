//! Source code representation, source positions and the error taxonomy.

mod error;

pub use error::{Abort, EvalError, LexicalError, RuntimeError, SyntaxError};

use std::fmt;

/// A 1-based line/column pair.
/// `Position::NONE` (`0:0`) marks nodes synthesized without a source token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const NONE: Position = Position { line: 0, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Returns `true` if this position does not point into the source.
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Represents source code.
pub struct Source<'a> {
    /// Original source code.
    pub content: &'a str,
}

impl<'a> Source<'a> {
    /// Create a new `Source` with the specified `content`.
    pub fn new(content: &'a str) -> Self {
        Self { content }
    }

    /// Returns the 1-based line `line`, without its terminator.
    pub fn line(&self, line: usize) -> Option<&'a str> {
        if line == 0 {
            return None;
        }
        self.content
            .split('\n')
            .nth(line - 1)
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
    }

    /// Renders the line containing `position` with a caret under its column.
    /// Returns `None` for positions outside the source (including EOF's column `0`).
    pub fn excerpt(&self, position: Position) -> Option<String> {
        let text = self.line(position.line)?;
        if position.column == 0 {
            return None;
        }
        let gutter = position.line.to_string();
        let padding: String = text
            .chars()
            .take(position.column - 1)
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        Some(format!(
            "{gutter} | {text}\n{blank} | {padding}^",
            gutter = gutter,
            text = text,
            blank = " ".repeat(gutter.len()),
            padding = padding,
        ))
    }
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(content: &'a str) -> Self {
        Source::new(content)
    }
}
