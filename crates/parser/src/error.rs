use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Syntax error reported by the SQL parser.
///
/// Positions follow PostgreSQL conventions: `line` is 1-based and
/// `cursor_position` is the 1-based character offset into the query text.
/// Both are `0` when the parser could not attribute the error to a location
/// (for example, an unexpected end of input).
///
/// # Example
///
/// ```rust
/// use parser::ParseError;
///
/// let err = ParseError::new("unterminated string literal", 1, 8);
/// assert!(err.has_position());
/// assert_eq!(err.to_string(), "unterminated string literal (line 1, position 8)");
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (line {line}, position {cursor_position})")]
pub struct ParseError {
    /// Parser message without the trailing location suffix.
    pub message: String,
    /// 1-based line of the offending token, `0` if unknown.
    pub line: u32,
    /// 1-based character offset of the offending token, `0` if unknown.
    pub cursor_position: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: u32, cursor_position: u32) -> Self {
        Self {
            message: message.into(),
            line,
            cursor_position,
        }
    }

    /// Error without position information.
    pub fn unpositioned(message: impl Into<String>) -> Self {
        Self::new(message, 0, 0)
    }

    /// Returns true if the parser attributed the error to a location.
    pub fn has_position(&self) -> bool {
        self.line > 0 && self.cursor_position > 0
    }
}
