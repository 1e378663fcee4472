//! Error types produced by the canonical crate.
//!
//! | Error | Category | Description |
//! |-------|----------|-------------|
//! | [`NormalizeError::Syntax`] | Input | Parser rejected the query |
//! | [`NormalizeError::QueryTooLarge`] | Input | Size limit exceeded |
//! | [`NormalizeError::InvalidConfig`] | Setup | Bad [`NormalizeConfig`](crate::NormalizeConfig) |
//! | [`NormalizeError::Internal`] | Bug | Parser and literal table disagree, or a field cannot be encoded |
//! | [`FormatError`] | Input | Bytes are not a valid `Source` encoding |
//!
//! Internal errors mean this crate and the parser's token set have diverged.
//! They are never retried and never degrade into a partial result.
use parser::ParseError;
use thiserror::Error;

/// Consistency failures between the parser's output and this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error("token kind {0} has no name in the parser's token table")]
    UnknownTokenKind(i32),
    #[error("token `{0}` has no entry in the literal type table")]
    UnmappedLiteral(String),
    #[error("parameter id {0} appears more than once")]
    DuplicateParamId(i32),
    #[error("highest explicit parameter id must be >= 0, got {0}")]
    NegativeParamBase(i32),
    #[error("{field} of {len} bytes does not fit an i32 length prefix")]
    FieldTooLong { field: &'static str, len: usize },
}

/// Errors that can occur while normalizing a query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NormalizeError {
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("query of {len} bytes exceeds limit of {limit}")]
    QueryTooLarge { len: usize, limit: usize },

    #[error("internal consistency error: {0}")]
    Internal(#[from] InternalError),
}

impl NormalizeError {
    /// Returns true if the caller's input (not this crate) is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NormalizeError::Syntax(_) | NormalizeError::QueryTooLarge { .. }
        )
    }
}

/// Errors that can occur while decoding a serialized `Source`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("cannot deserialize Source from empty input")]
    Empty,

    #[error("invalid Source serialization tag: {0}")]
    InvalidTag(u8),

    /// Body does not match the layout announced by its tag. `class` is
    /// `"Source"` or `"NormalizedSource"`.
    #[error("malformed {class} serialization: {reason}")]
    Malformed { class: &'static str, reason: String },
}
