//! SQL parser adapter for query normalization.
//!
//! The normalization layer never looks at SQL grammar itself. It talks to a
//! parser through the two-operation [`QueryParser`] interface and consumes
//! plain data: a [`ParseError`] on failure, or a [`NormalizationResult`]
//! with the rewritten text and one [`LocationRecord`] per constant.
//!
//! ## What a parser provides
//!
//! - `parse`: syntax check, returning an opaque tree
//! - `normalize`: literal replacement plus constant locations
//! - `token_name`: the parser's own token-kind to name table
//!
//! [`PostgresParser`] is the shipped implementation, built on `sqlparser`'s
//! PostgreSQL dialect.
//!
//! ## Invariants worth knowing
//!
//! - Literal locations use relative ids: the k-th literal is `-k`
//! - Explicit parameters are reported with `length == -1` and no raw value
//! - Errors are reported once, with no retries

mod error;
mod location;
mod position;
mod postgres;
mod token;

pub use crate::error::ParseError;
pub use crate::location::{LocationRecord, NormalizationResult, ELIDED_LENGTH};
pub use crate::postgres::{ParsedQuery, PostgresParser, MAX_PARAM_ID};
pub use crate::token::{token_name, LexToken};

/// Narrow interface to an external SQL parser.
pub trait QueryParser: Send + Sync {
    /// Parse tree produced by [`QueryParser::parse`]; opaque to this crate's
    /// consumers.
    type Tree;

    /// Check the syntax of `text`.
    fn parse(&self, text: &str) -> Result<Self::Tree, ParseError>;

    /// Replace literal constants with positional parameters and report where
    /// each one was found.
    fn normalize(&self, text: &str) -> Result<NormalizationResult, ParseError>;

    /// Grammar name for a token code found in a [`LocationRecord`].
    fn token_name(&self, kind: i32) -> Option<&'static str>;
}
