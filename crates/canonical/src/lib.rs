//! Query normalization layer.
//!
//! Turns SQL text into a [`Source`]: the query with every literal replaced by
//! a positional parameter, plus the literals themselves. Queries that differ
//! only in constant values collapse onto one normalized text and one
//! [`CacheKey`], so a compiled-query cache can be shared between them.
//!
//! ## What we do
//!
//! - Ask a [`QueryParser`](parser::QueryParser) to normalize the text
//! - Resolve relative parameter ids and map tokens to wire types
//! - Build an immutable [`Source`] with memoized encoding and cache key
//! - Encode and decode sources in a stable binary format
//!
//! ## Invariants worth knowing
//!
//! - Constants are sorted by parameter id, with no duplicates
//! - Synthesized ids are always above `highest_extern_param_id`
//! - `Source::deserialize(&s.serialize())` equals `s`
//! - The cache key ignores literal values but not literal types
//!
//! ```rust
//! use canonical::{normalize, NormalizeConfig};
//! use parser::PostgresParser;
//!
//! let a = normalize(&PostgresParser, "SELECT * FROM t WHERE id = 5", &NormalizeConfig::default())?;
//! let b = normalize(&PostgresParser, "SELECT * FROM t WHERE id = 9", &NormalizeConfig::default())?;
//! assert_eq!(a.text(), "SELECT * FROM t WHERE id = $1");
//! assert_eq!(a.cache_key(), b.cache_key());
//! # Ok::<(), canonical::NormalizeError>(())
//! ```

mod codec;
mod config;
mod error;
mod extract;
mod hash;
mod literal;
mod pipeline;
mod source;

pub use crate::codec::{TAG_NORMALIZED, TAG_PLAIN};
pub use crate::config::{NormalizeConfig, DEFAULT_MAX_QUERY_BYTES};
pub use crate::error::{FormatError, InternalError, NormalizeError};
pub use crate::extract::{extract_constants, resolve_param_id};
pub use crate::hash::{CacheKey, CACHE_KEY_LEN};
pub use crate::literal::{oid, LiteralTokenKind};
pub use crate::pipeline::normalize;
pub use crate::source::{ExtractedConstant, NormalizedBody, Source, SourceBody};
