//! Configuration for the normalization pipeline.
//!
//! # Examples
//!
//! ```rust
//! use canonical::NormalizeConfig;
//!
//! let config = NormalizeConfig::default();
//! assert!(config.normalize_literals);
//! assert!(config.verify_normalized);
//! assert_eq!(config.max_query_bytes, Some(1 << 20));
//! config.validate().unwrap();
//! ```
//!
//! Keep queries exactly as written (still syntax-checked):
//!
//! ```rust
//! use canonical::NormalizeConfig;
//!
//! let config = NormalizeConfig {
//!     normalize_literals: false,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;

/// Default limit on query text size: 1 MiB.
pub const DEFAULT_MAX_QUERY_BYTES: usize = 1 << 20;

/// Configuration for [`normalize`](crate::normalize).
///
/// ```json
/// {
///   "normalize_literals": true,
///   "verify_normalized": true,
///   "max_query_bytes": 1048576
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NormalizeConfig {
    /// If true, replace literals with parameters. If false, the query is
    /// syntax-checked and returned as a plain source.
    pub normalize_literals: bool,

    /// If true, re-parse the normalized text. When it no longer parses but
    /// the original does, the original is returned as a plain source.
    ///
    /// Some constant slots only take literals, e.g. a function body written
    /// as `AS 'SELECT 1'` cannot become `AS $1`.
    pub verify_normalized: bool,

    /// Reject queries longer than this many bytes. `None` disables the check;
    /// `Some(0)` is invalid.
    pub max_query_bytes: Option<usize>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            normalize_literals: true,
            verify_normalized: true,
            max_query_bytes: Some(DEFAULT_MAX_QUERY_BYTES),
        }
    }
}

impl NormalizeConfig {
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.max_query_bytes == Some(0) {
            return Err(NormalizeError::InvalidConfig(
                "max_query_bytes must be > 0 when set".into(),
            ));
        }
        // Length prefixes in the binary encoding are i32.
        if let Some(limit) = self.max_query_bytes {
            if limit > i32::MAX as usize {
                return Err(NormalizeError::InvalidConfig(format!(
                    "max_query_bytes must be <= {}, got {limit}",
                    i32::MAX
                )));
            }
        }
        Ok(())
    }
}
