use serde::{Deserialize, Serialize};

/// Length value marking a location that carries no usable constant.
pub const ELIDED_LENGTH: i32 = -1;

/// One location reported by the normalizer.
///
/// Literal locations carry a negative, relative `param_id` (`-k` for the k-th
/// literal replaced in the text) and the literal's raw source bytes. Explicit
/// parameters keep their absolute id and are reported with
/// [`ELIDED_LENGTH`] and no raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Byte offset in the original text.
    pub location: i32,
    /// Byte length in the original text, or [`ELIDED_LENGTH`].
    pub length: i32,
    pub param_id: i32,
    /// Token code, see [`LexToken`](crate::LexToken).
    pub token_kind: i32,
    pub raw_value: Option<Vec<u8>>,
}

impl LocationRecord {
    pub fn is_elided(&self) -> bool {
        self.length == ELIDED_LENGTH
    }
}

/// Output of [`QueryParser::normalize`](crate::QueryParser::normalize).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationResult {
    /// Query text with every literal replaced by a `$N` placeholder.
    pub normalized_text: String,
    /// Largest explicit `$N` in the original text, `0` if there is none.
    pub highest_extern_param_id: i32,
    /// Locations in source order.
    pub locations: Vec<LocationRecord>,
}
