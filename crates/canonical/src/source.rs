//! The `Source` value type.
//!
//! A [`Source`] is either plain query text or a normalized query carrying the
//! constants extracted from it:
//!
//! ```text
//! Source
//! ├── body: SourceBody
//! │   ├── Plain { text }                          # tag 0
//! │   └── Normalized(NormalizedBody)              # tag 1
//! │       ├── text: String                        # normalized text
//! │       ├── original_text: String               # input before normalization
//! │       ├── highest_extern_param_id: i32        # largest explicit $N
//! │       └── extracted_constants: Vec<...>       # sorted by param_id
//! ├── serialized: OnceLock<Bytes>                 # memoized encoding
//! └── cache_key: OnceLock<CacheKey>               # memoized digest
//! ```
//!
//! Values are immutable once built. The two memo cells are filled on first
//! use; both computations are deterministic, so concurrent first calls can
//! only ever agree on the stored value.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::{self, TAG_NORMALIZED, TAG_PLAIN};
use crate::error::{FormatError, InternalError};
use crate::hash::{self, CacheKey};
use crate::literal::LiteralTokenKind;

/// One literal lifted out of the query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedConstant {
    /// Absolute parameter id the literal was replaced with.
    pub param_id: i32,
    pub token_kind: LiteralTokenKind,
    /// Literal exactly as written in the original text (quotes included).
    pub raw_value: Vec<u8>,
}

impl ExtractedConstant {
    pub fn new(param_id: i32, token_kind: LiteralTokenKind, raw_value: impl Into<Vec<u8>>) -> Self {
        Self {
            param_id,
            token_kind,
            raw_value: raw_value.into(),
        }
    }

    pub fn type_oid(&self) -> u32 {
        self.token_kind.type_oid()
    }
}

/// Fields of a normalized source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBody {
    pub(crate) text: String,
    pub(crate) original_text: String,
    pub(crate) highest_extern_param_id: i32,
    pub(crate) extracted_constants: Vec<ExtractedConstant>,
}

/// Logical content of a [`Source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceBody {
    Plain { text: String },
    Normalized(NormalizedBody),
}

impl SourceBody {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            SourceBody::Plain { .. } => TAG_PLAIN,
            SourceBody::Normalized(_) => TAG_NORMALIZED,
        }
    }

    pub(crate) fn text(&self) -> &str {
        match self {
            SourceBody::Plain { text } => text,
            SourceBody::Normalized(body) => &body.text,
        }
    }

    pub(crate) fn constants(&self) -> &[ExtractedConstant] {
        match self {
            SourceBody::Plain { .. } => &[],
            SourceBody::Normalized(body) => &body.extracted_constants,
        }
    }
}

/// Query text plus, when normalized, the constants extracted from it.
///
/// Equality compares logical content only; memoized fields are ignored.
///
/// # Example
///
/// ```rust
/// use canonical::{ExtractedConstant, LiteralTokenKind, Source};
///
/// let source = Source::normalized(
///     "SELECT $1",
///     "SELECT 42",
///     0,
///     vec![ExtractedConstant::new(1, LiteralTokenKind::Integer, "42")],
/// )
/// .unwrap();
///
/// let bytes = source.serialize();
/// let restored = Source::deserialize(&bytes).unwrap();
/// assert_eq!(restored, source);
/// assert_eq!(restored.cache_key(), source.cache_key());
/// ```
#[derive(Debug, Clone)]
pub struct Source {
    body: SourceBody,
    serialized: OnceLock<Bytes>,
    cache_key: OnceLock<CacheKey>,
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}

impl Eq for Source {}

impl Source {
    fn from_body(body: SourceBody) -> Self {
        Self {
            body,
            serialized: OnceLock::new(),
            cache_key: OnceLock::new(),
        }
    }

    /// Plain source wrapping `text` verbatim.
    ///
    /// Fails only if `text` is too long for the wire format.
    pub fn from_string(text: impl Into<String>) -> Result<Self, InternalError> {
        let text = text.into();
        check_field_len("text", text.len())?;
        Ok(Self::from_body(SourceBody::Plain { text }))
    }

    /// Normalized source. Constants are sorted by `param_id` here, once.
    ///
    /// Fails if two constants share a parameter id, if
    /// `highest_extern_param_id` is negative, or if any field is too long for
    /// the wire format.
    pub fn normalized(
        text: impl Into<String>,
        original_text: impl Into<String>,
        highest_extern_param_id: i32,
        mut extracted_constants: Vec<ExtractedConstant>,
    ) -> Result<Self, InternalError> {
        if highest_extern_param_id < 0 {
            return Err(InternalError::NegativeParamBase(highest_extern_param_id));
        }
        let text = text.into();
        let original_text = original_text.into();
        check_field_len("text", text.len())?;
        check_field_len("original_text", original_text.len())?;
        check_field_len("extracted_constants", extracted_constants.len())?;
        for constant in &extracted_constants {
            check_field_len("raw_value", constant.raw_value.len())?;
        }
        extracted_constants.sort_by_key(|c| c.param_id);
        if let Some(pair) = extracted_constants
            .windows(2)
            .find(|pair| pair[0].param_id == pair[1].param_id)
        {
            return Err(InternalError::DuplicateParamId(pair[0].param_id));
        }

        Ok(Self::from_body(SourceBody::Normalized(NormalizedBody {
            text,
            original_text,
            highest_extern_param_id,
            extracted_constants,
        })))
    }

    /// Decode a value produced by [`Source::serialize`].
    ///
    /// The input becomes the memoized encoding of the returned value.
    pub fn deserialize(data: &[u8]) -> Result<Self, FormatError> {
        let body = codec::decode(data)?;
        let source = Self::from_body(body);
        let _ = source.serialized.set(Bytes::copy_from_slice(data));
        Ok(source)
    }

    pub fn body(&self) -> &SourceBody {
        &self.body
    }

    pub fn tag(&self) -> u8 {
        self.body.tag()
    }

    pub fn is_normalized(&self) -> bool {
        matches!(self.body, SourceBody::Normalized(_))
    }

    /// Text this value represents: the raw input for a plain source, the
    /// normalized text otherwise.
    pub fn text(&self) -> &str {
        self.body.text()
    }

    /// Input text before normalization. Same as [`text`](Self::text) for a
    /// plain source.
    pub fn original_text(&self) -> &str {
        match &self.body {
            SourceBody::Plain { text } => text,
            SourceBody::Normalized(body) => &body.original_text,
        }
    }

    /// Largest explicit parameter id, `None` for a plain source.
    pub fn highest_extern_param_id(&self) -> Option<i32> {
        match &self.body {
            SourceBody::Plain { .. } => None,
            SourceBody::Normalized(body) => Some(body.highest_extern_param_id),
        }
    }

    /// Extracted constants, ascending by `param_id`.
    pub fn extracted_constants(&self) -> &[ExtractedConstant] {
        self.body.constants()
    }

    /// Offset of the first synthesized parameter, if any were synthesized.
    pub fn first_extra(&self) -> Option<i32> {
        match &self.body {
            SourceBody::Normalized(body) if !body.extracted_constants.is_empty() => {
                Some(body.highest_extern_param_id)
            }
            _ => None,
        }
    }

    pub fn extra_counts(&self) -> Vec<usize> {
        match self.extracted_constants().len() {
            0 => Vec::new(),
            n => vec![n],
        }
    }

    /// Raw values packed as one blob of length-prefixed byte strings.
    pub fn extra_blobs(&self) -> Vec<Bytes> {
        let constants = self.extracted_constants();
        if constants.is_empty() {
            return Vec::new();
        }
        let capacity = constants.iter().map(|c| 4 + c.raw_value.len()).sum();
        let mut blob = BytesMut::with_capacity(capacity);
        for constant in constants {
            codec::put_len_prefixed(&mut blob, &constant.raw_value);
        }
        vec![blob.freeze()]
    }

    pub fn extra_type_oids(&self) -> Vec<u32> {
        self.extracted_constants()
            .iter()
            .map(ExtractedConstant::type_oid)
            .collect()
    }

    /// Raw values are always the literal's text form.
    pub fn extra_formatted_as_text(&self) -> bool {
        true
    }

    /// Extracted values keyed by placeholder (`"$3"`).
    pub fn variables(&self) -> BTreeMap<String, Vec<u8>> {
        self.extracted_constants()
            .iter()
            .map(|c| (format!("${}", c.param_id), c.raw_value.clone()))
            .collect()
    }

    /// Binary encoding, computed on first call and memoized.
    pub fn serialize(&self) -> Bytes {
        self.serialized
            .get_or_init(|| codec::encode(&self.body))
            .clone()
    }

    /// Cache key, computed on first call and memoized.
    pub fn cache_key(&self) -> &CacheKey {
        self.cache_key.get_or_init(|| hash::cache_key(&self.body))
    }
}

/// Every length-prefixed field must fit the `i32` prefix.
fn check_field_len(field: &'static str, len: usize) -> Result<(), InternalError> {
    if i32::try_from(len).is_err() {
        return Err(InternalError::FieldTooLong { field, len });
    }
    Ok(())
}
