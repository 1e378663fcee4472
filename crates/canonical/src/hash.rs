//! Cache keys for [`Source`](crate::Source) values.
//!
//! # Algorithm
//!
//! ```text
//! SHA-512(tag || text_bytes || type_oid_1 || ... || type_oid_n)
//! ```
//!
//! - `tag`: 1-byte serialization tag (0 plain, 1 normalized)
//! - `text_bytes`: UTF-8 bytes of the (normalized) text
//! - `type_oid_i`: wire type of the i-th constant as an 8-byte big-endian `i64`
//!
//! Raw literal values are left out on purpose: `WHERE id = 5` and
//! `WHERE id = 9` normalize to the same text with the same constant types and
//! therefore share one key, while `WHERE id = 5` and `WHERE id = 5.5` do not.

use std::fmt;

use sha2::{Digest, Sha512};

use crate::source::SourceBody;

/// Length of a cache key in bytes.
pub const CACHE_KEY_LEN: usize = 64;

/// 512-bit cache key. Displays as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; CACHE_KEY_LEN]);

impl CacheKey {
    pub fn as_bytes(&self) -> &[u8; CACHE_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for CacheKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.to_hex())
    }
}

pub(crate) fn cache_key(body: &SourceBody) -> CacheKey {
    let mut hasher = Sha512::new();
    hasher.update([body.tag()]);
    hasher.update(body.text().as_bytes());
    for constant in body.constants() {
        hasher.update(i64::from(constant.type_oid()).to_be_bytes());
    }
    let digest = hasher.finalize();
    let mut key = [0u8; CACHE_KEY_LEN];
    key.copy_from_slice(&digest);
    CacheKey(key)
}
