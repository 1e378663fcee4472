//! Binary encoding of [`Source`](crate::Source) values.
//!
//! All integers are big-endian. Strings and byte strings are prefixed with
//! their length as an `i32`.
//!
//! ```text
//! Plain:      [0u8][text]
//! Normalized: [1u8][text][original_text][highest_extern_param_id:i32][n:i32]
//!             { [param_id:i32][token_name][raw_value] } × n
//! ```
//!
//! Encoding is deterministic, and decoding rejects anything that is not
//! byte-for-byte an encoding (including trailing data), so a decoded value
//! re-encodes to its input.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::FormatError;
use crate::literal::LiteralTokenKind;
use crate::source::{ExtractedConstant, NormalizedBody, SourceBody};

pub const TAG_PLAIN: u8 = 0;
pub const TAG_NORMALIZED: u8 = 1;

const PLAIN_CLASS: &str = "Source";
const NORMALIZED_CLASS: &str = "NormalizedSource";

// `Source` constructors reject fields whose length does not fit an i32.
fn wire_len(len: usize) -> i32 {
    debug_assert!(i32::try_from(len).is_ok(), "field length {len} escaped the constructor check");
    len as i32
}

pub(crate) fn put_len_prefixed(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_i32(wire_len(bytes.len()));
    buf.put_slice(bytes);
}

pub(crate) fn encode(body: &SourceBody) -> Bytes {
    match body {
        SourceBody::Plain { text } => {
            let mut buf = BytesMut::with_capacity(1 + 4 + text.len());
            buf.put_u8(TAG_PLAIN);
            put_len_prefixed(&mut buf, text.as_bytes());
            buf.freeze()
        }
        SourceBody::Normalized(body) => {
            let constants_len: usize = body
                .extracted_constants
                .iter()
                .map(|c| 4 + 4 + c.token_kind.name().len() + 4 + c.raw_value.len())
                .sum();
            let mut buf = BytesMut::with_capacity(
                1 + 4 + body.text.len() + 4 + body.original_text.len() + 8 + constants_len,
            );
            buf.put_u8(TAG_NORMALIZED);
            put_len_prefixed(&mut buf, body.text.as_bytes());
            put_len_prefixed(&mut buf, body.original_text.as_bytes());
            buf.put_i32(body.highest_extern_param_id);
            buf.put_i32(wire_len(body.extracted_constants.len()));
            for constant in &body.extracted_constants {
                buf.put_i32(constant.param_id);
                put_len_prefixed(&mut buf, constant.token_kind.name().as_bytes());
                put_len_prefixed(&mut buf, &constant.raw_value);
            }
            buf.freeze()
        }
    }
}

pub(crate) fn decode(data: &[u8]) -> Result<SourceBody, FormatError> {
    let Some((&tag, rest)) = data.split_first() else {
        return Err(FormatError::Empty);
    };
    let result = match tag {
        TAG_PLAIN => decode_plain(Reader::new(rest, PLAIN_CLASS)),
        TAG_NORMALIZED => decode_normalized(Reader::new(rest, NORMALIZED_CLASS)),
        other => Err(FormatError::InvalidTag(other)),
    };
    if let Err(err) = &result {
        debug!(error = %err, len = data.len(), "source_decode_failure");
    }
    result
}

fn decode_plain(mut reader: Reader<'_>) -> Result<SourceBody, FormatError> {
    let text = reader.string("text")?;
    reader.finish()?;
    Ok(SourceBody::Plain { text })
}

fn decode_normalized(mut reader: Reader<'_>) -> Result<SourceBody, FormatError> {
    let text = reader.string("text")?;
    let original_text = reader.string("original_text")?;
    let highest_extern_param_id = reader.i32("highest_extern_param_id")?;
    if highest_extern_param_id < 0 {
        return Err(reader.malformed(format!(
            "negative highest_extern_param_id {highest_extern_param_id}"
        )));
    }
    let count = reader.i32("constant count")?;
    let count = usize::try_from(count)
        .map_err(|_| reader.malformed(format!("negative constant count {count}")))?;

    // Each constant needs at least 12 bytes; cap the reservation by what is left.
    let mut extracted_constants = Vec::with_capacity(count.min(reader.remaining() / 12));
    let mut previous: Option<i32> = None;
    for _ in 0..count {
        let param_id = reader.i32("param_id")?;
        let name = reader.string("token kind")?;
        let token_kind = LiteralTokenKind::from_name(&name)
            .ok_or_else(|| reader.malformed(format!("unknown token kind `{name}`")))?;
        let raw_value = reader.bytes("raw value")?.to_vec();

        if previous.is_some_and(|prev| prev >= param_id) {
            return Err(reader.malformed(format!(
                "parameter id {param_id} out of order or duplicated"
            )));
        }
        previous = Some(param_id);

        extracted_constants.push(ExtractedConstant {
            param_id,
            token_kind,
            raw_value,
        });
    }
    reader.finish()?;

    Ok(SourceBody::Normalized(NormalizedBody {
        text,
        original_text,
        highest_extern_param_id,
        extracted_constants,
    }))
}

struct Reader<'a> {
    buf: &'a [u8],
    class: &'static str,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], class: &'static str) -> Self {
        Self { buf, class }
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn malformed(&self, reason: String) -> FormatError {
        FormatError::Malformed {
            class: self.class,
            reason,
        }
    }

    fn truncated(&self, field: &str) -> FormatError {
        self.malformed(format!("unexpected end of input reading {field}"))
    }

    fn i32(&mut self, field: &str) -> Result<i32, FormatError> {
        if self.buf.remaining() < 4 {
            return Err(self.truncated(field));
        }
        Ok(self.buf.get_i32())
    }

    fn bytes(&mut self, field: &str) -> Result<&'a [u8], FormatError> {
        let len = self.i32(field)?;
        let len = usize::try_from(len)
            .map_err(|_| self.malformed(format!("negative length {len} for {field}")))?;
        if self.buf.len() < len {
            return Err(self.truncated(field));
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn string(&mut self, field: &str) -> Result<String, FormatError> {
        let bytes = self.bytes(field)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|err| self.malformed(format!("{field} is not valid UTF-8: {err}")))
    }

    fn finish(self) -> Result<(), FormatError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(self.malformed(format!("{} trailing bytes", self.buf.len())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized_body() -> SourceBody {
        SourceBody::Normalized(NormalizedBody {
            text: "SELECT $1".into(),
            original_text: "SELECT 5".into(),
            highest_extern_param_id: 0,
            extracted_constants: vec![ExtractedConstant::new(
                1,
                LiteralTokenKind::Integer,
                "5",
            )],
        })
    }

    #[test]
    fn plain_layout() {
        let bytes = encode(&SourceBody::Plain { text: "ab".into() });
        assert_eq!(&bytes[..], &[0, 0, 0, 0, 2, b'a', b'b'][..]);
    }

    #[test]
    fn normalized_layout() {
        let bytes = encode(&normalized_body());
        let mut expected = vec![1u8];
        expected.extend_from_slice(&9i32.to_be_bytes());
        expected.extend_from_slice(b"SELECT $1");
        expected.extend_from_slice(&8i32.to_be_bytes());
        expected.extend_from_slice(b"SELECT 5");
        expected.extend_from_slice(&0i32.to_be_bytes());
        expected.extend_from_slice(&1i32.to_be_bytes());
        expected.extend_from_slice(&1i32.to_be_bytes());
        expected.extend_from_slice(&6i32.to_be_bytes());
        expected.extend_from_slice(b"ICONST");
        expected.extend_from_slice(&1i32.to_be_bytes());
        expected.extend_from_slice(b"5");
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn decode_inverts_encode() {
        let body = normalized_body();
        assert_eq!(decode(&encode(&body)).expect("decode"), body);

        let plain = SourceBody::Plain {
            text: "SELECT 'é'".into(),
        };
        assert_eq!(decode(&encode(&plain)).expect("decode"), plain);
    }

    #[test]
    fn empty_input() {
        assert_eq!(decode(&[]), Err(FormatError::Empty));
    }

    #[test]
    fn unknown_tag() {
        assert_eq!(decode(&[7, 0, 0]), Err(FormatError::InvalidTag(7)));
    }

    #[test]
    fn truncated_body_names_class() {
        let bytes = encode(&normalized_body());
        for cut in 1..bytes.len() {
            match decode(&bytes[..cut]) {
                Err(FormatError::Malformed { class, .. }) => assert_eq!(class, "NormalizedSource"),
                other => panic!("cut at {cut}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode(&SourceBody::Plain { text: "x".into() }).to_vec();
        bytes.push(0);
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::Malformed { class: "Source", .. })
        ));
    }

    #[test]
    fn negative_length_rejected() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&(-1i32).to_be_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::Malformed { class: "Source", .. })
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&2i32.to_be_bytes());
        bytes.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(decode(&bytes), Err(FormatError::Malformed { .. })));
    }

    #[test]
    fn unknown_token_name_rejected() {
        let bytes = encode(&normalized_body()).to_vec();
        let patched = String::from_utf8_lossy(&bytes).replace("ICONST", "QCONST");
        let err = decode(patched.as_bytes()).expect_err("unknown token");
        assert!(err.to_string().contains("QCONST"));
    }

    #[test]
    fn unordered_constants_rejected() {
        let mut bytes = vec![1u8];
        for text in ["SELECT $1, $2", "SELECT 1, 2"] {
            bytes.extend_from_slice(&(text.len() as i32).to_be_bytes());
            bytes.extend_from_slice(text.as_bytes());
        }
        bytes.extend_from_slice(&0i32.to_be_bytes());
        bytes.extend_from_slice(&2i32.to_be_bytes());
        for (id, raw) in [(2i32, b"2"), (1i32, b"1")] {
            bytes.extend_from_slice(&id.to_be_bytes());
            bytes.extend_from_slice(&6i32.to_be_bytes());
            bytes.extend_from_slice(b"ICONST");
            bytes.extend_from_slice(&1i32.to_be_bytes());
            bytes.extend_from_slice(raw);
        }
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::Malformed { class: "NormalizedSource", .. })
        ));
    }
}
