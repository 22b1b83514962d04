//! Schema-less reading of the protobuf wire format.
//!
//! Nothing here knows field names or types. A message is rebuilt purely from
//! its self-describing layout (field tags, varints, length prefixes) into a
//! [`WireValue`] tree that callers fold over.

use crate::error::WireError;
use prost::encoding::{self, WireType};

const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    /// Length-delimited payload that is valid UTF-8 and not a nested message.
    Text(String),
    /// Length-delimited payload that is neither text nor a nested message.
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Scalar(Scalar),
    /// A field number that occurred more than once.
    Sequence(Vec<WireValue>),
    /// Field number → value, in order of first appearance.
    Mapping(Vec<(u64, WireValue)>),
}

impl WireValue {
    /// Depth-first fold over every scalar leaf, in encounter order.
    pub fn fold<B, F>(&self, init: B, f: &mut F) -> B
    where
        F: FnMut(B, &Scalar) -> B,
    {
        match self {
            WireValue::Scalar(leaf) => f(init, leaf),
            WireValue::Sequence(items) => {
                let mut acc = init;
                for item in items {
                    acc = item.fold(acc, f);
                }
                acc
            }
            WireValue::Mapping(fields) => {
                let mut acc = init;
                for (_, value) in fields {
                    acc = value.fold(acc, f);
                }
                acc
            }
        }
    }
}

/// Decode a complete message. The whole buffer must be consumed.
pub fn decode_message(bytes: &[u8]) -> Result<WireValue, WireError> {
    let mut reader = Reader::new(bytes);
    parse_fields(&mut reader, 0, None)
}

/// Cursor over a message buffer. Offsets in errors are relative to its start.
struct Reader<'a> {
    rest: &'a [u8],
    len: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            rest: buf,
            len: buf.len(),
        }
    }

    fn pos(&self) -> usize {
        self.len - self.rest.len()
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn varint(&mut self) -> Result<u64, WireError> {
        let offset = self.pos();
        let mut cursor = self.rest;
        match encoding::decode_varint(&mut cursor) {
            Ok(value) => {
                self.rest = cursor;
                Ok(value)
            }
            // prost reports both cases as one error. Ten bytes without a
            // valid end is too long; fewer means the buffer ran out.
            Err(_) if self.rest.len() >= 10 => Err(WireError::VarintOverflow { offset }),
            Err(_) => Err(WireError::TruncatedVarint { offset }),
        }
    }

    fn take(&mut self, wanted: u64) -> Result<&'a [u8], WireError> {
        let available = self.rest.len();
        let len = usize::try_from(wanted)
            .ok()
            .filter(|&n| n <= available)
            .ok_or(WireError::Truncated {
                offset: self.pos(),
                wanted,
                available,
            })?;
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N as u64)?);
        Ok(out)
    }
}

/// Parse fields until the buffer ends, or until the end tag of `group`.
fn parse_fields(
    reader: &mut Reader<'_>,
    depth: usize,
    group: Option<u64>,
) -> Result<WireValue, WireError> {
    if depth > MAX_DEPTH {
        return Err(WireError::TooDeep { limit: MAX_DEPTH });
    }

    let mut fields: Vec<(u64, WireValue)> = Vec::new();
    while !reader.is_empty() {
        let offset = reader.pos();
        let key = reader.varint()?;
        let field = key >> 3;
        if field == 0 {
            return Err(WireError::ZeroField { offset });
        }
        let wire_type =
            WireType::try_from(key & 0x7).map_err(|_| WireError::InvalidWireType {
                wire_type: (key & 0x7) as u8,
                offset,
            })?;

        let value = match wire_type {
            WireType::Varint => WireValue::Scalar(Scalar::Varint(reader.varint()?)),
            WireType::SixtyFourBit => {
                WireValue::Scalar(Scalar::Fixed64(u64::from_le_bytes(reader.fixed()?)))
            }
            WireType::LengthDelimited => {
                let len = reader.varint()?;
                let payload = reader.take(len)?;
                classify_payload(payload, depth)
            }
            WireType::StartGroup => parse_fields(reader, depth + 1, Some(field))?,
            WireType::EndGroup => {
                return if group == Some(field) {
                    Ok(WireValue::Mapping(fields))
                } else {
                    Err(WireError::UnbalancedGroup { offset })
                };
            }
            WireType::ThirtyTwoBit => {
                WireValue::Scalar(Scalar::Fixed32(u32::from_le_bytes(reader.fixed()?)))
            }
        };
        push_field(&mut fields, field, value);
    }

    match group {
        Some(_) => Err(WireError::UnbalancedGroup {
            offset: reader.pos(),
        }),
        None => Ok(WireValue::Mapping(fields)),
    }
}

fn push_field(fields: &mut Vec<(u64, WireValue)>, field: u64, value: WireValue) {
    let Some(slot) = fields.iter().position(|(n, _)| *n == field) else {
        fields.push((field, value));
        return;
    };
    match &mut fields[slot].1 {
        WireValue::Sequence(items) => items.push(value),
        other => {
            let first = std::mem::replace(other, WireValue::Sequence(Vec::new()));
            *other = WireValue::Sequence(vec![first, value]);
        }
    }
}

/// A length-delimited payload is a nested message, a string, or raw bytes.
/// A nested parse that consumes the payload exactly is tried first. Prose
/// can occasionally parse as a message of bare varints and fixed fields, so
/// a payload that also reads as text is only taken as a message when the
/// parse found a length-delimited field inside it.
fn classify_payload(payload: &[u8], depth: usize) -> WireValue {
    let text = std::str::from_utf8(payload).ok();

    if !payload.is_empty()
        && let Ok(message) = parse_fields(&mut Reader::new(payload), depth + 1, None)
        && has_fields(&message)
        && (!text.is_some_and(looks_like_text) || carries_payload(&message))
    {
        return message;
    }

    match text {
        Some(text) => WireValue::Scalar(Scalar::Text(text.to_owned())),
        None => WireValue::Scalar(Scalar::Bytes(payload.to_vec())),
    }
}

fn has_fields(message: &WireValue) -> bool {
    matches!(message, WireValue::Mapping(fields) if !fields.is_empty())
}

fn carries_payload(message: &WireValue) -> bool {
    message.fold(false, &mut |found, leaf: &Scalar| {
        found || matches!(leaf, Scalar::Text(_) | Scalar::Bytes(_))
    })
}

fn looks_like_text(text: &str) -> bool {
    text.chars()
        .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
}
