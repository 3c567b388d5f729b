// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The binary codec: a recursive, schema-driven wire format for method
//! arguments, return payloads, and user-defined value types.
//!
//! The codec is deliberately *not* self-describing — the reader must know
//! the expected type of each field. `Encode`/`Decode` are themselves the
//! schema: a type implementing both is, by construction, walked in
//! declaration order, the same way on every peer that shares the source.

use crate::error::Error;

/// Anything THE CORE can write onto the wire. Fallible because a sequence
/// field can exceed the wire's 16-bit length limit arbitrarily deep in a
/// composite value.
pub trait Encode {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error>;
}

/// Anything THE CORE can read off the wire. `decode` advances `input` past
/// the bytes it consumed and leaves it untouched on error.
pub trait Decode: Sized {
    fn decode(input: &mut &[u8]) -> Result<Self, Error>;
}

/// Maximum element count for a sequence (array/ordered list).
pub const MAX_SEQUENCE_LEN: usize = 65_535;

pub(crate) mod wire {
    use crate::error::Error;

    pub fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], Error> {
        if input.len() < n {
            return Err(Error::TruncatedInput);
        }
        let (bytes, rest) = input.split_at(n);
        *input = rest;
        Ok(bytes)
    }

    pub fn take_u8(input: &mut &[u8]) -> Result<u8, Error> {
        Ok(take(input, 1)?[0])
    }

    /// Encode `value` as a 7-bit-per-byte varint, MSB as the continuation
    /// flag, least-significant group first.
    pub fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    pub fn decode_varint(input: &mut &[u8]) -> Result<u32, Error> {
        let mut result: u32 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = take_u8(input)?;
            if shift >= 32 {
                return Err(Error::SchemaViolation(
                    "varint length prefix overflow".into(),
                ));
            }
            result |= ((byte & 0x7f) as u32) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(result)
    }
}

/// Implements `Encode`/`Decode` for a newtype by delegating to its single
/// field's primitive encoding. Used for the small wire-format newtypes
/// below instead of hand-duplicating the same few lines each time.
macro_rules! impl_codec_delegate {
    ($newtype:ident, $inner:ty) => {
        impl Encode for $newtype {
            fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
                self.0.encode(buf)
            }
        }

        impl Decode for $newtype {
            fn decode(input: &mut &[u8]) -> Result<Self, Error> {
                Ok($newtype(<$inner>::decode(input)?))
            }
        }
    };
}

macro_rules! impl_int_codec {
    ($ty:ty, $len:expr) => {
        impl Encode for $ty {
            fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
                buf.extend_from_slice(&self.to_le_bytes());
                Ok(())
            }
        }

        impl Decode for $ty {
            fn decode(input: &mut &[u8]) -> Result<Self, Error> {
                let bytes = wire::take(input, $len)?;
                Ok(<$ty>::from_le_bytes(bytes.try_into().unwrap()))
            }
        }
    };
}

impl_int_codec!(u8, 1);
impl_int_codec!(i8, 1);
impl_int_codec!(u16, 2);
impl_int_codec!(i16, 2);
impl_int_codec!(u32, 4);
impl_int_codec!(i32, 4);
impl_int_codec!(u64, 8);
impl_int_codec!(i64, 8);
impl_int_codec!(f32, 4);
impl_int_codec!(f64, 8);

impl Encode for bool {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.push(if *self { 1 } else { 0 });
        Ok(())
    }
}

impl Decode for bool {
    fn decode(input: &mut &[u8]) -> Result<Self, Error> {
        match wire::take_u8(input)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::SchemaViolation(format!(
                "invalid bool byte {other:#x}"
            ))),
        }
    }
}

/// Length-prefixed UTF-8 string: a 7-bit-per-byte varint byte-length,
/// followed by the UTF-8 payload.
impl Encode for String {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        wire::encode_varint(self.len() as u32, buf);
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl Decode for String {
    fn decode(input: &mut &[u8]) -> Result<Self, Error> {
        let len = wire::decode_varint(input)? as usize;
        let bytes = wire::take(input, len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::SchemaViolation(format!("invalid UTF-8 in string: {e}")))
    }
}

impl Encode for str {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        wire::encode_varint(self.len() as u32, buf);
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

/// Nullable framing: a 1-byte presence tag (0 = absent, 1 = present)
/// followed by the payload when present. This is the *only* nullable
/// encoding path THE CORE has.
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            None => buf.push(0),
            Some(value) => {
                buf.push(1);
                value.encode(buf)?;
            }
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, Error> {
        match wire::take_u8(input)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(input)?)),
            other => Err(Error::SchemaViolation(format!(
                "invalid presence tag {other:#x}"
            ))),
        }
    }
}

/// Sequences (arrays and ordered lists): a 16-bit little-endian unsigned
/// length, followed by that many elements. Maximum length 65,535 — longer
/// vectors fail with `SequenceTooLong` rather than silently truncating.
impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        if self.len() > MAX_SEQUENCE_LEN {
            return Err(Error::SequenceTooLong { len: self.len() });
        }
        buf.extend_from_slice(&(self.len() as u16).to_le_bytes());
        for item in self {
            item.encode(buf)?;
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, Error> {
        let len = u16::decode(input)? as usize;
        let mut items = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            items.push(T::decode(input)?);
        }
        Ok(items)
    }
}

/// An opaque 128-bit decimal: four 32-bit little-endian limbs (sign/scale
/// carried in the high limb by convention, uninterpreted here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decimal(pub [u32; 4]);

impl Encode for Decimal {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        for limb in self.0 {
            limb.encode(buf)?;
        }
        Ok(())
    }
}

impl Decode for Decimal {
    fn decode(input: &mut &[u8]) -> Result<Self, Error> {
        let mut limbs = [0u32; 4];
        for limb in &mut limbs {
            *limb = u32::decode(input)?;
        }
        Ok(Decimal(limbs))
    }
}

/// One UTF-16 code unit. Conversion to/from `char` fails outside the Basic
/// Multilingual Plane or on a lone surrogate half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireChar(pub u16);

impl_codec_delegate!(WireChar, u16);

impl TryFrom<char> for WireChar {
    type Error = Error;

    fn try_from(c: char) -> Result<Self, Error> {
        let mut units = [0u16; 2];
        let encoded = c.encode_utf16(&mut units);
        if encoded.len() != 1 {
            return Err(Error::SchemaViolation(format!(
                "char {c:?} is outside the Basic Multilingual Plane"
            )));
        }
        Ok(WireChar(encoded[0]))
    }
}

impl TryFrom<WireChar> for char {
    type Error = Error;

    fn try_from(value: WireChar) -> Result<Self, Error> {
        char::decode_utf16([value.0])
            .next()
            .expect("one code unit yields exactly one result")
            .map_err(|_| {
                Error::SchemaViolation(format!("{:#x} is a lone surrogate half", value.0))
            })
    }
}

/// Nanoseconds since the Unix epoch, UTC. This is a deliberate break from
/// a platform's native binary date encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp(pub i64);

impl_codec_delegate!(Timestamp, i64);

impl From<std::time::SystemTime> for Timestamp {
    fn from(time: std::time::SystemTime) -> Self {
        let nanos = match time.duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => d.as_nanos() as i64,
            Err(e) => -(e.duration().as_nanos() as i64),
        };
        Timestamp(nanos)
    }
}

/// A signed tick count in units of 100 nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Ticks100ns(pub i64);

impl_codec_delegate!(Ticks100ns, i64);

impl From<std::time::Duration> for Ticks100ns {
    fn from(d: std::time::Duration) -> Self {
        Ticks100ns((d.as_nanos() / 100) as i64)
    }
}

impl From<Ticks100ns> for std::time::Duration {
    fn from(t: Ticks100ns) -> Self {
        std::time::Duration::from_nanos((t.0.max(0) as u64) * 100)
    }
}
