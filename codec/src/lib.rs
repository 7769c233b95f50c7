//! Pack tagged, range-bounded values into dense bit streams.
//!
//! # Overview
//!
//! A schema-driven binary serialization library designed to spend as few bits as possible on
//! each value, for payloads where every bit counts (e.g. game-state replication):
//! - Integers are written as offsets within their declared `[min, max]` bounds, using only the
//!   bits that range requires
//! - Floats are written either as exact IEEE-754 bit patterns or quantized to a chosen resolution
//! - Composite values are written field by field, each preceded by its ordering number, so fields
//!   can be reordered in memory without changing the wire format
//!
//! # Layers
//!
//! - [bits]: LSB-first bit writer/reader over little-endian 32-bit words
//! - [range]: range encoding of bounded integers, exact floats and compressed floats
//! - [tag]: per-field annotations (ordering number and bounds)
//! - [schema]: recursive, tag-ordered encoding of composites
//!
//! # Supported Types
//!
//! Natively supports `i32` and `f32` fields, and nested composites of them. A composite is any
//! type implementing [Composite], most easily through the [composite!] macro.
//!
//! # Example
//!
//! ```
//! use packwire_codec::{composite, decode, encode, tag::Tag};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Velocity {
//!     dx: i32,
//!     dy: i32,
//! }
//!
//! #[derive(Debug, Default)]
//! struct Player {
//!     score: i32,
//!     heading: f32,
//!     velocity: Velocity,
//!     nickname: String,
//! }
//!
//! composite! {
//!     Velocity {
//!         dx => "1,min=-64,max=63",
//!         dy => "2,min=-64,max=63",
//!     }
//! }
//!
//! composite! {
//!     Player {
//!         score => "1,min=0",
//!         heading => Tag::new(2).min(0).max(360).resolution(0.5),
//!         velocity => "3",
//!     }
//! }
//!
//! let player = Player {
//!     score: 1200,
//!     heading: 90.25,
//!     velocity: Velocity { dx: -5, dy: 17 },
//!     nickname: "unused".into(),
//! };
//! let bytes = encode(&player).unwrap();
//!
//! let mut decoded = Player::default();
//! decode(bytes, &mut decoded).unwrap();
//! assert_eq!(decoded.score, 1200);
//! assert!((decoded.heading - 90.25).abs() <= 0.25);
//! assert_eq!(decoded.velocity, player.velocity);
//! assert!(decoded.nickname.is_empty());
//! ```

pub mod bits;
pub mod error;
pub mod range;
pub mod schema;
pub mod tag;

pub use bits::{Reader, Writer};
pub use error::Error;
pub use schema::{Annotation, Composite, Field, Value, ValueMut, ValueRef};
pub use tag::Tag;

use bits::WORD_BITS;
use bytes::{Buf, Bytes};
use tracing::debug;

/// Encodes `value` into a word-aligned byte buffer.
///
/// Composites are written field by field. A bare `i32` is written over the full `i32` range and
/// a bare `f32` as its raw bit pattern.
pub fn encode<V: Value + ?Sized>(value: &V) -> Result<Bytes, Error> {
    let mut writer = Writer::new();
    schema::encode_value(&mut writer, value.value_ref())?;
    writer.finalize()?;

    debug!(
        bits = writer.bits_written(),
        bytes = writer.bytes().len(),
        "encoded value"
    );
    Ok(writer.into_bytes())
}

/// Decodes `buf` into `dst`, which must have the same shape as the encoded value.
///
/// Fails with [Error::ExtraData] if a whole word, or any non-zero padding bit, is left unread.
///
/// # Panics
///
/// Panics if `buf` does not hold a whole number of 32-bit words.
pub fn decode<V: Value + ?Sized>(mut buf: impl Buf, dst: &mut V) -> Result<(), Error> {
    let total_bits = buf.remaining() * 8;
    let source: &mut dyn Buf = &mut buf;
    let mut reader = Reader::new(source, total_bits);
    schema::decode_value(&mut reader, dst.value_mut())?;

    let remaining = reader.remaining_bits();
    if remaining >= WORD_BITS as usize {
        return Err(Error::ExtraData(remaining));
    }
    if remaining > 0 && reader.read(remaining as u32)? != 0 {
        return Err(Error::ExtraData(remaining));
    }

    debug!(bits = reader.bits_read(), "decoded value");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_int32() {
        let bytes = encode(&255i32).unwrap();
        assert_eq!(bytes.len(), 4);

        let mut decoded = 0i32;
        decode(bytes, &mut decoded).unwrap();
        assert_eq!(decoded, 255);
    }

    #[test]
    fn test_encode_int32_extremes() {
        for value in [i32::MIN, -1, 0, 1, i32::MAX] {
            let mut decoded = 0i32;
            decode(encode(&value).unwrap(), &mut decoded).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_encode_float32() {
        let bytes = encode(&100.456f32).unwrap();
        assert_eq!(&bytes[..], &100.456f32.to_le_bytes());

        let mut decoded = 0f32;
        decode(bytes, &mut decoded).unwrap();
        assert_eq!(decoded, 100.456);
    }

    #[test]
    fn test_encode_unsupported() {
        assert_eq!(
            encode(&String::from("Hello")),
            Err(Error::UnsupportedType("String"))
        );
        assert_eq!(encode(&7u8), Err(Error::UnsupportedType("u8")));
    }

    #[test]
    fn test_decode_unsupported() {
        let mut dst = String::new();
        assert_eq!(
            decode(&[0u8; 4][..], &mut dst),
            Err(Error::UnsupportedType("String"))
        );
    }

    #[test]
    fn test_decode_extra_word() {
        let mut data = encode(&5i32).unwrap().to_vec();
        data.extend_from_slice(&[0, 0, 0, 0]);

        let mut decoded = 0i32;
        assert_eq!(decode(&data[..], &mut decoded), Err(Error::ExtraData(32)));
    }

    #[test]
    fn test_decode_truncated() {
        let mut decoded = 0f32;
        assert!(matches!(
            decode(&[][..], &mut decoded),
            Err(Error::BudgetExceeded {
                requested: 32,
                budget: 0
            })
        ));
    }

    #[test]
    #[should_panic(expected = "not a multiple of 4 bytes")]
    fn test_decode_unaligned() {
        let mut decoded = 0i32;
        let _ = decode(&[0u8; 5][..], &mut decoded);
    }
}
