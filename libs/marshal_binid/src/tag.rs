//! Wire tags.
//!
//! Every field starts with a tag: a single unsigned varint packing the
//! field id into the high bits and the wire type into the low three.
//! Inside an array, a scalar run tag overloads the field slot with the
//! item count instead.
//!
//! The bare zero byte (field 0, wire type 0) never occurs as a real
//! tag and is reserved: inside arrays it is the one-byte null marker.

use std::io;

use marshal_core::Result;

use crate::leb128;
use crate::read::Read;

/// Physical encoding introduced by a tag.
///
/// Values 0 through 5 match the protocol-buffers wire convention;
/// [`ArrayMarker`](Self::ArrayMarker) and [`Null`](Self::Null) are
/// extensions of this format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
    /// Start of an array.
    ArrayMarker = 6,
    /// Explicit null for an object property.
    Null = 7,
}

impl WireType {
    /// Decodes the low three bits of a tag.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::Varint,
            1 => Self::Fixed64,
            2 => Self::LengthDelimited,
            3 => Self::StartGroup,
            4 => Self::EndGroup,
            5 => Self::Fixed32,
            6 => Self::ArrayMarker,
            _ => Self::Null,
        }
    }

    /// Whether a tag of this type introduces an untagged scalar
    /// payload (and may therefore head an array run).
    #[must_use]
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Self::Varint | Self::Fixed32 | Self::Fixed64 | Self::LengthDelimited
        )
    }
}

/// A decoded `(field, wire type)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    /// Field id; the item count for scalar runs inside arrays.
    pub field: u64,
    pub wire: WireType,
}

impl Tag {
    #[must_use]
    pub fn new(field: u64, wire: WireType) -> Self {
        Self { field, wire }
    }

    /// Encodes the tag as a single unsigned varint.
    pub fn write<W: io::Write>(self, out: &mut W) -> Result<usize> {
        leb128::write_uint(out, self.field << 3 | u64::from(self.wire as u8))
    }

    /// Reads a tag, or `None` when the input ends before one starts.
    pub fn read_opt<R: Read>(src: &mut R) -> Result<Option<Self>> {
        let Some(raw) = leb128::read_uint_opt(src)? else {
            return Ok(None);
        };
        #[allow(clippy::cast_possible_truncation)]
        let wire = WireType::from_bits((raw & 7) as u8);
        Ok(Some(Self {
            field: raw >> 3,
            wire,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::SliceRead;

    fn encode(tag: Tag) -> Vec<u8> {
        let mut buf = Vec::new();
        tag.write(&mut buf).expect("encoding to a vec works");
        buf
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(Tag::new(0, WireType::EndGroup)), [0x04]);
        assert_eq!(encode(Tag::new(0, WireType::ArrayMarker)), [0x06]);
        assert_eq!(encode(Tag::new(2, WireType::Varint)), [0x10]);
        assert_eq!(encode(Tag::new(3, WireType::LengthDelimited)), [0x1A]);
        // field ids past 15 spill into a second byte
        assert_eq!(encode(Tag::new(16, WireType::Varint)), [0x80, 0x01]);
    }

    #[test]
    fn round_trip() {
        let tags = [
            Tag::new(0, WireType::EndGroup),
            Tag::new(1, WireType::StartGroup),
            Tag::new(2, WireType::Fixed32),
            Tag::new(300, WireType::Fixed64),
            Tag::new(70_000, WireType::Null),
        ];
        for tag in tags {
            let buf = encode(tag);
            let mut src = SliceRead::new(&buf);
            let back = Tag::read_opt(&mut src).expect("decoding works");
            assert_eq!(back, Some(tag));
        }
    }

    #[test]
    fn empty_input_reads_none() {
        let mut src = SliceRead::new(&[]);
        assert_eq!(Tag::read_opt(&mut src).expect("eof is not an error"), None);
    }

    #[test]
    fn scalar_wire_types() {
        assert!(WireType::Varint.is_scalar(), "varint heads runs");
        assert!(WireType::LengthDelimited.is_scalar(), "strings head runs");
        assert!(!WireType::StartGroup.is_scalar(), "groups are not scalars");
        assert!(!WireType::Null.is_scalar(), "null never batches");
    }
}
