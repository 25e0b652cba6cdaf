//! LEB128 varint and zigzag primitives.
//!
//! Unsigned integers use the little-endian base-128 encoding: 7 bits
//! of payload per byte, high bit as continuation. Signed integers are
//! remapped through zigzag first so small magnitudes stay short. Both
//! match the protocol-buffers wire convention.
//!
//! See also: <https://en.wikipedia.org/wiki/LEB128>

use std::io;

use marshal_core::{Error, Result};

use crate::read::Read;

/// Longest possible encoding of a `u64`.
pub(crate) const MAX_LEN: usize = 10;

/// Writes `x` as an unsigned varint, returning the encoded length.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_uint<W: io::Write>(out: &mut W, mut x: u64) -> Result<usize> {
    let mut buf = [0u8; MAX_LEN];
    let mut i = 0usize;
    while x >= 0x80 {
        buf[i] = (x as u8) | 0x80;
        x >>= 7;
        i += 1;
    }
    buf[i] = x as u8;
    i += 1;

    out.write_all(&buf[..i])?;
    Ok(i)
}

/// Writes `x` as a zigzag-mapped signed varint.
pub(crate) fn write_sint<W: io::Write>(out: &mut W, x: i64) -> Result<usize> {
    write_uint(out, zigzag(x))
}

/// Maps a signed value to its zigzag unsigned form.
#[allow(clippy::cast_sign_loss)]
pub(crate) const fn zigzag(x: i64) -> u64 {
    let mut v = (x as u64) << 1;
    if x < 0 {
        v = !v;
    }
    v
}

/// Inverse of [`zigzag`].
#[allow(clippy::cast_possible_wrap)]
pub(crate) const fn unzigzag(v: u64) -> i64 {
    let mut x = v >> 1;
    if v & 1 != 0 {
        x = !x;
    }
    x as i64
}

/// Reads an unsigned varint from `src`.
///
/// # Errors
///
/// Fails with [`Error::MalformedWireValue`] when the encoding is
/// truncated, longer than [`MAX_LEN`] bytes, or overflows 64 bits.
pub(crate) fn read_uint<R: Read>(src: &mut R) -> Result<u64> {
    let start = src.position();
    match read_uint_opt(src)? {
        Some(x) => Ok(x),
        None => Err(Error::malformed(start, "truncated varint")),
    }
}

/// Reads an unsigned varint, returning `None` when the input ends
/// before its first byte.
pub(crate) fn read_uint_opt<R: Read>(src: &mut R) -> Result<Option<u64>> {
    let start = src.position();
    let Some(first) = src.read_byte_opt()? else {
        return Ok(None);
    };

    let mut x = u64::from(first & 0x7F);
    let mut shift = 7u32;
    let mut b = first;
    while b >= 0x80 {
        if shift >= 64 {
            return Err(Error::malformed(start, "varint longer than 10 bytes"));
        }
        b = match src.read_byte_opt()? {
            Some(b) => b,
            None => return Err(Error::malformed(start, "truncated varint")),
        };
        // the 10th byte may only contribute a single bit
        if shift == 63 && b > 1 {
            return Err(Error::malformed(start, "varint overflows 64 bits"));
        }
        x |= u64::from(b & 0x7F) << shift;
        shift += 7;
    }

    Ok(Some(x))
}

/// Reads a zigzag-mapped signed varint from `src`.
pub(crate) fn read_sint<R: Read>(src: &mut R) -> Result<i64> {
    read_uint(src).map(unzigzag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::SliceRead;

    fn encode(x: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        let len = write_uint(&mut buf, x).expect("encoding to a vec works");
        assert_eq!(len, buf.len(), "reported length matches the buffer");
        buf
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(0), [0x00]);
        assert_eq!(encode(127), [0x7F]);
        assert_eq!(encode(128), [0x80, 0x01]);
        assert_eq!(encode(300), [0xAC, 0x02]);
        assert_eq!(
            encode(u64::MAX),
            [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
        );
    }

    #[test]
    fn zigzag_known_pairs() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        assert_eq!(zigzag(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag(i64::MIN), u64::MAX);
    }

    #[test]
    fn round_trip_uint() {
        for x in [0, 1, 127, 128, 16383, 16384, 1 << 40, u64::MAX] {
            let buf = encode(x);
            let mut src = SliceRead::new(&buf);
            assert_eq!(read_uint(&mut src).expect("decoding works"), x);
            assert!(src.remainder().is_empty(), "whole encoding consumed");
        }
    }

    #[test]
    fn round_trip_sint() {
        for x in [0, 1, -1, 63, -64, 1 << 40, -(1 << 40), i64::MIN, i64::MAX] {
            let mut buf = Vec::new();
            write_sint(&mut buf, x).expect("encoding works");
            let mut src = SliceRead::new(&buf);
            assert_eq!(read_sint(&mut src).expect("decoding works"), x);
        }
    }

    #[test]
    fn truncated_input_is_malformed() {
        for buf in [&[0x80][..], &[0x80, 0x80][..], &[0xFF, 0xFF, 0xFF][..]] {
            let mut src = SliceRead::new(buf);
            let err = read_uint(&mut src).expect_err("truncated varint must fail");
            assert!(
                matches!(err, Error::MalformedWireValue { offset: 0, .. }),
                "unexpected error: {err:?}"
            );
        }
    }

    #[test]
    fn overlong_input_is_malformed() {
        // 11 continuation bytes
        let buf = [0x80u8; 11];
        let mut src = SliceRead::new(&buf);
        let err = read_uint(&mut src).expect_err("overlong varint must fail");
        assert!(matches!(err, Error::MalformedWireValue { .. }), "got {err:?}");
    }

    #[test]
    fn overflowing_tenth_byte_is_malformed() {
        // 9 continuation bytes, then a final byte contributing >1 bit
        let mut buf = vec![0x80u8; 9];
        buf.push(0x02);
        let mut src = SliceRead::new(&buf);
        let err = read_uint(&mut src).expect_err("overflow must fail");
        assert!(matches!(err, Error::MalformedWireValue { .. }), "got {err:?}");
    }

    #[test]
    fn empty_input_reads_none() {
        let mut src = SliceRead::new(&[]);
        assert_eq!(read_uint_opt(&mut src).expect("eof is not an error"), None);
    }
}
