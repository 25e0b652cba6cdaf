//! Byte sources for the pull reader.

use std::io;

use marshal_core::{Error, Result};

/// Returns an [`io::Error`] with kind [`io::ErrorKind::UnexpectedEof`].
fn eof() -> Error {
    io::Error::from(io::ErrorKind::UnexpectedEof).into()
}

// usize fits in u64 on every supported target
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn to_u64(n: usize) -> u64 {
    n as u64
}

/// Specialized byte source for [`Reader`](crate::Reader).
///
/// Implemented by [`SliceRead`] and [`IoRead`]. Keeps a running byte
/// position so decode errors can name an offset.
pub trait Read {
    /// Number of bytes consumed so far.
    fn position(&self) -> u64;

    /// Reads a constant size chunk of bytes.
    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]>;

    /// Reads a single byte, or `None` at end of input.
    ///
    /// This is how the reader detects the end of the unwrapped
    /// outermost object, which has no closing marker.
    fn read_byte_opt(&mut self) -> Result<Option<u8>>;

    /// Reads a chunk of bytes, returning it as a newly allocated
    /// [`Vec`].
    fn read_byte_vec(&mut self, len: usize) -> Result<Vec<u8>>;
}

impl<R: Read> Read for &mut R {
    fn position(&self) -> u64 {
        (**self).position()
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        (**self).read_bytes()
    }

    fn read_byte_opt(&mut self) -> Result<Option<u8>> {
        (**self).read_byte_opt()
    }

    fn read_byte_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        (**self).read_byte_vec(len)
    }
}

/// Byte source over an in-memory slice.
#[derive(Debug)]
pub struct SliceRead<'a> {
    buf: &'a [u8],
    pos: u64,
}

impl<'a> SliceRead<'a> {
    /// Creates a byte source reading from the start of `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The remaining unread part of the slice.
    #[must_use]
    pub fn remainder(&self) -> &'a [u8] {
        self.buf
    }
}

impl Read for SliceRead<'_> {
    fn position(&self) -> u64 {
        self.pos
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let (out, rem) = self.buf.split_first_chunk::<N>().ok_or_else(eof)?;
        self.buf = rem;
        self.pos += to_u64(N);
        Ok(*out)
    }

    fn read_byte_opt(&mut self) -> Result<Option<u8>> {
        match self.buf.split_first() {
            Some((&b, rem)) => {
                self.buf = rem;
                self.pos += 1;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    fn read_byte_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let (out, rem) = self.buf.split_at_checked(len).ok_or_else(eof)?;
        self.buf = rem;
        self.pos += to_u64(len);
        Ok(out.to_vec())
    }
}

/// Wraps an [`io::Read`] implementation so it can be used as a
/// [`Read`].
#[derive(Debug)]
pub struct IoRead<R> {
    inner: R,
    pos: u64,
}

impl<R: io::Read> IoRead<R> {
    /// Creates a byte source over an [`io::Read`].
    ///
    /// If you're working with a byte slice, [`SliceRead`] avoids the
    /// copies.
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    /// Unwraps into the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: io::Read> Read for IoRead<R> {
    fn position(&self) -> u64 {
        self.pos
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        self.pos += to_u64(N);
        Ok(buf)
    }

    fn read_byte_opt(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.pos += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    #[inline(never)]
    fn read_byte_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        use std::io::Read as _;

        // don't allocate too much up front or incorrect length data
        // could lead to a DoS
        let capacity = len.min(0x1000);
        let mut buf = Vec::with_capacity(capacity);
        let limit = to_u64(len);
        (&mut self.inner).take(limit).read_to_end(&mut buf)?;

        if buf.len() >= len {
            self.pos += limit;
            Ok(buf)
        } else {
            Err(eof())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_read_tracks_position() {
        let mut src = SliceRead::new(&[1, 2, 3, 4, 5]);
        assert_eq!(src.read_bytes::<2>().expect("enough bytes"), [1, 2]);
        assert_eq!(src.position(), 2);
        assert_eq!(src.read_byte_opt().expect("one byte left"), Some(3));
        assert_eq!(src.read_byte_vec(2).expect("two bytes left"), vec![4, 5]);
        assert_eq!(src.position(), 5);
        assert_eq!(src.read_byte_opt().expect("eof is not an error"), None);
        assert_eq!(src.position(), 5, "eof probe does not advance");
    }

    #[test]
    fn slice_read_short_input_is_eof() {
        let mut src = SliceRead::new(&[1]);
        let err = src.read_bytes::<4>().expect_err("short input must fail");
        assert!(matches!(err, Error::Io(_)), "got {err:?}");
    }

    #[test]
    fn io_read_matches_slice_read() {
        let data = [9u8, 8, 7, 6];
        let mut src = IoRead::new(&data[..]);
        assert_eq!(src.read_byte_opt().expect("byte available"), Some(9));
        assert_eq!(src.read_bytes::<2>().expect("bytes available"), [8, 7]);
        assert_eq!(src.read_byte_vec(1).expect("byte available"), vec![6]);
        assert_eq!(src.position(), 4);
        assert_eq!(src.read_byte_opt().expect("eof is not an error"), None);
    }

    #[test]
    fn io_read_short_vec_is_eof() {
        let mut src = IoRead::new(&[1u8, 2][..]);
        let err = src.read_byte_vec(3).expect_err("short input must fail");
        assert!(matches!(err, Error::Io(_)), "got {err:?}");
    }
}
