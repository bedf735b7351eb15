//! Binary buffer reader with cursor tracking.

use std::str;

use crate::BufferError;

/// A little-endian binary reader over an immutable byte slice.
///
/// Every read is bounds-checked and leaves the cursor untouched when it
/// fails, so callers can rewind or report the offset of the failed read.
///
/// # Example
///
/// ```
/// use rser_buffers::Reader;
///
/// let data = [0x01, 0x03, 0x02];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.u8(), Ok(0x01));
/// assert_eq!(reader.i16(), Ok(0x0203));
/// ```
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Total length of the underlying buffer.
    pub fn byte_length(&self) -> usize {
        self.uint8.len()
    }

    /// Returns the number of remaining bytes.
    pub fn remaining(&self) -> usize {
        self.uint8.len() - self.x
    }

    /// Returns `true` when at least `n` more bytes can be read.
    #[inline]
    pub fn has(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Moves the cursor to an absolute offset.
    ///
    /// Offsets past the end are clamped to the buffer length.
    pub fn seek(&mut self, offset: usize) {
        self.x = offset.min(self.uint8.len());
    }

    /// Advances the cursor by `length` bytes.
    pub fn skip(&mut self, length: usize) -> Result<(), BufferError> {
        self.check(length)?;
        self.x += length;
        Ok(())
    }

    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        if self.has(n) {
            Ok(())
        } else {
            Err(BufferError::EndOfBuffer {
                offset: self.x,
                needed: n,
                len: self.uint8.len(),
            })
        }
    }

    #[inline]
    fn array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        self.check(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.uint8[self.x..self.x + N]);
        self.x += N;
        Ok(out)
    }

    /// Peeks at the current byte without advancing.
    pub fn peek(&self) -> Result<u8, BufferError> {
        self.check(1)?;
        Ok(self.uint8[self.x])
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        let val = self.uint8[self.x];
        self.x += 1;
        Ok(val)
    }

    /// Reads a signed 8-bit integer.
    #[inline]
    pub fn i8(&mut self) -> Result<i8, BufferError> {
        self.u8().map(|v| v as i8)
    }

    /// Reads a signed 16-bit little-endian integer.
    #[inline]
    pub fn i16(&mut self) -> Result<i16, BufferError> {
        self.array().map(i16::from_le_bytes)
    }

    /// Reads a signed 32-bit little-endian integer.
    #[inline]
    pub fn i32(&mut self) -> Result<i32, BufferError> {
        self.array().map(i32::from_le_bytes)
    }

    /// Reads a signed 64-bit little-endian integer.
    #[inline]
    pub fn i64(&mut self) -> Result<i64, BufferError> {
        self.array().map(i64::from_le_bytes)
    }

    /// Reads a 64-bit little-endian float.
    #[inline]
    pub fn f64(&mut self) -> Result<f64, BufferError> {
        self.array().map(f64::from_le_bytes)
    }

    /// Reads `size` raw bytes and advances the cursor.
    pub fn buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.check(size)?;
        let start = self.x;
        self.x += size;
        Ok(&self.uint8[start..self.x])
    }

    /// Reads a UTF-8 string of `size` bytes.
    ///
    /// On invalid UTF-8 the cursor is not advanced.
    pub fn utf8(&mut self, size: usize) -> Result<&'a str, BufferError> {
        self.check(size)?;
        let start = self.x;
        let text = str::from_utf8(&self.uint8[start..start + size])
            .map_err(|_| BufferError::InvalidUtf8 { offset: start })?;
        self.x += size;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Writer;

    #[test]
    fn test_u8() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.u8(), Ok(0x01));
        assert_eq!(reader.u8(), Ok(0x02));
        assert_eq!(reader.u8(), Ok(0x03));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_u8_end_of_buffer() {
        let data: [u8; 0] = [];
        let mut reader = Reader::new(&data);
        assert_eq!(
            reader.u8(),
            Err(BufferError::EndOfBuffer {
                offset: 0,
                needed: 1,
                len: 0
            })
        );
        assert_eq!(reader.x, 0);
    }

    #[test]
    fn test_i16_partial() {
        let data = [0x01u8];
        let mut reader = Reader::new(&data);
        assert!(reader.i16().is_err());
        assert_eq!(reader.x, 0);
    }

    #[test]
    fn test_integers_written_by_writer() {
        let mut writer = Writer::new();
        writer.i8(-5);
        writer.i16(-1000);
        writer.i32(-123_456);
        writer.i64(-9_999_999_999);
        writer.f64(std::f64::consts::PI);
        let data = writer.flush();
        let mut reader = Reader::new(&data);
        assert_eq!(reader.i8(), Ok(-5));
        assert_eq!(reader.i16(), Ok(-1000));
        assert_eq!(reader.i32(), Ok(-123_456));
        assert_eq!(reader.i64(), Ok(-9_999_999_999));
        assert_eq!(reader.f64(), Ok(std::f64::consts::PI));
    }

    #[test]
    fn test_i64_end_of_buffer() {
        let data = [0u8; 7];
        let mut reader = Reader::new(&data);
        assert!(matches!(
            reader.i64(),
            Err(BufferError::EndOfBuffer { needed: 8, .. })
        ));
        assert_eq!(reader.x, 0);
    }

    #[test]
    fn test_buf_and_skip() {
        let data = [1u8, 2, 3, 4, 5];
        let mut reader = Reader::new(&data);
        reader.skip(1).unwrap();
        assert_eq!(reader.buf(3), Ok([2u8, 3, 4].as_ref()));
        assert_eq!(reader.x, 4);
        assert!(reader.buf(2).is_err());
        assert_eq!(reader.x, 4);
    }

    #[test]
    fn test_utf8() {
        let data = b"hello world";
        let mut reader = Reader::new(data);
        assert_eq!(reader.utf8(5), Ok("hello"));
        assert_eq!(reader.utf8(6), Ok(" world"));
    }

    #[test]
    fn test_utf8_invalid() {
        let data = [0xffu8, 0xfe];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.utf8(2), Err(BufferError::InvalidUtf8 { offset: 0 }));
        assert_eq!(reader.x, 0);
    }

    #[test]
    fn test_peek_and_seek() {
        let data = [0x55u8, 0x66];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.peek(), Ok(0x55));
        assert_eq!(reader.x, 0);
        reader.seek(1);
        assert_eq!(reader.peek(), Ok(0x66));
        reader.seek(10);
        assert_eq!(reader.x, 2);
        assert!(reader.peek().is_err());
    }
}
