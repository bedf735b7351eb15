//! Output sinks for the encoder.
//!
//! The encoder runs the same emission twice: once into a [`CountingSink`] to
//! learn the exact payload size for the message header, then into a
//! [`Writer`] for the real bytes.

use rser_buffers::Writer;

/// Width of a fixed-size integer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntSize {
    I8,
    I16,
    I32,
    I64,
}

impl IntSize {
    pub fn bytes(self) -> usize {
        match self {
            IntSize::I8 => 1,
            IntSize::I16 => 2,
            IntSize::I32 => 4,
            IntSize::I64 => 8,
        }
    }
}

/// Destination of encoded bytes.
pub trait Sink {
    fn write_byte(&mut self, byte: u8);

    /// Writes `value` truncated to `size` bytes, little-endian.
    fn write_int(&mut self, value: i64, size: IntSize);

    fn write_float(&mut self, value: f64);

    /// Writes the UTF-8 bytes of `text`. `byte_len` is `text.len()`, already
    /// computed by the caller for the length prefix.
    fn write_string(&mut self, text: &str, byte_len: usize);

    fn write_bytes(&mut self, bytes: &[u8]);
}

/// A sink that only counts bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CountingSink {
    len: usize,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Sink for CountingSink {
    #[inline]
    fn write_byte(&mut self, _byte: u8) {
        self.len += 1;
    }

    #[inline]
    fn write_int(&mut self, _value: i64, size: IntSize) {
        self.len += size.bytes();
    }

    #[inline]
    fn write_float(&mut self, _value: f64) {
        self.len += 8;
    }

    #[inline]
    fn write_string(&mut self, _text: &str, byte_len: usize) {
        self.len += byte_len;
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }
}

impl Sink for Writer {
    #[inline]
    fn write_byte(&mut self, byte: u8) {
        self.u8(byte);
    }

    fn write_int(&mut self, value: i64, size: IntSize) {
        match size {
            IntSize::I8 => self.i8(value as i8),
            IntSize::I16 => self.i16(value as i16),
            IntSize::I32 => self.i32(value as i32),
            IntSize::I64 => self.i64(value),
        }
    }

    #[inline]
    fn write_float(&mut self, value: f64) {
        self.f64(value);
    }

    #[inline]
    fn write_string(&mut self, text: &str, _byte_len: usize) {
        self.utf8(text);
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit<S: Sink>(sink: &mut S) {
        sink.write_byte(1);
        sink.write_int(-2, IntSize::I16);
        sink.write_int(300, IntSize::I32);
        sink.write_float(0.5);
        sink.write_string("héllo", "héllo".len());
        sink.write_bytes(&[9, 9]);
    }

    #[test]
    fn counting_sink_matches_writer() {
        let mut counter = CountingSink::new();
        let mut writer = Writer::with_alloc_size(4);
        emit(&mut counter);
        emit(&mut writer);
        let bytes = writer.flush();
        assert_eq!(counter.len(), bytes.len());
        assert_eq!(&bytes[..3], &[1, 0xfe, 0xff]);
        assert_eq!(&bytes[3..7], &300i32.to_le_bytes());
    }
}
