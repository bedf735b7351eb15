//! Byte buffers for the RSER codec.
//!
//! [`Writer`] is an auto-growing output buffer and [`Reader`] a cursor over an
//! immutable byte slice. Both use little-endian byte order for every
//! multi-byte integer and float.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

use thiserror::Error;

/// Errors raised by the bounds-checked [`Reader`] methods.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The read would go past the end of the buffer.
    #[error("read of {needed} bytes at offset {offset} exceeds buffer of {len} bytes")]
    EndOfBuffer {
        offset: usize,
        needed: usize,
        len: usize,
    },
    /// The bytes are not valid UTF-8.
    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },
}

impl BufferError {
    /// Offset of the read that failed.
    pub fn offset(&self) -> usize {
        match self {
            BufferError::EndOfBuffer { offset, .. } | BufferError::InvalidUtf8 { offset } => {
                *offset
            }
        }
    }
}
