//! Error types for RSER encoding and decoding.

use rser_buffers::BufferError;
use thiserror::Error;

use crate::codes::Tag;
use crate::path::PathError;
use crate::symbols::Symbol;

/// A fatal decode failure.
///
/// Carries the byte offset where decoding stopped and what was expected
/// there. The whole message is abandoned; nothing is recovered.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind} at offset {offset}")]
pub struct DecodeError {
    pub offset: usize,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(offset: usize, kind: DecodeErrorKind) -> Self {
        Self { offset, kind }
    }

    pub(crate) fn unexpected_tag(offset: usize, expected: &'static str, found: Tag) -> Self {
        Self::new(offset, DecodeErrorKind::UnexpectedTag { expected, found })
    }

    pub(crate) fn invalid(offset: usize, expected: &'static str, found: impl ToString) -> Self {
        Self::new(
            offset,
            DecodeErrorKind::Invalid {
                expected,
                found: found.to_string(),
            },
        )
    }
}

impl From<BufferError> for DecodeError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer {
                offset,
                needed,
                len,
            } => DecodeError::new(
                offset,
                DecodeErrorKind::EndOfBuffer {
                    needed,
                    available: len.saturating_sub(offset),
                },
            ),
            BufferError::InvalidUtf8 { offset } => {
                DecodeError::new(offset, DecodeErrorKind::InvalidUtf8)
            }
        }
    }
}

/// What went wrong while decoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeErrorKind {
    #[error("needed {needed} bytes but only {available} are available")]
    EndOfBuffer { needed: usize, available: usize },
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("unknown tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("unknown {registry} code {code}")]
    UnknownCode { registry: &'static str, code: u8 },
    #[error("expected {expected} but found tag {found:?}")]
    UnexpectedTag { expected: &'static str, found: Tag },
    #[error("did not expect a 64-bit integer")]
    Unexpected64BitInteger,
    #[error("expected {expected} but found {found}")]
    Invalid { expected: &'static str, found: String },
    #[error("reference {0} was never declared")]
    UnknownReference(u32),
    #[error("reference {0} points at a value that is still being decoded")]
    PendingReference(u32),
    #[error("reference {id} declared out of order, expected {expected}")]
    OutOfOrderDeclaration { id: u32, expected: u32 },
    #[error("expected {expected} but reference resolved to {found}")]
    ReferenceType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("{0}")]
    Path(PathError),
    #[error("unknown {context} property {key:?}")]
    UnknownProperty { context: &'static str, key: String },
    #[error("message declared {declared} bytes but its value used {consumed}")]
    LengthMismatch { declared: usize, consumed: usize },
    #[error("containers nested deeper than {0} levels")]
    TooDeep(usize),
}

/// An encode-time programmer error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("symbol {0:?} is not registered and cannot be encoded")]
    UnregisteredSymbol(Symbol),
    #[error("bigint {0} does not fit in 64 bits")]
    BigIntOutOfRange(i128),
    #[error("length {0} exceeds the 32-bit wire limit")]
    LengthOverflow(usize),
    #[error("containers nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Invalid codec configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Failure while reading a framed stream.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    #[error("stream header is missing or has an incompatible version")]
    Incompatible,
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
