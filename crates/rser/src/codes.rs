//! Wire tags and auxiliary code registries.
//!
//! Every value on the wire starts with a one-byte [`Tag`]. A handful of value
//! kinds carry a second one-byte code from a small auxiliary registry:
//! [`TypedArrayKind`], [`ErrorClass`], [`PathFormKind`] and
//! [`PathCollectionKind`].
//!
//! Mapping a kind to its code is total. Mapping a byte back to a kind is
//! partial and fails with a [`DecodeError`] naming the byte and its offset.

use crate::error::{DecodeError, DecodeErrorKind};

/// Format version written once at the start of every stream.
pub const VERSION: u32 = 1;

/// One-byte wire tag selecting a value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    StreamHeader = 0,
    MessageHeader = 1,
    String = 2,
    True = 3,
    False = 4,
    Null = 5,
    Undefined = 6,
    Nan = 7,
    PositiveZero = 8,
    NegativeZero = 9,
    PositiveOne = 10,
    NegativeOne = 11,
    PositiveInfinity = 12,
    NegativeInfinity = 13,
    Int8 = 14,
    Int16 = 15,
    Int32 = 16,
    Float = 17,
    BigIntAsInt = 18,
    BigInt64 = 19,
    Symbol = 20,
    Date = 21,
    Error = 22,
    RegExp = 23,
    Array = 24,
    Set = 25,
    Map = 26,
    Object = 27,
    TemplatedObjectArray = 28,
    IndexOne = 29,
    IndexZero = 30,
    Duration = 31,
    Path = 32,
    PathSet = 33,
    PathMap = 34,
    MixedPathSet = 35,
    MixedPathMap = 36,
    Reference = 37,
    DeclareReference = 38,
    ArrayBuffer = 39,
    ArrayBufferView = 40,
    Position = 41,
    SourceLocation = 42,
}

impl Tag {
    /// All tags, indexed by their code.
    const ALL: [Tag; 43] = [
        Tag::StreamHeader,
        Tag::MessageHeader,
        Tag::String,
        Tag::True,
        Tag::False,
        Tag::Null,
        Tag::Undefined,
        Tag::Nan,
        Tag::PositiveZero,
        Tag::NegativeZero,
        Tag::PositiveOne,
        Tag::NegativeOne,
        Tag::PositiveInfinity,
        Tag::NegativeInfinity,
        Tag::Int8,
        Tag::Int16,
        Tag::Int32,
        Tag::Float,
        Tag::BigIntAsInt,
        Tag::BigInt64,
        Tag::Symbol,
        Tag::Date,
        Tag::Error,
        Tag::RegExp,
        Tag::Array,
        Tag::Set,
        Tag::Map,
        Tag::Object,
        Tag::TemplatedObjectArray,
        Tag::IndexOne,
        Tag::IndexZero,
        Tag::Duration,
        Tag::Path,
        Tag::PathSet,
        Tag::PathMap,
        Tag::MixedPathSet,
        Tag::MixedPathMap,
        Tag::Reference,
        Tag::DeclareReference,
        Tag::ArrayBuffer,
        Tag::ArrayBufferView,
        Tag::Position,
        Tag::SourceLocation,
    ];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Resolves a tag byte read at `offset`.
    pub fn from_code(byte: u8, offset: usize) -> Result<Tag, DecodeError> {
        Tag::ALL
            .get(byte as usize)
            .copied()
            .ok_or_else(|| DecodeError::new(offset, DecodeErrorKind::UnknownTag(byte)))
    }

    /// Size of the fixed payload following a numeric tag, or `None` when the
    /// tag does not start a plain number.
    pub fn number_payload_size(self) -> Option<usize> {
        match self {
            Tag::Nan
            | Tag::PositiveZero
            | Tag::NegativeZero
            | Tag::PositiveOne
            | Tag::NegativeOne
            | Tag::PositiveInfinity
            | Tag::NegativeInfinity => Some(0),
            Tag::Int8 => Some(1),
            Tag::Int16 => Some(2),
            Tag::Int32 => Some(4),
            Tag::Float => Some(8),
            _ => None,
        }
    }

    /// Returns `true` for tags that may follow a reference declaration.
    pub(crate) fn is_referenceable(self) -> bool {
        matches!(
            self,
            Tag::Array
                | Tag::Set
                | Tag::Map
                | Tag::Object
                | Tag::TemplatedObjectArray
                | Tag::Error
                | Tag::RegExp
                | Tag::ArrayBuffer
                | Tag::ArrayBufferView
                | Tag::Path
                | Tag::PathSet
                | Tag::PathMap
                | Tag::MixedPathSet
                | Tag::MixedPathMap
        )
    }
}

/// A closed registry of one-byte codes.
///
/// Registries are tiny, so decoding is an ordered linear scan.
pub trait CodeRegistry: Copy + PartialEq + Sized + 'static {
    /// Human-readable registry name used in decode errors.
    const NAME: &'static str;
    /// Every member of the registry, in code order.
    const MEMBERS: &'static [Self];

    fn code(self) -> u8;

    fn from_code(byte: u8, offset: usize) -> Result<Self, DecodeError> {
        Self::MEMBERS
            .iter()
            .copied()
            .find(|member| member.code() == byte)
            .ok_or_else(|| {
                DecodeError::new(
                    offset,
                    DecodeErrorKind::UnknownCode {
                        registry: Self::NAME,
                        code: byte,
                    },
                )
            })
    }
}

/// Element kind of an array buffer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypedArrayKind {
    Int8 = 0,
    Uint8 = 1,
    Uint8Clamped = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Float32 = 7,
    Float64 = 8,
    BigInt64 = 9,
    BigUint64 = 10,
    DataView = 11,
}

impl TypedArrayKind {
    /// Size of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            TypedArrayKind::Int8
            | TypedArrayKind::Uint8
            | TypedArrayKind::Uint8Clamped
            | TypedArrayKind::DataView => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
            TypedArrayKind::Float64 | TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => 8,
        }
    }
}

impl CodeRegistry for TypedArrayKind {
    const NAME: &'static str = "array buffer view kind";
    const MEMBERS: &'static [Self] = &[
        TypedArrayKind::Int8,
        TypedArrayKind::Uint8,
        TypedArrayKind::Uint8Clamped,
        TypedArrayKind::Int16,
        TypedArrayKind::Uint16,
        TypedArrayKind::Int32,
        TypedArrayKind::Uint32,
        TypedArrayKind::Float32,
        TypedArrayKind::Float64,
        TypedArrayKind::BigInt64,
        TypedArrayKind::BigUint64,
        TypedArrayKind::DataView,
    ];

    fn code(self) -> u8 {
        self as u8
    }
}

/// Built-in error class of an encoded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorClass {
    Error = 0,
    EvalError = 1,
    RangeError = 2,
    ReferenceError = 3,
    SyntaxError = 4,
    TypeError = 5,
    UriError = 6,
}

impl ErrorClass {
    /// Default `name` of errors of this class.
    pub fn name(self) -> &'static str {
        match self {
            ErrorClass::Error => "Error",
            ErrorClass::EvalError => "EvalError",
            ErrorClass::RangeError => "RangeError",
            ErrorClass::ReferenceError => "ReferenceError",
            ErrorClass::SyntaxError => "SyntaxError",
            ErrorClass::TypeError => "TypeError",
            ErrorClass::UriError => "URIError",
        }
    }
}

impl CodeRegistry for ErrorClass {
    const NAME: &'static str = "error class";
    const MEMBERS: &'static [Self] = &[
        ErrorClass::Error,
        ErrorClass::EvalError,
        ErrorClass::RangeError,
        ErrorClass::ReferenceError,
        ErrorClass::SyntaxError,
        ErrorClass::TypeError,
        ErrorClass::UriError,
    ];

    fn code(self) -> u8 {
        self as u8
    }
}

/// Parsed form of a path value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PathFormKind {
    AbsoluteUnix = 0,
    AbsoluteWindowsDrive = 1,
    AbsoluteWindowsUnc = 2,
    Relative = 3,
    Url = 4,
    Uid = 5,
    DataUri = 6,
}

impl PathFormKind {
    /// Collection kind that paths of this form belong to.
    pub fn collection_kind(self) -> PathCollectionKind {
        match self {
            PathFormKind::AbsoluteUnix
            | PathFormKind::AbsoluteWindowsDrive
            | PathFormKind::AbsoluteWindowsUnc => PathCollectionKind::Absolute,
            PathFormKind::Relative => PathCollectionKind::Relative,
            PathFormKind::Url => PathCollectionKind::Url,
            PathFormKind::Uid => PathCollectionKind::Uid,
            PathFormKind::DataUri => PathCollectionKind::DataUri,
        }
    }
}

impl CodeRegistry for PathFormKind {
    const NAME: &'static str = "path form";
    const MEMBERS: &'static [Self] = &[
        PathFormKind::AbsoluteUnix,
        PathFormKind::AbsoluteWindowsDrive,
        PathFormKind::AbsoluteWindowsUnc,
        PathFormKind::Relative,
        PathFormKind::Url,
        PathFormKind::Uid,
        PathFormKind::DataUri,
    ];

    fn code(self) -> u8 {
        self as u8
    }
}

/// Kind shared by all members of a homogeneous path collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PathCollectionKind {
    Absolute = 0,
    Relative = 1,
    Url = 2,
    Uid = 3,
    DataUri = 4,
}

impl CodeRegistry for PathCollectionKind {
    const NAME: &'static str = "path collection kind";
    const MEMBERS: &'static [Self] = &[
        PathCollectionKind::Absolute,
        PathCollectionKind::Relative,
        PathCollectionKind::Url,
        PathCollectionKind::Uid,
        PathCollectionKind::DataUri,
    ];

    fn code(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_codes_are_dense() {
        for (i, tag) in Tag::ALL.iter().enumerate() {
            assert_eq!(tag.code() as usize, i);
            assert_eq!(Tag::from_code(tag.code(), 0).unwrap(), *tag);
        }
    }

    #[test]
    fn unknown_tag_names_byte_and_offset() {
        let err = Tag::from_code(0xfe, 17).unwrap_err();
        assert_eq!(err.offset, 17);
        assert_eq!(err.kind, DecodeErrorKind::UnknownTag(0xfe));
    }

    #[test]
    fn auxiliary_registries_round_trip() {
        for kind in TypedArrayKind::MEMBERS {
            assert_eq!(TypedArrayKind::from_code(kind.code(), 0).unwrap(), *kind);
        }
        for class in ErrorClass::MEMBERS {
            assert_eq!(ErrorClass::from_code(class.code(), 0).unwrap(), *class);
        }
        for form in PathFormKind::MEMBERS {
            assert_eq!(PathFormKind::from_code(form.code(), 0).unwrap(), *form);
        }
        for kind in PathCollectionKind::MEMBERS {
            assert_eq!(PathCollectionKind::from_code(kind.code(), 0).unwrap(), *kind);
        }
    }

    #[test]
    fn unknown_auxiliary_code_names_registry() {
        let err = ErrorClass::from_code(42, 3).unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::UnknownCode {
                registry: "error class",
                code: 42
            }
        );
        assert!(TypedArrayKind::from_code(12, 0).is_err());
        assert!(PathCollectionKind::from_code(5, 0).is_err());
    }

    #[test]
    fn windows_forms_collect_as_absolute() {
        assert_eq!(
            PathFormKind::AbsoluteWindowsUnc.collection_kind(),
            PathCollectionKind::Absolute
        );
        assert_eq!(
            PathFormKind::DataUri.collection_kind(),
            PathCollectionKind::DataUri
        );
    }
}
