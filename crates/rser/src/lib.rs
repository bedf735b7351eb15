//! RSER: a compact binary codec for structured values.
//!
//! Values cross a process boundary as a stream: one stream header carrying
//! the format [`VERSION`], then length-prefixed messages each holding one
//! [`Value`]. Objects that appear more than once in a message, including
//! cyclic ones, are written once and referred to afterwards.
//!
//! ```
//! use rser::{codec, CodecConfig, SymbolRegistry, Value};
//!
//! let config = CodecConfig::default();
//! let mut symbols = SymbolRegistry::new();
//!
//! let shared = Value::object([("id", Value::from(7))]);
//! let value = Value::array([shared.clone(), shared]);
//!
//! let bytes = codec::encode_message(&value, &symbols, &config).unwrap();
//! let decoded = codec::decode_message(&bytes, &mut symbols, &config).unwrap();
//!
//! assert_eq!(decoded, value);
//! assert!(decoded.at(0).unwrap().ptr_eq(&decoded.at(1).unwrap()));
//! ```

pub mod codec;
pub mod codes;
mod config;
pub mod decoder;
pub mod encoder;
mod error;
mod error_value;
mod path;
pub mod sink;
pub mod stream;
mod symbols;
mod units;
mod value;

pub use codec::RserCodec;
pub use codes::{
    CodeRegistry, ErrorClass, PathCollectionKind, PathFormKind, Tag, TypedArrayKind, VERSION,
};
pub use config::{CodecConfig, KeyCacheConfig};
pub use decoder::{RserDecoder, StreamHeaderStatus};
pub use encoder::{ReferencePlan, RserEncoder};
pub use error::{ConfigError, DecodeError, DecodeErrorKind, EncodeError, StreamError};
pub use error_value::{ErrorStructure, ErrorValue, StackFrame, SystemErrorProps};
pub use path::{Path, PathError, PathForm, PathMap, PathSet, UrlParts};
pub use symbols::{Symbol, SymbolRegistry};
pub use units::{Duration, OneIndexed, Position, SourceLocation, ZeroIndexed};
pub use value::{ArrayBufferView, RegExp, Shared, Value};
