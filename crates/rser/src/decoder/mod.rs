//! `RserDecoder` reads RSER bytes back into [`Value`]s.
//!
//! A decoder is a cursor over an immutable byte slice plus the reference
//! table of the message being read. The two framing probes tolerate a
//! truncated buffer and rewind; everything else assumes the whole message is
//! present and fails with a [`DecodeError`] otherwise.

mod domain;
mod key_cache;
mod references;

use std::cell::RefCell;
use std::rc::Rc;

use rser_buffers::Reader;

use crate::codes::Tag;
use crate::config::CodecConfig;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::symbols::SymbolRegistry;
use crate::value::Value;

use key_cache::KeyCache;
use references::ReferenceTable;

/// Outcome of probing for a stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamHeaderStatus {
    /// Not enough bytes yet. The cursor was not moved.
    Incomplete,
    /// Not a stream header, or a different format version.
    Incompatible,
    Valid,
}

/// Single-message decoder.
pub struct RserDecoder<'a, 's> {
    reader: Reader<'a>,
    symbols: &'s mut SymbolRegistry,
    references: ReferenceTable,
    peeked: Option<(Tag, usize)>,
    keys: KeyCache,
    depth: usize,
    max_depth: usize,
}

impl<'a, 's> RserDecoder<'a, 's> {
    pub fn new(bytes: &'a [u8], symbols: &'s mut SymbolRegistry, config: &CodecConfig) -> Self {
        Self {
            reader: Reader::new(bytes),
            symbols,
            references: ReferenceTable::default(),
            peeked: None,
            keys: KeyCache::new(config.key_cache),
            depth: 0,
            max_depth: config.max_depth,
        }
    }

    /// Current read offset.
    pub fn offset(&self) -> usize {
        self.reader.x
    }

    pub fn remaining(&self) -> usize {
        self.reader.remaining()
    }

    pub fn is_at_end(&self) -> bool {
        self.reader.remaining() == 0
    }

    /// Number of references declared so far in this message.
    pub fn declared_references(&self) -> usize {
        self.references.len()
    }

    fn rewind(&mut self, offset: usize) {
        self.reader.seek(offset);
        self.peeked = None;
    }

    /// Returns the tag at the cursor without consuming it.
    pub(crate) fn peek_tag(&mut self) -> Result<Tag, DecodeError> {
        let offset = self.reader.x;
        if let Some((tag, at)) = self.peeked {
            if at == offset {
                return Ok(tag);
            }
        }
        let tag = Tag::from_code(self.reader.peek()?, offset)?;
        self.peeked = Some((tag, offset));
        Ok(tag)
    }

    /// Consumes the tag at the cursor. Returns it with its offset.
    pub(crate) fn read_tag(&mut self) -> Result<(Tag, usize), DecodeError> {
        let offset = self.reader.x;
        let tag = self.peek_tag()?;
        self.reader.skip(1)?;
        self.peeked = None;
        Ok((tag, offset))
    }

    pub(crate) fn expect_tag(&mut self, expected: Tag, what: &'static str) -> Result<usize, DecodeError> {
        let (tag, offset) = self.read_tag()?;
        if tag != expected {
            return Err(DecodeError::unexpected_tag(offset, what, tag));
        }
        Ok(offset)
    }

    pub(crate) fn read_byte(&mut self) -> Result<(u8, usize), DecodeError> {
        let offset = self.reader.x;
        Ok((self.reader.u8()?, offset))
    }

    /// Probes for a stream header carrying `version`.
    ///
    /// On `Incomplete` the cursor is left where it was, so the probe can be
    /// repeated once more bytes arrive.
    pub fn maybe_decode_stream_header(&mut self, version: u32) -> StreamHeaderStatus {
        let start = self.reader.x;
        let status = self.probe_stream_header(version);
        if status != StreamHeaderStatus::Valid {
            self.rewind(start);
        }
        tracing::trace!(?status, offset = start, "stream header probe");
        status
    }

    fn probe_stream_header(&mut self, version: u32) -> StreamHeaderStatus {
        let Ok(byte) = self.reader.peek() else {
            return StreamHeaderStatus::Incomplete;
        };
        if byte != Tag::StreamHeader.code() {
            return StreamHeaderStatus::Incompatible;
        }
        self.reader.x += 1;
        let Ok(byte) = self.reader.peek() else {
            return StreamHeaderStatus::Incomplete;
        };
        let Some(size) = Tag::from_code(byte, self.reader.x)
            .ok()
            .and_then(Tag::number_payload_size)
        else {
            return StreamHeaderStatus::Incompatible;
        };
        if !self.reader.has(1 + size) {
            return StreamHeaderStatus::Incomplete;
        }
        match self.decode_number() {
            Ok(found) if found == f64::from(version) => StreamHeaderStatus::Valid,
            Ok(found) => {
                tracing::warn!(expected = version, found, "stream version mismatch");
                StreamHeaderStatus::Incompatible
            }
            Err(_) => StreamHeaderStatus::Incompatible,
        }
    }

    /// Probes for a message header and returns the payload length.
    ///
    /// Returns `Ok(None)` with the cursor rewound while the length prefix is
    /// incomplete, and an error when the bytes are not a message header.
    pub fn maybe_decode_message_header(&mut self) -> Result<Option<usize>, DecodeError> {
        let start = self.reader.x;
        if !self.reader.has(1) {
            return Ok(None);
        }
        self.expect_tag(Tag::MessageHeader, "message header")?;
        if !self.reader.has(1) {
            self.rewind(start);
            return Ok(None);
        }
        let tag = self.peek_tag()?;
        let size = tag
            .number_payload_size()
            .ok_or_else(|| DecodeError::unexpected_tag(self.reader.x, "message length", tag))?;
        if !self.reader.has(1 + size) {
            self.rewind(start);
            tracing::trace!(offset = start, "message header incomplete");
            return Ok(None);
        }
        let len = self.decode_len()?;
        tracing::trace!(len, offset = start, "message header");
        Ok(Some(len))
    }

    /// Reads a message header, failing if it is truncated.
    pub fn decode_message_header(&mut self) -> Result<usize, DecodeError> {
        self.expect_tag(Tag::MessageHeader, "message header")?;
        self.decode_len()
    }

    /// Decodes one message payload of `len` bytes.
    pub fn decode_message_payload(&mut self, len: usize) -> Result<Value, DecodeError> {
        let start = self.reader.x;
        if !self.reader.has(len) {
            return Err(DecodeError::new(
                start,
                DecodeErrorKind::EndOfBuffer {
                    needed: len,
                    available: self.reader.remaining(),
                },
            ));
        }
        let value = self.decode_value()?;
        let consumed = self.reader.x - start;
        if consumed != len {
            return Err(DecodeError::new(
                start,
                DecodeErrorKind::LengthMismatch {
                    declared: len,
                    consumed,
                },
            ));
        }
        Ok(value)
    }

    /// Decodes a whole framed message if it is fully buffered.
    ///
    /// Returns `Ok(None)` and leaves the cursor in place when the header or
    /// the payload is still incomplete.
    pub fn decode_message(&mut self) -> Result<Option<Value>, DecodeError> {
        let start = self.reader.x;
        let Some(len) = self.maybe_decode_message_header()? else {
            return Ok(None);
        };
        if !self.reader.has(len) {
            self.rewind(start);
            return Ok(None);
        }
        self.decode_message_payload(len).map(Some)
    }

    pub fn decode_value(&mut self) -> Result<Value, DecodeError> {
        let tag = self.peek_tag()?;
        match tag {
            Tag::Reference => {
                let (_, offset) = self.read_tag()?;
                let id = self.decode_id()?;
                self.references.assert(id, offset)
            }
            Tag::DeclareReference => {
                let (_, offset) = self.read_tag()?;
                let id = self.decode_id()?;
                self.references.declare(id, offset)?;
                let tag = self.peek_tag()?;
                if !tag.is_referenceable() {
                    return Err(DecodeError::unexpected_tag(
                        self.reader.x,
                        "referenceable value",
                        tag,
                    ));
                }
                let value = self.decode_tagged(tag, Some(id))?;
                self.references.fill(id, &value);
                Ok(value)
            }
            _ => self.decode_tagged(tag, None),
        }
    }

    /// Decodes the value starting with `tag`, registering containers under
    /// `declared` before their members are read.
    fn decode_tagged(&mut self, tag: Tag, declared: Option<u32>) -> Result<Value, DecodeError> {
        if !matches!(
            tag,
            Tag::Array
                | Tag::Set
                | Tag::Map
                | Tag::Object
                | Tag::TemplatedObjectArray
                | Tag::PathMap
                | Tag::MixedPathMap
        ) {
            return self.decode_leaf(tag);
        }
        if self.depth >= self.max_depth {
            return Err(DecodeError::new(
                self.reader.x,
                DecodeErrorKind::TooDeep(self.max_depth),
            ));
        }
        self.depth += 1;
        let value = match tag {
            Tag::Array => self.decode_array(declared),
            Tag::Set => self.decode_set(declared),
            Tag::Map => self.decode_map(declared),
            Tag::Object => self.decode_object(declared),
            Tag::TemplatedObjectArray => self.decode_templated_object_array(declared),
            _ => self.decode_path_map(declared),
        };
        self.depth -= 1;
        value
    }

    fn decode_leaf(&mut self, tag: Tag) -> Result<Value, DecodeError> {
        match tag {
            Tag::String => self.decode_string().map(Value::String),
            Tag::True | Tag::False | Tag::Null | Tag::Undefined => {
                self.read_tag()?;
                Ok(match tag {
                    Tag::True => Value::Bool(true),
                    Tag::False => Value::Bool(false),
                    Tag::Null => Value::Null,
                    _ => Value::Undefined,
                })
            }
            Tag::BigIntAsInt | Tag::BigInt64 => self.decode_bigint().map(Value::BigInt),
            Tag::Symbol => self.decode_symbol().map(Value::Symbol),
            Tag::Date => self.decode_date().map(Value::Date),
            Tag::RegExp => self.decode_regexp().map(|re| Value::RegExp(Rc::new(re))),
            Tag::Error => self.decode_error().map(|err| Value::Error(Rc::new(err))),
            Tag::IndexOne => self.decode_one_indexed().map(Value::OneIndexed),
            Tag::IndexZero => self.decode_zero_indexed().map(Value::ZeroIndexed),
            Tag::Duration => self.decode_duration().map(Value::Duration),
            Tag::Position => self.decode_position().map(Value::Position),
            Tag::SourceLocation => self.decode_source_location().map(Value::SourceLocation),
            Tag::Path => self.decode_path_body().map(Value::Path),
            Tag::PathSet | Tag::MixedPathSet => {
                self.decode_path_set().map(|set| Value::PathSet(Rc::new(set)))
            }
            Tag::ArrayBuffer => self.decode_array_buffer(),
            Tag::ArrayBufferView => self
                .decode_array_buffer_view()
                .map(|view| Value::ArrayBufferView(Rc::new(view))),
            _ if tag.number_payload_size().is_some() => self.decode_number().map(Value::Number),
            _ => Err(DecodeError::unexpected_tag(self.reader.x, "value", tag)),
        }
    }

    fn register(&mut self, declared: Option<u32>, value: &Value) {
        if let Some(id) = declared {
            self.references.fill(id, value);
        }
    }

    /// Reads a number from its tag and payload.
    pub fn decode_number(&mut self) -> Result<f64, DecodeError> {
        let (tag, offset) = self.read_tag()?;
        self.decode_number_payload(tag, offset)
    }

    fn decode_number_payload(&mut self, tag: Tag, offset: usize) -> Result<f64, DecodeError> {
        Ok(match tag {
            Tag::Nan => f64::NAN,
            Tag::PositiveZero => 0.0,
            Tag::NegativeZero => -0.0,
            Tag::PositiveOne => 1.0,
            Tag::NegativeOne => -1.0,
            Tag::PositiveInfinity => f64::INFINITY,
            Tag::NegativeInfinity => f64::NEG_INFINITY,
            Tag::Int8 => f64::from(self.reader.i8()?),
            Tag::Int16 => f64::from(self.reader.i16()?),
            Tag::Int32 => f64::from(self.reader.i32()?),
            Tag::Float => self.reader.f64()?,
            Tag::BigInt64 => {
                return Err(DecodeError::new(
                    offset,
                    DecodeErrorKind::Unexpected64BitInteger,
                ))
            }
            _ => return Err(DecodeError::unexpected_tag(offset, "number", tag)),
        })
    }

    /// Reads a number that must be a whole value in `min..=max`.
    pub(crate) fn decode_integer(
        &mut self,
        what: &'static str,
        min: f64,
        max: f64,
    ) -> Result<i64, DecodeError> {
        let offset = self.reader.x;
        let n = self.decode_number()?;
        if n.fract() != 0.0 || n < min || n > max {
            return Err(DecodeError::invalid(offset, what, n));
        }
        Ok(n as i64)
    }

    /// Reads a length or count.
    pub(crate) fn decode_len(&mut self) -> Result<usize, DecodeError> {
        self.decode_integer("length", 0.0, f64::from(i32::MAX))
            .map(|n| n as usize)
    }

    /// Capacity to reserve for `len` items, capped by the bytes left.
    fn capacity_for(&self, len: usize) -> usize {
        len.min(self.reader.remaining())
    }

    fn decode_id(&mut self) -> Result<u32, DecodeError> {
        self.decode_integer("reference id", 0.0, f64::from(u32::MAX))
            .map(|n| n as u32)
    }

    pub fn decode_bigint(&mut self) -> Result<i128, DecodeError> {
        let (tag, offset) = self.read_tag()?;
        match tag {
            Tag::BigIntAsInt => {
                let at = self.reader.x;
                let n = self.decode_number()?;
                if n.fract() != 0.0 || n.abs() > f64::from(i32::MAX) {
                    return Err(DecodeError::invalid(at, "32-bit bigint", n));
                }
                Ok(n as i128)
            }
            Tag::BigInt64 => Ok(i128::from(self.reader.i64()?)),
            _ => Err(DecodeError::unexpected_tag(offset, "bigint", tag)),
        }
    }

    /// Reads a string without its tag.
    pub(crate) fn decode_string_body(&mut self) -> Result<String, DecodeError> {
        let len = self.decode_len()?;
        Ok(self.reader.utf8(len)?.to_owned())
    }

    pub fn decode_string(&mut self) -> Result<String, DecodeError> {
        self.expect_tag(Tag::String, "string")?;
        self.decode_string_body()
    }

    /// Reads `undefined` as `None` or a tagged string.
    pub(crate) fn decode_optional_string(&mut self) -> Result<Option<String>, DecodeError> {
        match self.peek_tag()? {
            Tag::Undefined => {
                self.read_tag()?;
                Ok(None)
            }
            Tag::String => self.decode_string().map(Some),
            tag => Err(DecodeError::unexpected_tag(
                self.reader.x,
                "string or undefined",
                tag,
            )),
        }
    }

    /// Reads an untagged key through the key cache.
    pub(crate) fn decode_key(&mut self) -> Result<String, DecodeError> {
        let len = self.decode_len()?;
        let offset = self.reader.x;
        let bytes = self.reader.buf(len)?;
        self.keys.key(bytes, offset)
    }

    fn decode_array(&mut self, declared: Option<u32>) -> Result<Value, DecodeError> {
        self.expect_tag(Tag::Array, "array")?;
        let len = self.decode_len()?;
        let items = Rc::new(RefCell::new(Vec::with_capacity(self.capacity_for(len))));
        self.register(declared, &Value::Array(items.clone()));
        for _ in 0..len {
            let item = self.decode_value()?;
            items.borrow_mut().push(item);
        }
        Ok(Value::Array(items))
    }

    fn decode_set(&mut self, declared: Option<u32>) -> Result<Value, DecodeError> {
        self.expect_tag(Tag::Set, "set")?;
        let len = self.decode_len()?;
        let items = Rc::new(RefCell::new(Vec::with_capacity(self.capacity_for(len))));
        self.register(declared, &Value::Set(items.clone()));
        for _ in 0..len {
            let item = self.decode_value()?;
            items.borrow_mut().push(item);
        }
        Ok(Value::Set(items))
    }

    fn decode_map(&mut self, declared: Option<u32>) -> Result<Value, DecodeError> {
        self.expect_tag(Tag::Map, "map")?;
        let len = self.decode_len()?;
        let entries = Rc::new(RefCell::new(Vec::with_capacity(self.capacity_for(len))));
        self.register(declared, &Value::Map(entries.clone()));
        for _ in 0..len {
            let key = self.decode_value()?;
            let value = self.decode_value()?;
            entries.borrow_mut().push((key, value));
        }
        Ok(Value::Map(entries))
    }

    fn decode_object(&mut self, declared: Option<u32>) -> Result<Value, DecodeError> {
        self.expect_tag(Tag::Object, "object")?;
        let len = self.decode_len()?;
        let entries = Rc::new(RefCell::new(Vec::with_capacity(self.capacity_for(len))));
        self.register(declared, &Value::Object(entries.clone()));
        for _ in 0..len {
            let key = self.decode_key()?;
            let value = self.decode_value()?;
            entries.borrow_mut().push((key, value));
        }
        Ok(Value::Object(entries))
    }

    /// Reads the header of a templated object array: row count and keys.
    /// Rows without keys carry no bytes, so a non-empty row count needs at
    /// least one key.
    pub(crate) fn decode_template_header(&mut self) -> Result<(usize, Vec<String>), DecodeError> {
        let rows = self.decode_len()?;
        let key_offset = self.reader.x;
        let key_count = self.decode_len()?;
        if rows > 0 && key_count == 0 {
            return Err(DecodeError::invalid(
                key_offset,
                "template keys",
                format!("no keys for {rows} rows"),
            ));
        }
        let mut keys = Vec::with_capacity(self.capacity_for(key_count));
        for _ in 0..key_count {
            keys.push(self.decode_key()?);
        }
        Ok((rows, keys))
    }

    fn decode_templated_object_array(&mut self, declared: Option<u32>) -> Result<Value, DecodeError> {
        self.expect_tag(Tag::TemplatedObjectArray, "templated object array")?;
        let (rows, keys) = self.decode_template_header()?;
        let items = Rc::new(RefCell::new(Vec::with_capacity(self.capacity_for(rows))));
        self.register(declared, &Value::Array(items.clone()));
        for _ in 0..rows {
            let mut entries = Vec::with_capacity(keys.len());
            for key in &keys {
                entries.push((key.clone(), self.decode_value()?));
            }
            items
                .borrow_mut()
                .push(Value::Object(Rc::new(RefCell::new(entries))));
        }
        Ok(Value::Array(items))
    }
}
