//! `RserEncoder` turns one [`Value`] into RSER bytes.
//!
//! Encoding happens in two passes. [`ReferencePlan::discover`] first walks
//! the value graph, then the encoder emits bytes, declaring every identity
//! the plan marked as referenced at its first occurrence and writing a
//! back-reference at every later one.

mod domain;
mod references;

use std::collections::{HashMap, HashSet};

pub use references::{ReferencePlan, Sighting};

use crate::codes::Tag;
use crate::config::CodecConfig;
use crate::error::EncodeError;
use crate::sink::{CountingSink, IntSize, Sink};
use crate::symbols::SymbolRegistry;
use crate::value::{rc_identity, Value};

const MAX_WIRE_LEN: usize = i32::MAX as usize;

/// Single-message encoder over a [`Sink`].
pub struct RserEncoder<'a, S: Sink> {
    sink: S,
    symbols: &'a SymbolRegistry,
    plan: &'a ReferencePlan,
    config: &'a CodecConfig,
    ids: HashMap<usize, u32>,
    depth: usize,
}

impl<'a> RserEncoder<'a, CountingSink> {
    /// Exact number of bytes [`encode_value`](Self::encode_value) writes for
    /// `value`.
    pub fn encoded_len(
        value: &Value,
        symbols: &'a SymbolRegistry,
        plan: &'a ReferencePlan,
        config: &'a CodecConfig,
    ) -> Result<usize, EncodeError> {
        let mut encoder = RserEncoder::new(CountingSink::new(), symbols, plan, config);
        encoder.encode_value(value)?;
        Ok(encoder.into_sink().len())
    }
}

impl<'a, S: Sink> RserEncoder<'a, S> {
    pub fn new(
        sink: S,
        symbols: &'a SymbolRegistry,
        plan: &'a ReferencePlan,
        config: &'a CodecConfig,
    ) -> Self {
        Self {
            sink,
            symbols,
            plan,
            config,
            ids: HashMap::new(),
            depth: 0,
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    #[inline]
    fn tag(&mut self, tag: Tag) {
        self.sink.write_byte(tag.code());
    }

    pub fn encode_stream_header(&mut self, version: u32) {
        self.tag(Tag::StreamHeader);
        self.encode_number(version as f64);
    }

    pub fn encode_message_header(&mut self, len: usize) -> Result<(), EncodeError> {
        self.tag(Tag::MessageHeader);
        self.encode_len(len)
    }

    pub fn encode_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Undefined => self.tag(Tag::Undefined),
            Value::Null => self.tag(Tag::Null),
            Value::Bool(true) => self.tag(Tag::True),
            Value::Bool(false) => self.tag(Tag::False),
            Value::Number(n) => self.encode_number(*n),
            Value::BigInt(n) => self.encode_bigint(*n)?,
            Value::String(s) => self.encode_string(s)?,
            Value::Symbol(symbol) => self.encode_symbol(*symbol)?,
            Value::Date(ms) => self.encode_date(*ms),
            Value::RegExp(re) => {
                self.encode_possible_reference(rc_identity(re), |e| e.encode_regexp(re))?
            }
            Value::Error(err) => {
                self.encode_possible_reference(rc_identity(err), |e| e.encode_error(err))?
            }
            Value::Array(items) => self.encode_possible_reference(rc_identity(items), |e| {
                e.nested(|e| e.encode_array(&items.borrow()))
            })?,
            Value::Set(items) => self.encode_possible_reference(rc_identity(items), |e| {
                e.nested(|e| e.encode_set(&items.borrow()))
            })?,
            Value::Map(entries) => self.encode_possible_reference(rc_identity(entries), |e| {
                e.nested(|e| e.encode_map(&entries.borrow()))
            })?,
            Value::Object(entries) => self
                .encode_possible_reference(rc_identity(entries), |e| {
                    e.nested(|e| e.encode_object(&entries.borrow()))
                })?,
            Value::ArrayBuffer(bytes) => self
                .encode_possible_reference(rc_identity(bytes), |e| {
                    e.encode_array_buffer(&bytes.borrow())
                })?,
            Value::ArrayBufferView(view) => self
                .encode_possible_reference(rc_identity(view), |e| {
                    e.encode_array_buffer_view(view)
                })?,
            Value::Duration(d) => self.encode_duration(*d)?,
            Value::OneIndexed(n) => self.encode_one_indexed(*n),
            Value::ZeroIndexed(n) => self.encode_zero_indexed(*n),
            Value::Position(p) => self.encode_position(p),
            Value::SourceLocation(loc) => self.encode_source_location(loc)?,
            Value::Path(path) => self.encode_path(path)?,
            Value::PathSet(set) => {
                self.encode_possible_reference(rc_identity(set), |e| e.encode_path_set(set))?
            }
            Value::PathMap(map) => self.encode_possible_reference(rc_identity(map), |e| {
                e.nested(|e| e.encode_path_map(&map.borrow()))
            })?,
        }
        Ok(())
    }

    /// Runs `body` one container level deeper, failing past `max_depth`.
    fn nested(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        if self.depth >= self.config.max_depth {
            return Err(EncodeError::TooDeep(self.config.max_depth));
        }
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    /// Emits `body` for the value with the given identity, preceded by a
    /// declaration when the value is referenced, or a back-reference in
    /// place of `body` when it was already emitted.
    pub(crate) fn encode_possible_reference(
        &mut self,
        identity: usize,
        body: impl FnOnce(&mut Self) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        if let Some(&id) = self.ids.get(&identity) {
            self.tag(Tag::Reference);
            self.encode_number(id as f64);
            return Ok(());
        }
        if self.plan.is_referenced(identity) {
            let id = self.ids.len() as u32;
            self.ids.insert(identity, id);
            tracing::trace!(id, "declare reference");
            self.tag(Tag::DeclareReference);
            self.encode_number(id as f64);
        }
        body(self)
    }

    /// Writes a number using the narrowest tag that represents it exactly.
    pub fn encode_number(&mut self, value: f64) {
        if value.is_nan() {
            return self.tag(Tag::Nan);
        }
        if value == 0.0 {
            return self.tag(if value.is_sign_negative() {
                Tag::NegativeZero
            } else {
                Tag::PositiveZero
            });
        }
        if value == 1.0 {
            return self.tag(Tag::PositiveOne);
        }
        if value == -1.0 {
            return self.tag(Tag::NegativeOne);
        }
        if value.is_infinite() {
            return self.tag(if value > 0.0 {
                Tag::PositiveInfinity
            } else {
                Tag::NegativeInfinity
            });
        }
        let abs = value.abs();
        if value.fract() == 0.0 && abs <= i32::MAX as f64 {
            let int = value as i64;
            let (tag, size) = if abs <= i8::MAX as f64 {
                (Tag::Int8, IntSize::I8)
            } else if abs <= i16::MAX as f64 {
                (Tag::Int16, IntSize::I16)
            } else {
                (Tag::Int32, IntSize::I32)
            };
            self.tag(tag);
            self.sink.write_int(int, size);
        } else {
            self.tag(Tag::Float);
            self.sink.write_float(value);
        }
    }

    /// Writes a bigint: small values as a tagged number, others as eight
    /// fixed bytes.
    pub fn encode_bigint(&mut self, value: i128) -> Result<(), EncodeError> {
        if value.unsigned_abs() <= i32::MAX as u128 {
            self.tag(Tag::BigIntAsInt);
            self.encode_number(value as f64);
            return Ok(());
        }
        let wide = i64::try_from(value).map_err(|_| EncodeError::BigIntOutOfRange(value))?;
        self.tag(Tag::BigInt64);
        self.sink.write_int(wide, IntSize::I64);
        Ok(())
    }

    pub(crate) fn encode_len(&mut self, len: usize) -> Result<(), EncodeError> {
        if len > MAX_WIRE_LEN {
            return Err(EncodeError::LengthOverflow(len));
        }
        self.encode_number(len as f64);
        Ok(())
    }

    /// Writes a string without its tag: byte length, then UTF-8 bytes.
    pub(crate) fn encode_string_body(&mut self, text: &str) -> Result<(), EncodeError> {
        let len = text.len();
        self.encode_len(len)?;
        if len > 0 {
            self.sink.write_string(text, len);
        }
        Ok(())
    }

    pub fn encode_string(&mut self, text: &str) -> Result<(), EncodeError> {
        self.tag(Tag::String);
        self.encode_string_body(text)
    }

    /// Writes `undefined` for `None`, a tagged string otherwise.
    pub(crate) fn encode_optional_string(&mut self, text: Option<&str>) -> Result<(), EncodeError> {
        match text {
            Some(text) => self.encode_string(text),
            None => {
                self.tag(Tag::Undefined);
                Ok(())
            }
        }
    }

    pub fn encode_array(&mut self, items: &[Value]) -> Result<(), EncodeError> {
        if let Some(keys) = self.template_keys(items) {
            let rows: Vec<_> = items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(entries) => Some(entries.borrow()),
                    _ => None,
                })
                .collect();
            return self.encode_templated_object_array(&keys, rows.len(), |e, row, column| {
                match rows[row].iter().find(|(k, _)| *k == keys[column]) {
                    Some((_, value)) => e.encode_value(value),
                    None => {
                        e.tag(Tag::Undefined);
                        Ok(())
                    }
                }
            });
        }
        self.tag(Tag::Array);
        self.encode_len(items.len())?;
        for item in items {
            self.encode_value(item)?;
        }
        Ok(())
    }

    /// Shared key list of `items` when they can be written as a templated
    /// object array. Keyless and duplicate-key objects are never templated.
    fn template_keys(&self, items: &[Value]) -> Option<Vec<String>> {
        if !self.config.templated_object_arrays || items.len() < 2 {
            return None;
        }
        let mut keys: Option<Vec<String>> = None;
        for item in items {
            let Value::Object(entries) = item else {
                return None;
            };
            if self.plan.is_referenced(rc_identity(entries)) {
                return None;
            }
            let entries = entries.borrow();
            let defined = entries
                .iter()
                .filter(|(_, v)| !matches!(v, Value::Undefined))
                .map(|(k, _)| k.as_str());
            match &keys {
                None => {
                    let first: Vec<String> = defined.map(str::to_owned).collect();
                    let mut unique = HashSet::with_capacity(first.len());
                    if first.is_empty() || !first.iter().all(|k| unique.insert(k.as_str())) {
                        return None;
                    }
                    keys = Some(first);
                }
                Some(expected) => {
                    if !defined.eq(expected.iter().map(String::as_str)) {
                        return None;
                    }
                }
            }
        }
        keys
    }

    /// Writes `rows` objects sharing `keys`: the keys once, then each row's
    /// values in key order. `cell` writes the value at a row and key index.
    /// Zero rows are written as a plain empty array.
    pub fn encode_templated_object_array<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        rows: usize,
        mut cell: impl FnMut(&mut Self, usize, usize) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        if rows == 0 {
            self.tag(Tag::Array);
            return self.encode_len(0);
        }
        self.tag(Tag::TemplatedObjectArray);
        self.encode_len(rows)?;
        self.encode_len(keys.len())?;
        for key in keys {
            self.encode_string_body(key.as_ref())?;
        }
        for row in 0..rows {
            for column in 0..keys.len() {
                cell(self, row, column)?;
            }
        }
        Ok(())
    }

    pub fn encode_set(&mut self, items: &[Value]) -> Result<(), EncodeError> {
        self.tag(Tag::Set);
        self.encode_len(items.len())?;
        for item in items {
            self.encode_value(item)?;
        }
        Ok(())
    }

    pub fn encode_map(&mut self, entries: &[(Value, Value)]) -> Result<(), EncodeError> {
        self.tag(Tag::Map);
        self.encode_len(entries.len())?;
        for (key, value) in entries {
            self.encode_value(key)?;
            self.encode_value(value)?;
        }
        Ok(())
    }

    /// Writes an object. Keys whose value is `undefined` are omitted.
    pub fn encode_object(&mut self, entries: &[(String, Value)]) -> Result<(), EncodeError> {
        self.tag(Tag::Object);
        let defined = entries
            .iter()
            .filter(|(_, v)| !matches!(v, Value::Undefined));
        self.encode_len(defined.clone().count())?;
        for (key, value) in defined {
            self.encode_string_body(key)?;
            self.encode_value(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rser_buffers::Writer;

    fn encode(value: &Value) -> Vec<u8> {
        encode_with(value, &CodecConfig::default())
    }

    fn encode_with(value: &Value, config: &CodecConfig) -> Vec<u8> {
        let symbols = SymbolRegistry::new();
        let plan = ReferencePlan::discover(value);
        let mut encoder = RserEncoder::new(Writer::with_alloc_size(64), &symbols, &plan, config);
        encoder.encode_value(value).unwrap();
        encoder.into_sink().flush()
    }

    fn number(n: f64) -> Vec<u8> {
        encode(&Value::Number(n))
    }

    #[test]
    fn special_numbers_are_single_bytes() {
        assert_eq!(number(0.0), [Tag::PositiveZero.code()]);
        assert_eq!(number(-0.0), [Tag::NegativeZero.code()]);
        assert_eq!(number(1.0), [Tag::PositiveOne.code()]);
        assert_eq!(number(-1.0), [Tag::NegativeOne.code()]);
        assert_eq!(number(f64::NAN), [Tag::Nan.code()]);
        assert_eq!(number(f64::INFINITY), [Tag::PositiveInfinity.code()]);
        assert_eq!(number(f64::NEG_INFINITY), [Tag::NegativeInfinity.code()]);
    }

    #[test]
    fn integer_width_follows_magnitude() {
        assert_eq!(number(127.0), [Tag::Int8.code(), 127]);
        assert_eq!(number(-127.0), [Tag::Int8.code(), 0x81]);
        assert_eq!(number(128.0), [Tag::Int16.code(), 128, 0]);
        assert_eq!(number(-128.0), [Tag::Int16.code(), 0x80, 0xff]);
        assert_eq!(number(32768.0)[0], Tag::Int32.code());
        assert_eq!(number(2147483647.0).len(), 5);
        assert_eq!(number(2147483648.0)[0], Tag::Float.code());
        assert_eq!(number(0.5)[0], Tag::Float.code());
    }

    #[test]
    fn bigint_forms() {
        assert_eq!(
            encode(&Value::BigInt(5)),
            [Tag::BigIntAsInt.code(), Tag::Int8.code(), 5]
        );
        let wide = encode(&Value::BigInt(1 << 40));
        assert_eq!(wide[0], Tag::BigInt64.code());
        assert_eq!(&wide[1..], &(1i64 << 40).to_le_bytes());

        let symbols = SymbolRegistry::new();
        let config = CodecConfig::default();
        let value = Value::BigInt(i128::from(i64::MAX) + 1);
        let plan = ReferencePlan::discover(&value);
        let err = RserEncoder::new(Writer::new(), &symbols, &plan, &config)
            .encode_value(&value)
            .unwrap_err();
        assert_eq!(err, EncodeError::BigIntOutOfRange(i128::from(i64::MAX) + 1));
    }

    #[test]
    fn empty_string_has_no_payload() {
        assert_eq!(
            encode(&Value::from("")),
            [Tag::String.code(), Tag::PositiveZero.code()]
        );
    }

    #[test]
    fn undefined_object_fields_are_omitted() {
        let with_undefined = Value::object([("a", Value::Null), ("b", Value::Undefined)]);
        let without = Value::object([("a", Value::Null)]);
        assert_eq!(encode(&with_undefined), encode(&without));
    }

    #[test]
    fn same_shaped_objects_become_a_template() {
        let rows = Value::array([
            Value::object([("x", Value::from(1)), ("y", Value::from(2))]),
            Value::object([("x", Value::from(3)), ("y", Value::from(4))]),
        ]);
        assert_eq!(encode(&rows)[0], Tag::TemplatedObjectArray.code());

        let config = CodecConfig {
            templated_object_arrays: false,
            ..CodecConfig::default()
        };
        assert_eq!(encode_with(&rows, &config)[0], Tag::Array.code());

        let mixed = Value::array([
            Value::object([("x", Value::from(1))]),
            Value::object([("y", Value::from(1))]),
        ]);
        assert_eq!(encode(&mixed)[0], Tag::Array.code());
    }

    #[test]
    fn empty_template_is_an_empty_array() {
        let symbols = SymbolRegistry::new();
        let plan = ReferencePlan::default();
        let config = CodecConfig::default();
        let mut encoder = RserEncoder::new(Writer::new(), &symbols, &plan, &config);
        encoder
            .encode_templated_object_array(&["a", "b"], 0, |_, _, _| Ok(()))
            .unwrap();
        assert_eq!(encoder.into_sink().flush(), encode(&Value::array([])));
    }

    #[test]
    fn repeated_identity_is_declared_once() {
        let shared = Value::array([]);
        let bytes = encode(&Value::array([shared.clone(), shared]));
        assert_eq!(
            bytes,
            [
                Tag::Array.code(),
                Tag::Int8.code(),
                2,
                Tag::DeclareReference.code(),
                Tag::PositiveZero.code(),
                Tag::Array.code(),
                Tag::PositiveZero.code(),
                Tag::Reference.code(),
                Tag::PositiveZero.code(),
            ]
        );
    }

    #[test]
    fn counting_sink_predicts_length() {
        let value = Value::object([
            ("name", Value::from("ünïcode")),
            ("list", Value::array([Value::from(1.25), Value::BigInt(1 << 50)])),
        ]);
        let symbols = SymbolRegistry::new();
        let plan = ReferencePlan::discover(&value);
        let config = CodecConfig::default();
        let predicted = RserEncoder::encoded_len(&value, &symbols, &plan, &config).unwrap();
        assert_eq!(predicted, encode(&value).len());
    }
    #[test]
    fn keyless_objects_are_not_templated() {
        let empty = || Value::object(Vec::<(String, Value)>::new());
        let empties = Value::array((0..1000).map(|_| empty()));
        let bytes = encode(&empties);
        assert_eq!(bytes[0], Tag::Array.code());
        assert!(!bytes.contains(&Tag::TemplatedObjectArray.code()));
    }

    #[test]
    fn duplicate_keys_are_not_templated() {
        let row = || Value::object([("k", Value::from(1)), ("k", Value::from(2))]);
        let bytes = encode(&Value::array([row(), row()]));
        assert_eq!(bytes[0], Tag::Array.code());
        assert_eq!(bytes.iter().filter(|b| **b == Tag::Object.code()).count(), 2);
    }

    #[test]
    fn nesting_past_max_depth_fails() {
        let config = CodecConfig {
            max_depth: 3,
            ..CodecConfig::default()
        };
        let symbols = SymbolRegistry::new();
        let mut value = Value::array([]);
        for _ in 1..3 {
            value = Value::array([value]);
        }
        let plan = ReferencePlan::discover(&value);
        assert!(RserEncoder::new(Writer::new(), &symbols, &plan, &config)
            .encode_value(&value)
            .is_ok());

        let deeper = Value::map([(Value::from("k"), value)]);
        let plan = ReferencePlan::discover(&deeper);
        let err = RserEncoder::new(Writer::new(), &symbols, &plan, &config)
            .encode_value(&deeper)
            .unwrap_err();
        assert_eq!(err, EncodeError::TooDeep(3));
    }
}
