//! [`Value`], the union of everything RSER can carry.
//!
//! Kinds that have identity (containers, buffers, errors, regexps, paths and
//! path collections) are held behind `Rc`. Cloning a [`Value`] shares that
//! identity, and the encoder turns repeated identities into back-references.
//! Containers that may hold themselves are `Rc<RefCell<_>>` so the decoder
//! can register them before their members are decoded.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::codes::TypedArrayKind;
use crate::error_value::ErrorValue;
use crate::path::{Path, PathMap, PathSet};
use crate::symbols::Symbol;
use crate::units::{Duration, OneIndexed, Position, SourceLocation, ZeroIndexed};

/// Shared, mutable container storage.
pub type Shared<T> = Rc<RefCell<T>>;

/// A regular expression source and its flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegExp {
    pub pattern: String,
    pub flags: String,
}

/// A typed view over a shared byte buffer.
#[derive(Debug, Clone)]
pub struct ArrayBufferView {
    pub kind: TypedArrayKind,
    /// Number of elements in the view.
    pub length: usize,
    pub byte_offset: usize,
    pub buffer: Shared<Vec<u8>>,
}

impl ArrayBufferView {
    pub fn new(
        kind: TypedArrayKind,
        buffer: Shared<Vec<u8>>,
        byte_offset: usize,
        length: usize,
    ) -> Self {
        Self {
            kind,
            length,
            byte_offset,
            buffer,
        }
    }

    /// Length of the view in bytes.
    pub fn byte_length(&self) -> usize {
        self.length * self.kind.element_size()
    }

    /// Returns `true` when the view fits inside its buffer.
    pub fn is_in_bounds(&self) -> bool {
        self.byte_length()
            .checked_add(self.byte_offset)
            .is_some_and(|end| end <= self.buffer.borrow().len())
    }

    /// Copies out the bytes covered by the view.
    pub fn to_bytes(&self) -> Vec<u8> {
        let buffer = self.buffer.borrow();
        let end = (self.byte_offset + self.byte_length()).min(buffer.len());
        buffer[self.byte_offset.min(end)..end].to_vec()
    }
}

/// A value that can be encoded.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    Symbol(Symbol),
    /// Milliseconds since the Unix epoch.
    Date(f64),
    RegExp(Rc<RegExp>),
    Error(Rc<ErrorValue>),
    Array(Shared<Vec<Value>>),
    Set(Shared<Vec<Value>>),
    Map(Shared<Vec<(Value, Value)>>),
    Object(Shared<Vec<(String, Value)>>),
    ArrayBuffer(Shared<Vec<u8>>),
    ArrayBufferView(Rc<ArrayBufferView>),
    Duration(Duration),
    OneIndexed(OneIndexed),
    ZeroIndexed(ZeroIndexed),
    Position(Position),
    SourceLocation(SourceLocation),
    Path(Path),
    PathSet(Rc<PathSet>),
    PathMap(Shared<PathMap>),
}

pub(crate) fn rc_identity<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Rc::new(RefCell::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    pub fn array_buffer(bytes: Vec<u8>) -> Self {
        Value::ArrayBuffer(Rc::new(RefCell::new(bytes)))
    }

    pub fn regexp(pattern: impl Into<String>, flags: impl Into<String>) -> Self {
        Value::RegExp(Rc::new(RegExp {
            pattern: pattern.into(),
            flags: flags.into(),
        }))
    }

    pub fn error(error: ErrorValue) -> Self {
        Value::Error(Rc::new(error))
    }

    pub fn path_set(set: PathSet) -> Self {
        Value::PathSet(Rc::new(set))
    }

    pub fn path_map(map: PathMap) -> Self {
        Value::PathMap(Rc::new(RefCell::new(map)))
    }

    /// Identity of referenceable values, `None` for plain values.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::RegExp(rc) => Some(rc_identity(rc)),
            Value::Error(rc) => Some(rc_identity(rc)),
            Value::Array(rc) | Value::Set(rc) => Some(rc_identity(rc)),
            Value::Map(rc) => Some(rc_identity(rc)),
            Value::Object(rc) => Some(rc_identity(rc)),
            Value::ArrayBuffer(rc) => Some(rc_identity(rc)),
            Value::ArrayBufferView(rc) => Some(rc_identity(rc)),
            Value::Path(path) => Some(path.identity()),
            Value::PathSet(rc) => Some(rc_identity(rc)),
            Value::PathMap(rc) => Some(rc_identity(rc)),
            _ => None,
        }
    }

    /// Returns `true` when both values are the same referenceable object.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Date(_) => "date",
            Value::RegExp(_) => "regexp",
            Value::Error(_) => "error",
            Value::Array(_) => "array",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::ArrayBuffer(_) => "array buffer",
            Value::ArrayBufferView(_) => "array buffer view",
            Value::Duration(_) => "duration",
            Value::OneIndexed(_) => "one-indexed number",
            Value::ZeroIndexed(_) => "zero-indexed number",
            Value::Position(_) => "position",
            Value::SourceLocation(_) => "source location",
            Value::Path(_) => "path",
            Value::PathSet(_) => "path set",
            Value::PathMap(_) => "path map",
        }
    }

    /// Looks up a key of an object value.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(entries) => entries
                .borrow()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Element `index` of an array value.
    pub fn at(&self, index: usize) -> Option<Value> {
        match self {
            Value::Array(items) => items.borrow().get(index).cloned(),
            _ => None,
        }
    }

    fn equals(&self, other: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
        if let (Some(a), Some(b)) = (self.identity(), other.identity()) {
            if a == b || !seen.insert((a, b)) {
                return true;
            }
        }
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) | (Value::Date(a), Value::Date(b)) => {
                same_value(*a, *b)
            }
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::RegExp(a), Value::RegExp(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y, seen))
            }
            (Value::Map(a), Value::Map(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ak, av), (bk, bv))| ak.equals(bk, seen) && av.equals(bv, seen))
            }
            (Value::Object(a), Value::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ak, av), (bk, bv))| ak == bk && av.equals(bv, seen))
            }
            (Value::ArrayBuffer(a), Value::ArrayBuffer(b)) => *a.borrow() == *b.borrow(),
            (Value::ArrayBufferView(a), Value::ArrayBufferView(b)) => {
                a.kind == b.kind
                    && a.length == b.length
                    && a.byte_offset == b.byte_offset
                    && *a.buffer.borrow() == *b.buffer.borrow()
            }
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::OneIndexed(a), Value::OneIndexed(b)) => a == b,
            (Value::ZeroIndexed(a), Value::ZeroIndexed(b)) => a == b,
            (Value::Position(a), Value::Position(b)) => a == b,
            (Value::SourceLocation(a), Value::SourceLocation(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::PathSet(a), Value::PathSet(b)) => {
                a.kind() == b.kind()
                    && a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::PathMap(a), Value::PathMap(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.kind() == b.kind()
                    && a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ak, av), (bk, bv))| ak == bk && av.equals(bv, seen))
            }
            _ => false,
        }
    }
}

/// `Object.is` semantics: NaN equals NaN, and `0.0` differs from `-0.0`.
fn same_value(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
}

/// Structural equality that terminates on cyclic values.
///
/// Numbers compare with `Object.is` semantics. Collections compare in
/// insertion order.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &mut HashSet::new())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Path> for Value {
    fn from(path: Path) -> Self {
        Value::Path(path)
    }
}

const MAX_DEBUG_DEPTH: usize = 12;

struct Shown<'a> {
    value: &'a Value,
    depth: usize,
}

impl<'a> Shown<'a> {
    fn child(&self, value: &'a Value) -> Shown<'a> {
        Shown {
            value,
            depth: self.depth + 1,
        }
    }
}

impl fmt::Debug for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.depth > MAX_DEBUG_DEPTH && self.value.identity().is_some() {
            return write!(f, "{}(..)", self.value.kind_name());
        }
        match self.value {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n:?})"),
            Value::BigInt(n) => write!(f, "BigInt({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Symbol(s) => write!(f, "{s:?}"),
            Value::Date(ms) => write!(f, "Date({ms:?})"),
            Value::RegExp(re) => write!(f, "RegExp(/{}/{})", re.pattern, re.flags),
            Value::Error(err) => f
                .debug_struct("Error")
                .field("name", &err.name)
                .field("message", &err.message)
                .field("frames", &err.frames.len())
                .finish_non_exhaustive(),
            Value::Array(items) | Value::Set(items) => match items.try_borrow() {
                Ok(items) => {
                    f.write_str(if matches!(self.value, Value::Set(_)) {
                        "Set"
                    } else {
                        ""
                    })?;
                    f.debug_list()
                        .entries(items.iter().map(|v| self.child(v)))
                        .finish()
                }
                Err(_) => f.write_str("[<borrowed>]"),
            },
            Value::Map(entries) => match entries.try_borrow() {
                Ok(entries) => f
                    .debug_map()
                    .entries(entries.iter().map(|(k, v)| (self.child(k), self.child(v))))
                    .finish(),
                Err(_) => f.write_str("Map{<borrowed>}"),
            },
            Value::Object(entries) => match entries.try_borrow() {
                Ok(entries) => f
                    .debug_map()
                    .entries(entries.iter().map(|(k, v)| (k, self.child(v))))
                    .finish(),
                Err(_) => f.write_str("{<borrowed>}"),
            },
            Value::ArrayBuffer(bytes) => match bytes.try_borrow() {
                Ok(bytes) => write!(f, "ArrayBuffer({} bytes)", bytes.len()),
                Err(_) => f.write_str("ArrayBuffer(<borrowed>)"),
            },
            Value::ArrayBufferView(view) => write!(
                f,
                "{:?}Array(length: {}, offset: {})",
                view.kind, view.length, view.byte_offset
            ),
            Value::Duration(d) => write!(f, "{d:?}"),
            Value::OneIndexed(n) => write!(f, "{n:?}"),
            Value::ZeroIndexed(n) => write!(f, "{n:?}"),
            Value::Position(p) => write!(f, "{p:?}"),
            Value::SourceLocation(loc) => write!(f, "{loc:?}"),
            Value::Path(path) => write!(f, "{path:?}"),
            Value::PathSet(set) => f.debug_set().entries(set.iter()).finish(),
            Value::PathMap(map) => match map.try_borrow() {
                Ok(map) => f
                    .debug_map()
                    .entries(map.iter().map(|(k, v)| (k, self.child(v))))
                    .finish(),
                Err(_) => f.write_str("PathMap{<borrowed>}"),
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Shown {
            value: self,
            depth: 0,
        }
        .fmt(f)
    }
}
