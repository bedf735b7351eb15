//! Sub-decoders for the domain kinds. Each is the exact inverse of its
//! counterpart in the encoder.

use std::cell::RefCell;
use std::rc::Rc;

use crate::codes::{CodeRegistry, ErrorClass, PathCollectionKind, PathFormKind, Tag, TypedArrayKind};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::error_value::{ErrorValue, FrameField, StackFrame, SystemErrorProps};
use crate::path::{
    Path, PathError, PathForm, PathMap, PathSet, UrlParts, FLAG_EXPLICIT_DIRECTORY,
    FLAG_EXPLICIT_RELATIVE,
};
use crate::symbols::Symbol;
use crate::units::{Duration, OneIndexed, Position, SourceLocation, ZeroIndexed};
use crate::value::{ArrayBufferView, RegExp, Value};

use super::RserDecoder;

fn path_error(offset: usize, err: PathError) -> DecodeError {
    DecodeError::new(offset, DecodeErrorKind::Path(err))
}

impl RserDecoder<'_, '_> {
    fn decode_code<R: CodeRegistry>(&mut self) -> Result<R, DecodeError> {
        let (byte, offset) = self.read_byte()?;
        R::from_code(byte, offset)
    }

    pub fn decode_symbol(&mut self) -> Result<Symbol, DecodeError> {
        self.expect_tag(Tag::Symbol, "symbol")?;
        let key = self.decode_string_body()?;
        Ok(self.symbols.for_key(&key))
    }

    pub fn decode_date(&mut self) -> Result<f64, DecodeError> {
        self.expect_tag(Tag::Date, "date")?;
        self.decode_number()
    }

    pub fn decode_regexp(&mut self) -> Result<RegExp, DecodeError> {
        self.expect_tag(Tag::RegExp, "regexp")?;
        Ok(RegExp {
            pattern: self.decode_string_body()?,
            flags: self.decode_string_body()?,
        })
    }

    pub fn decode_duration(&mut self) -> Result<Duration, DecodeError> {
        self.expect_tag(Tag::Duration, "duration")?;
        let offset = self.offset();
        let nanos = self.decode_bigint()?;
        i64::try_from(nanos)
            .map(Duration::from_nanos)
            .map_err(|_| DecodeError::invalid(offset, "64-bit duration", nanos))
    }

    fn decode_line(&mut self) -> Result<OneIndexed, DecodeError> {
        let n = self.decode_integer("one-indexed number", 1.0, f64::from(u32::MAX))?;
        Ok(OneIndexed::new(n as u32).unwrap_or(OneIndexed::MIN))
    }

    fn decode_column(&mut self) -> Result<ZeroIndexed, DecodeError> {
        let n = self.decode_integer("zero-indexed number", 0.0, f64::from(u32::MAX))?;
        Ok(ZeroIndexed::new(n as u32))
    }

    pub fn decode_one_indexed(&mut self) -> Result<OneIndexed, DecodeError> {
        self.expect_tag(Tag::IndexOne, "one-indexed number")?;
        self.decode_line()
    }

    pub fn decode_zero_indexed(&mut self) -> Result<ZeroIndexed, DecodeError> {
        self.expect_tag(Tag::IndexZero, "zero-indexed number")?;
        self.decode_column()
    }

    fn decode_line_column(&mut self) -> Result<Position, DecodeError> {
        Ok(Position::new(self.decode_line()?, self.decode_column()?))
    }

    pub fn decode_position(&mut self) -> Result<Position, DecodeError> {
        self.expect_tag(Tag::Position, "position")?;
        self.decode_line_column()
    }

    pub fn decode_source_location(&mut self) -> Result<SourceLocation, DecodeError> {
        self.expect_tag(Tag::SourceLocation, "source location")?;
        Ok(SourceLocation {
            path: self.decode_path()?,
            identifier_name: self.decode_optional_string()?,
            start: self.decode_line_column()?,
            end: self.decode_line_column()?,
        })
    }

    pub(crate) fn decode_array_buffer(&mut self) -> Result<Value, DecodeError> {
        self.expect_tag(Tag::ArrayBuffer, "array buffer")?;
        let len = self.decode_len()?;
        let bytes = self.reader.buf(len)?;
        Ok(Value::array_buffer(bytes.to_vec()))
    }

    pub fn decode_array_buffer_view(&mut self) -> Result<ArrayBufferView, DecodeError> {
        let start = self.expect_tag(Tag::ArrayBufferView, "array buffer view")?;
        let kind: TypedArrayKind = self.decode_code()?;
        let length = self.decode_len()?;
        let byte_offset = self.decode_len()?;
        let tag = self.peek_tag()?;
        if !matches!(tag, Tag::ArrayBuffer | Tag::Reference | Tag::DeclareReference) {
            return Err(DecodeError::unexpected_tag(self.offset(), "array buffer", tag));
        }
        let offset = self.offset();
        let buffer = match self.decode_value()? {
            Value::ArrayBuffer(buffer) => buffer,
            other => {
                return Err(DecodeError::new(
                    offset,
                    DecodeErrorKind::ReferenceType {
                        expected: "array buffer",
                        found: other.kind_name(),
                    },
                ))
            }
        };
        let view = ArrayBufferView::new(kind, buffer, byte_offset, length);
        if !view.is_in_bounds() {
            let buffer_len = view.buffer.borrow().len();
            return Err(DecodeError::invalid(
                start,
                "view within its buffer",
                format!(
                    "{} bytes at offset {byte_offset} of a {buffer_len}-byte buffer",
                    view.byte_length()
                ),
            ));
        }
        Ok(view)
    }

    /// Reads a path given inline, by reference, or as a declaration.
    pub fn decode_path(&mut self) -> Result<Path, DecodeError> {
        let offset = self.offset();
        let tag = self.peek_tag()?;
        if !matches!(tag, Tag::Path | Tag::Reference | Tag::DeclareReference) {
            return Err(DecodeError::unexpected_tag(offset, "path", tag));
        }
        match self.decode_value()? {
            Value::Path(path) => Ok(path),
            other => Err(DecodeError::new(
                offset,
                DecodeErrorKind::ReferenceType {
                    expected: "path",
                    found: other.kind_name(),
                },
            )),
        }
    }

    pub(crate) fn decode_path_body(&mut self) -> Result<Path, DecodeError> {
        self.expect_tag(Tag::Path, "path")?;
        let kind: PathFormKind = self.decode_code()?;
        let (flags, flags_offset) = self.read_byte()?;
        if flags & !(FLAG_EXPLICIT_DIRECTORY | FLAG_EXPLICIT_RELATIVE) != 0 {
            return Err(DecodeError::invalid(
                flags_offset,
                "path flags",
                format!("{flags:#04x}"),
            ));
        }
        let count = self.decode_len()?;
        let mut segments = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            segments.push(self.decode_key()?);
        }
        let form = match kind {
            PathFormKind::AbsoluteUnix => PathForm::AbsoluteUnix,
            PathFormKind::Relative => PathForm::Relative {
                explicit_relative: flags & FLAG_EXPLICIT_RELATIVE != 0,
            },
            PathFormKind::Uid => PathForm::Uid,
            PathFormKind::AbsoluteWindowsDrive => {
                let offset = self.offset();
                let letter = self.decode_string_body()?;
                let mut chars = letter.chars();
                match (chars.next(), chars.next()) {
                    (Some(letter), None) => PathForm::AbsoluteWindowsDrive { letter },
                    _ => return Err(DecodeError::invalid(offset, "drive letter", letter)),
                }
            }
            PathFormKind::AbsoluteWindowsUnc => PathForm::AbsoluteWindowsUnc {
                servername: self.decode_string_body()?,
            },
            PathFormKind::Url => PathForm::Url(self.decode_url_parts()?),
            PathFormKind::DataUri => {
                let mime = self.decode_string_body()?;
                let len = self.decode_len()?;
                let data = self.reader.buf(len)?.to_vec();
                PathForm::DataUri { mime, data }
            }
        };
        Ok(Path::new(
            form,
            segments,
            flags & FLAG_EXPLICIT_DIRECTORY != 0,
        ))
    }

    fn decode_url_parts(&mut self) -> Result<UrlParts, DecodeError> {
        let protocol = self.decode_string_body()?;
        let username = self.decode_optional_string()?;
        let password = self.decode_optional_string()?;
        let hostname = self.decode_string_body()?;
        let port = match self.peek_tag()? {
            Tag::Undefined => {
                self.read_tag()?;
                None
            }
            _ => Some(self.decode_integer("port", 0.0, f64::from(u16::MAX))? as u16),
        };
        Ok(UrlParts {
            protocol,
            username,
            password,
            hostname,
            port,
            query: self.decode_optional_string()?,
            fragment: self.decode_optional_string()?,
        })
    }

    pub(crate) fn decode_path_set(&mut self) -> Result<PathSet, DecodeError> {
        let (tag, offset) = self.read_tag()?;
        let mut set = match tag {
            Tag::PathSet => PathSet::new(self.decode_code()?),
            Tag::MixedPathSet => PathSet::mixed(),
            _ => return Err(DecodeError::unexpected_tag(offset, "path set", tag)),
        };
        let len = self.decode_len()?;
        for _ in 0..len {
            let offset = self.offset();
            let path = if set.is_mixed() {
                self.decode_mixed_entry_path()?
            } else {
                self.decode_path()?
            };
            set.insert(path).map_err(|err| path_error(offset, err))?;
        }
        Ok(set)
    }

    /// Reads the collection kind and path of one mixed collection entry.
    fn decode_mixed_entry_path(&mut self) -> Result<Path, DecodeError> {
        let offset = self.offset();
        let kind: PathCollectionKind = self.decode_code()?;
        let path = self.decode_path()?;
        if path.collection_kind() != kind {
            return Err(path_error(
                offset,
                PathError::KindMismatch {
                    expected: kind,
                    found: path.collection_kind(),
                },
            ));
        }
        Ok(path)
    }

    pub(crate) fn decode_path_map(&mut self, declared: Option<u32>) -> Result<Value, DecodeError> {
        let (tag, offset) = self.read_tag()?;
        let map = match tag {
            Tag::PathMap => PathMap::new(self.decode_code()?),
            Tag::MixedPathMap => PathMap::mixed(),
            _ => return Err(DecodeError::unexpected_tag(offset, "path map", tag)),
        };
        let len = self.decode_len()?;
        let shared = Rc::new(RefCell::new(map));
        let value = Value::PathMap(shared.clone());
        self.register(declared, &value);
        let mixed = shared.borrow().is_mixed();
        for _ in 0..len {
            let offset = self.offset();
            let path = if mixed {
                self.decode_mixed_entry_path()?
            } else {
                self.decode_path()?
            };
            let entry = self.decode_value()?;
            shared
                .borrow_mut()
                .insert(path, entry)
                .map_err(|err| path_error(offset, err))?;
        }
        Ok(value)
    }

    pub fn decode_error(&mut self) -> Result<ErrorValue, DecodeError> {
        self.expect_tag(Tag::Error, "error")?;
        let class: ErrorClass = self.decode_code()?;
        let name = self.decode_string_body()?;
        let message = self.decode_string_body()?;
        let stack = self.decode_optional_string()?;
        let mut error = ErrorValue::new(class, message).with_name(name);
        error.stack = stack;
        error.set_system_props(self.decode_system_props()?);
        error.set_frames(self.decode_frames()?);
        Ok(error)
    }

    fn decode_system_props(&mut self) -> Result<SystemErrorProps, DecodeError> {
        self.expect_tag(Tag::Object, "system error properties")?;
        let len = self.decode_len()?;
        let mut props = SystemErrorProps::default();
        for _ in 0..len {
            let offset = self.offset();
            let key = self.decode_key()?;
            match key.as_str() {
                "address" => props.address = Some(self.decode_string()?),
                "code" => props.code = Some(self.decode_string()?),
                "dest" => props.dest = Some(self.decode_string()?),
                "path" => props.path = Some(self.decode_string()?),
                "syscall" => props.syscall = Some(self.decode_string()?),
                "errno" => {
                    let errno =
                        self.decode_integer("errno", f64::from(i32::MIN), f64::from(i32::MAX))?;
                    props.errno = Some(errno as i32);
                }
                "port" => {
                    let port = self.decode_integer("port", 0.0, f64::from(u16::MAX))?;
                    props.port = Some(port as u16);
                }
                _ => {
                    return Err(DecodeError::new(
                        offset,
                        DecodeErrorKind::UnknownProperty {
                            context: "system error",
                            key,
                        },
                    ))
                }
            }
        }
        Ok(props)
    }

    fn decode_frames(&mut self) -> Result<Vec<StackFrame>, DecodeError> {
        let (tag, offset) = self.read_tag()?;
        match tag {
            Tag::TemplatedObjectArray => {}
            Tag::Array => {
                let len_offset = self.offset();
                let len = self.decode_len()?;
                if len != 0 {
                    return Err(DecodeError::invalid(len_offset, "empty frame list", len));
                }
                return Ok(Vec::new());
            }
            _ => return Err(DecodeError::unexpected_tag(offset, "stack frames", tag)),
        }
        let keys_offset = self.offset();
        let (rows, keys) = self.decode_template_header()?;
        let fields = keys
            .into_iter()
            .map(|key| {
                FrameField::from_key(&key).ok_or_else(|| {
                    DecodeError::new(
                        keys_offset,
                        DecodeErrorKind::UnknownProperty {
                            context: "stack frame",
                            key,
                        },
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut frames = Vec::with_capacity(rows.min(self.remaining()));
        for _ in 0..rows {
            let mut frame = StackFrame::default();
            for field in &fields {
                self.decode_frame_field(&mut frame, *field)?;
            }
            frames.push(frame);
        }
        Ok(frames)
    }

    fn decode_flag(&mut self) -> Result<bool, DecodeError> {
        let (tag, offset) = self.read_tag()?;
        match tag {
            Tag::True => Ok(true),
            Tag::False => Ok(false),
            _ => Err(DecodeError::unexpected_tag(offset, "boolean", tag)),
        }
    }

    /// Consumes an `undefined` tag if one is next.
    fn skip_undefined(&mut self) -> Result<bool, DecodeError> {
        if self.peek_tag()? == Tag::Undefined {
            self.read_tag()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn decode_frame_field(&mut self, frame: &mut StackFrame, field: FrameField) -> Result<(), DecodeError> {
        match field {
            FrameField::TypeName => frame.type_name = self.decode_optional_string()?,
            FrameField::FunctionName => frame.function_name = self.decode_optional_string()?,
            FrameField::MethodName => frame.method_name = self.decode_optional_string()?,
            FrameField::IsTopLevel => frame.is_top_level = self.decode_flag()?,
            FrameField::IsEval => frame.is_eval = self.decode_flag()?,
            FrameField::IsNative => frame.is_native = self.decode_flag()?,
            FrameField::IsConstructor => frame.is_constructor = self.decode_flag()?,
            FrameField::Path => {
                if !self.skip_undefined()? {
                    frame.path = Some(self.decode_path()?);
                }
            }
            FrameField::Line => {
                if !self.skip_undefined()? {
                    frame.line = Some(self.decode_one_indexed()?);
                }
            }
            FrameField::Column => {
                if !self.skip_undefined()? {
                    frame.column = Some(self.decode_zero_indexed()?);
                }
            }
        }
        Ok(())
    }
}
