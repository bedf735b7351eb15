//! Sub-encoders for the domain kinds: paths and path collections, errors,
//! byte buffers, dates, regexps, symbols, durations, indexed numbers and
//! source positions.

use crate::codes::{CodeRegistry, Tag};
use crate::error::EncodeError;
use crate::error_value::{ErrorValue, FrameField, StackFrame, SystemErrorProps};
use crate::path::{
    Path, PathForm, PathMap, PathSet, FLAG_EXPLICIT_DIRECTORY, FLAG_EXPLICIT_RELATIVE,
};
use crate::sink::Sink;
use crate::symbols::Symbol;
use crate::units::{Duration, OneIndexed, Position, SourceLocation, ZeroIndexed};
use crate::value::{rc_identity, ArrayBufferView, RegExp};

use super::RserEncoder;

impl<S: Sink> RserEncoder<'_, S> {
    pub fn encode_symbol(&mut self, symbol: Symbol) -> Result<(), EncodeError> {
        let key = self
            .symbols
            .key_for(symbol)
            .ok_or(EncodeError::UnregisteredSymbol(symbol))?;
        self.tag(Tag::Symbol);
        self.encode_string_body(key)
    }

    pub fn encode_date(&mut self, millis: f64) {
        self.tag(Tag::Date);
        self.encode_number(millis);
    }

    pub fn encode_regexp(&mut self, regexp: &RegExp) -> Result<(), EncodeError> {
        self.tag(Tag::RegExp);
        self.encode_string_body(&regexp.pattern)?;
        self.encode_string_body(&regexp.flags)
    }

    pub fn encode_duration(&mut self, duration: Duration) -> Result<(), EncodeError> {
        self.tag(Tag::Duration);
        self.encode_bigint(i128::from(duration.as_nanos()))
    }

    pub fn encode_one_indexed(&mut self, n: OneIndexed) {
        self.tag(Tag::IndexOne);
        self.encode_number(f64::from(n.get()));
    }

    pub fn encode_zero_indexed(&mut self, n: ZeroIndexed) {
        self.tag(Tag::IndexZero);
        self.encode_number(f64::from(n.get()));
    }

    fn encode_line_column(&mut self, position: &Position) {
        self.encode_number(f64::from(position.line.get()));
        self.encode_number(f64::from(position.column.get()));
    }

    pub fn encode_position(&mut self, position: &Position) {
        self.tag(Tag::Position);
        self.encode_line_column(position);
    }

    pub fn encode_source_location(&mut self, location: &SourceLocation) -> Result<(), EncodeError> {
        self.tag(Tag::SourceLocation);
        self.encode_path(&location.path)?;
        self.encode_optional_string(location.identifier_name.as_deref())?;
        self.encode_line_column(&location.start);
        self.encode_line_column(&location.end);
        Ok(())
    }

    pub fn encode_array_buffer(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.tag(Tag::ArrayBuffer);
        self.encode_len(bytes.len())?;
        self.sink.write_bytes(bytes);
        Ok(())
    }

    /// Writes the view header followed by its buffer. The buffer goes
    /// through reference tracking so views sharing one buffer keep sharing
    /// it after decoding.
    pub fn encode_array_buffer_view(&mut self, view: &ArrayBufferView) -> Result<(), EncodeError> {
        self.tag(Tag::ArrayBufferView);
        self.sink.write_byte(view.kind.code());
        self.encode_len(view.length)?;
        self.encode_len(view.byte_offset)?;
        self.encode_possible_reference(rc_identity(&view.buffer), |e| {
            e.encode_array_buffer(&view.buffer.borrow())
        })
    }

    /// Writes a path, or a back-reference to an earlier occurrence of the
    /// same path object.
    pub fn encode_path(&mut self, path: &Path) -> Result<(), EncodeError> {
        self.encode_possible_reference(path.identity(), |e| e.encode_path_body(path))
    }

    fn encode_path_body(&mut self, path: &Path) -> Result<(), EncodeError> {
        self.tag(Tag::Path);
        self.sink.write_byte(path.kind().code());
        let mut flags = 0;
        if path.is_explicit_directory() {
            flags |= FLAG_EXPLICIT_DIRECTORY;
        }
        if path.is_explicit_relative() {
            flags |= FLAG_EXPLICIT_RELATIVE;
        }
        self.sink.write_byte(flags);
        self.encode_len(path.segments().len())?;
        for segment in path.segments() {
            self.encode_string_body(segment)?;
        }
        match path.form() {
            PathForm::AbsoluteUnix | PathForm::Relative { .. } | PathForm::Uid => {}
            PathForm::AbsoluteWindowsDrive { letter } => {
                let mut buf = [0u8; 4];
                self.encode_string_body(letter.encode_utf8(&mut buf))?;
            }
            PathForm::AbsoluteWindowsUnc { servername } => self.encode_string_body(servername)?,
            PathForm::Url(url) => {
                self.encode_string_body(&url.protocol)?;
                self.encode_optional_string(url.username.as_deref())?;
                self.encode_optional_string(url.password.as_deref())?;
                self.encode_string_body(&url.hostname)?;
                match url.port {
                    Some(port) => self.encode_number(f64::from(port)),
                    None => self.tag(Tag::Undefined),
                }
                self.encode_optional_string(url.query.as_deref())?;
                self.encode_optional_string(url.fragment.as_deref())?;
            }
            PathForm::DataUri { mime, data } => {
                self.encode_string_body(mime)?;
                self.encode_len(data.len())?;
                self.sink.write_bytes(data);
            }
        }
        Ok(())
    }

    pub fn encode_path_set(&mut self, set: &PathSet) -> Result<(), EncodeError> {
        match set.kind() {
            Some(kind) => {
                self.tag(Tag::PathSet);
                self.sink.write_byte(kind.code());
                self.encode_len(set.len())?;
                for path in set.iter() {
                    self.encode_path(path)?;
                }
            }
            None => {
                self.tag(Tag::MixedPathSet);
                self.encode_len(set.len())?;
                for path in set.iter() {
                    self.sink.write_byte(path.collection_kind().code());
                    self.encode_path(path)?;
                }
            }
        }
        Ok(())
    }

    pub fn encode_path_map(&mut self, map: &PathMap) -> Result<(), EncodeError> {
        match map.kind() {
            Some(kind) => {
                self.tag(Tag::PathMap);
                self.sink.write_byte(kind.code());
                self.encode_len(map.len())?;
                for (path, value) in map.iter() {
                    self.encode_path(path)?;
                    self.encode_value(value)?;
                }
            }
            None => {
                self.tag(Tag::MixedPathMap);
                self.encode_len(map.len())?;
                for (path, value) in map.iter() {
                    self.sink.write_byte(path.collection_kind().code());
                    self.encode_path(path)?;
                    self.encode_value(value)?;
                }
            }
        }
        Ok(())
    }

    pub fn encode_error(&mut self, error: &ErrorValue) -> Result<(), EncodeError> {
        self.tag(Tag::Error);
        self.sink.write_byte(error.class.code());
        let structure = error.structure();
        self.encode_string_body(structure.name)?;
        self.encode_string_body(structure.message)?;
        self.encode_optional_string(structure.stack)?;
        self.encode_system_props(structure.system)?;
        let frames = structure.frames;
        let keys = FrameField::ALL.map(FrameField::key);
        self.encode_templated_object_array(&keys, frames.len(), |e, row, column| {
            e.encode_frame_field(&frames[row], FrameField::ALL[column])
        })
    }

    /// Writes the system fields as an object holding only the present ones.
    fn encode_system_props(&mut self, props: &SystemErrorProps) -> Result<(), EncodeError> {
        let strings = [
            ("address", props.address.as_deref()),
            ("code", props.code.as_deref()),
            ("dest", props.dest.as_deref()),
            ("path", props.path.as_deref()),
            ("syscall", props.syscall.as_deref()),
        ];
        let count = strings.iter().filter(|(_, v)| v.is_some()).count()
            + usize::from(props.errno.is_some())
            + usize::from(props.port.is_some());
        self.tag(Tag::Object);
        self.encode_len(count)?;
        for (key, value) in strings {
            if let Some(value) = value {
                self.encode_string_body(key)?;
                self.encode_string(value)?;
            }
        }
        if let Some(errno) = props.errno {
            self.encode_string_body("errno")?;
            self.encode_number(f64::from(errno));
        }
        if let Some(port) = props.port {
            self.encode_string_body("port")?;
            self.encode_number(f64::from(port));
        }
        Ok(())
    }

    fn encode_frame_field(&mut self, frame: &StackFrame, field: FrameField) -> Result<(), EncodeError> {
        let flag = |e: &mut Self, on: bool| e.tag(if on { Tag::True } else { Tag::False });
        match field {
            FrameField::TypeName => self.encode_optional_string(frame.type_name.as_deref())?,
            FrameField::FunctionName => {
                self.encode_optional_string(frame.function_name.as_deref())?
            }
            FrameField::MethodName => self.encode_optional_string(frame.method_name.as_deref())?,
            FrameField::IsTopLevel => flag(self, frame.is_top_level),
            FrameField::IsEval => flag(self, frame.is_eval),
            FrameField::IsNative => flag(self, frame.is_native),
            FrameField::IsConstructor => flag(self, frame.is_constructor),
            FrameField::Path => match &frame.path {
                Some(path) => self.encode_path(path)?,
                None => self.tag(Tag::Undefined),
            },
            FrameField::Line => match frame.line {
                Some(line) => self.encode_one_indexed(line),
                None => self.tag(Tag::Undefined),
            },
            FrameField::Column => match frame.column {
                Some(column) => self.encode_zero_indexed(column),
                None => self.tag(Tag::Undefined),
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::PathCollectionKind;
    use crate::config::CodecConfig;
    use crate::encoder::ReferencePlan;
    use crate::symbols::SymbolRegistry;
    use crate::value::Value;
    use rser_buffers::Writer;

    fn encode(value: &Value, symbols: &SymbolRegistry) -> Result<Vec<u8>, EncodeError> {
        let plan = ReferencePlan::discover(value);
        let config = CodecConfig::default();
        let mut encoder = RserEncoder::new(Writer::with_alloc_size(32), symbols, &plan, &config);
        encoder.encode_value(value)?;
        Ok(encoder.into_sink().flush())
    }

    #[test]
    fn unregistered_symbol_fails() {
        let mut symbols = SymbolRegistry::new();
        let local = symbols.unique(Some("local"));
        assert_eq!(
            encode(&Value::Symbol(local), &symbols),
            Err(EncodeError::UnregisteredSymbol(local))
        );
        let shared = symbols.for_key("k");
        assert_eq!(
            encode(&Value::Symbol(shared), &symbols).unwrap(),
            [Tag::Symbol.code(), Tag::PositiveOne.code(), b'k']
        );
    }

    #[test]
    fn path_layout() {
        let path = Path::relative(["a"]).with_explicit_relative(true);
        let bytes = encode(&Value::Path(path), &SymbolRegistry::new()).unwrap();
        assert_eq!(
            bytes,
            [
                Tag::Path.code(),
                3,
                FLAG_EXPLICIT_RELATIVE,
                Tag::PositiveOne.code(),
                Tag::PositiveOne.code(),
                b'a',
            ]
        );
    }

    #[test]
    fn homogeneous_set_writes_kind_once() {
        let mut set = PathSet::new(PathCollectionKind::Uid);
        set.insert(Path::uid(["x"])).unwrap();
        set.insert(Path::uid(["y"])).unwrap();
        let bytes = encode(&Value::path_set(set), &SymbolRegistry::new()).unwrap();
        assert_eq!(&bytes[..4], &[Tag::PathSet.code(), 3, Tag::Int8.code(), 2]);
    }

    #[test]
    fn error_without_frames_ends_with_empty_array() {
        let err = ErrorValue::new(crate::codes::ErrorClass::Error, "");
        let bytes = encode(&Value::error(err), &SymbolRegistry::new()).unwrap();
        assert_eq!(
            &bytes[bytes.len() - 4..],
            &[
                Tag::Object.code(),
                Tag::PositiveZero.code(),
                Tag::Array.code(),
                Tag::PositiveZero.code(),
            ]
        );
    }
}
