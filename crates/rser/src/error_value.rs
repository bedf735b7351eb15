//! Error objects carried as values.
//!
//! An [`ErrorValue`] mirrors a host error: its class, name, message, stack
//! text, the optional system-error fields set by OS-level failures, and the
//! structured stack frames.

use crate::codes::ErrorClass;
use crate::path::Path;
use crate::units::{OneIndexed, ZeroIndexed};

/// Optional fields attached to errors raised by system calls.
///
/// Absent fields stay `None` across a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemErrorProps {
    pub address: Option<String>,
    pub code: Option<String>,
    pub dest: Option<String>,
    pub errno: Option<i32>,
    pub path: Option<String>,
    pub port: Option<u16>,
    pub syscall: Option<String>,
}

impl SystemErrorProps {
    pub fn is_empty(&self) -> bool {
        *self == SystemErrorProps::default()
    }
}

/// One stack frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    pub type_name: Option<String>,
    pub function_name: Option<String>,
    pub method_name: Option<String>,
    pub is_top_level: bool,
    pub is_eval: bool,
    pub is_native: bool,
    pub is_constructor: bool,
    pub path: Option<Path>,
    pub line: Option<OneIndexed>,
    pub column: Option<ZeroIndexed>,
}

/// Column of the templated frame table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameField {
    TypeName,
    FunctionName,
    MethodName,
    IsTopLevel,
    IsEval,
    IsNative,
    IsConstructor,
    Path,
    Line,
    Column,
}

impl FrameField {
    pub(crate) const ALL: [FrameField; 10] = [
        FrameField::TypeName,
        FrameField::FunctionName,
        FrameField::MethodName,
        FrameField::IsTopLevel,
        FrameField::IsEval,
        FrameField::IsNative,
        FrameField::IsConstructor,
        FrameField::Path,
        FrameField::Line,
        FrameField::Column,
    ];

    pub(crate) fn key(self) -> &'static str {
        match self {
            FrameField::TypeName => "typeName",
            FrameField::FunctionName => "functionName",
            FrameField::MethodName => "methodName",
            FrameField::IsTopLevel => "isTopLevel",
            FrameField::IsEval => "isEval",
            FrameField::IsNative => "isNative",
            FrameField::IsConstructor => "isConstructor",
            FrameField::Path => "path",
            FrameField::Line => "line",
            FrameField::Column => "column",
        }
    }

    pub(crate) fn from_key(key: &str) -> Option<FrameField> {
        FrameField::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// A structured error.
///
/// ```
/// use rser::{ErrorClass, ErrorValue};
///
/// let err = ErrorValue::new(ErrorClass::TypeError, "bad input");
/// assert_eq!(err.name, "TypeError");
/// assert!(err.frames.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub class: ErrorClass,
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub system: SystemErrorProps,
    pub frames: Vec<StackFrame>,
}

impl ErrorValue {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            name: class.name().to_owned(),
            message: message.into(),
            stack: None,
            system: SystemErrorProps::default(),
            frames: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_system_props(mut self, system: SystemErrorProps) -> Self {
        self.system = system;
        self
    }

    /// Borrowed view of the parts written to the wire.
    pub fn structure(&self) -> ErrorStructure<'_> {
        ErrorStructure {
            name: &self.name,
            message: &self.message,
            stack: self.stack.as_deref(),
            frames: &self.frames,
            system: &self.system,
        }
    }

    pub fn set_frames(&mut self, frames: Vec<StackFrame>) {
        self.frames = frames;
    }

    pub fn set_system_props(&mut self, system: SystemErrorProps) {
        self.system = system;
    }
}

/// The serializable parts of an [`ErrorValue`], class aside.
#[derive(Debug, Clone, Copy)]
pub struct ErrorStructure<'a> {
    pub name: &'a str,
    pub message: &'a str,
    pub stack: Option<&'a str>,
    pub frames: &'a [StackFrame],
    pub system: &'a SystemErrorProps,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_keys_resolve() {
        for field in FrameField::ALL {
            assert_eq!(FrameField::from_key(field.key()), Some(field));
        }
        assert_eq!(FrameField::from_key("fileName"), None);
    }

    #[test]
    fn uri_error_name() {
        let err = ErrorValue::new(ErrorClass::UriError, "bad %");
        assert_eq!(err.name, "URIError");
        assert!(err.system.is_empty());
    }

    #[test]
    fn structure_borrows_every_part() {
        let err = ErrorValue::new(ErrorClass::Error, "boom")
            .with_stack("Error: boom")
            .with_frames(vec![StackFrame::default()]);
        let structure = err.structure();
        assert_eq!(structure.name, "Error");
        assert_eq!(structure.message, "boom");
        assert_eq!(structure.stack, Some("Error: boom"));
        assert_eq!(structure.frames.len(), 1);
        assert!(structure.system.is_empty());
    }
}
