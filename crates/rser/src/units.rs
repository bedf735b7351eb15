//! Numeric wrappers and source positions carried as opaque payloads.

use crate::path::Path;

/// A signed span of time with nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Duration {
    nanos: i64,
}

impl Duration {
    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self {
            nanos: millis.saturating_mul(1_000_000),
        }
    }

    pub const fn as_nanos(self) -> i64 {
        self.nanos
    }

    pub fn as_millis_f64(self) -> f64 {
        self.nanos as f64 / 1_000_000.0
    }
}

/// A number counted from one, such as a line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OneIndexed(u32);

impl OneIndexed {
    pub const MIN: OneIndexed = OneIndexed(1);

    /// Returns `None` for zero.
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn to_zero_indexed(self) -> ZeroIndexed {
        ZeroIndexed(self.0 - 1)
    }
}

/// A number counted from zero, such as a column number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ZeroIndexed(u32);

impl ZeroIndexed {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns `None` if the one-indexed value would overflow.
    pub const fn to_one_indexed(self) -> Option<OneIndexed> {
        match self.0.checked_add(1) {
            Some(value) => Some(OneIndexed(value)),
            None => None,
        }
    }
}

/// A line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: OneIndexed,
    pub column: ZeroIndexed,
}

impl Position {
    pub const fn new(line: OneIndexed, column: ZeroIndexed) -> Self {
        Self { line, column }
    }
}

/// A span of source text in a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub path: Path,
    pub identifier_name: Option<String>,
    pub start: Position,
    pub end: Position,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_indexed_rejects_zero() {
        assert_eq!(OneIndexed::new(0), None);
        assert_eq!(OneIndexed::new(3).map(OneIndexed::get), Some(3));
        assert_eq!(OneIndexed::MIN.to_zero_indexed(), ZeroIndexed::new(0));
    }

    #[test]
    fn zero_indexed_overflow() {
        assert_eq!(ZeroIndexed::new(u32::MAX).to_one_indexed(), None);
        assert_eq!(ZeroIndexed::new(4).to_one_indexed(), OneIndexed::new(5));
    }

    #[test]
    fn duration_units() {
        let d = Duration::from_millis(3);
        assert_eq!(d.as_nanos(), 3_000_000);
        assert_eq!(d.as_millis_f64(), 3.0);
    }
}
