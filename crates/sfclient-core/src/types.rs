//! Native type tags.

use serde::{Deserialize, Serialize};

/// The native representation a bound buffer or a result column uses.
///
/// This is a closed set: conversions match on it exhaustively, so adding a
/// variant forces every conversion site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeType {
    Boolean,
    Int8,
    Uint8,
    Int64,
    Uint64,
    Float64,
    /// Text; every column can be read into a string buffer
    String,
    Timestamp,
}

impl NativeType {
    pub const fn name(self) -> &'static str {
        match self {
            NativeType::Boolean => "BOOLEAN",
            NativeType::Int8 => "INT8",
            NativeType::Uint8 => "UINT8",
            NativeType::Int64 => "INT64",
            NativeType::Uint64 => "UINT64",
            NativeType::Float64 => "FLOAT64",
            NativeType::String => "STRING",
            NativeType::Timestamp => "TIMESTAMP",
        }
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            NativeType::Int8 | NativeType::Uint8 | NativeType::Int64 | NativeType::Uint64
        )
    }

    /// Can a buffer of this type receive a column whose native type is `column`?
    ///
    /// Only an exact match or a string buffer is accepted.
    pub fn accepts(self, column: NativeType) -> bool {
        self == column || self == NativeType::String
    }
}

impl std::fmt::Display for NativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_accepts_everything() {
        for column in [
            NativeType::Boolean,
            NativeType::Int8,
            NativeType::Uint8,
            NativeType::Int64,
            NativeType::Uint64,
            NativeType::Float64,
            NativeType::String,
            NativeType::Timestamp,
        ] {
            assert!(NativeType::String.accepts(column));
            assert!(column.accepts(column));
        }
    }

    #[test]
    fn no_implicit_widening() {
        assert!(!NativeType::Int64.accepts(NativeType::Float64));
        assert!(!NativeType::Uint64.accepts(NativeType::Int64));
        assert!(!NativeType::Int8.accepts(NativeType::Boolean));
    }

    #[test]
    fn integer_flags() {
        assert!(NativeType::Int8.is_integer());
        assert!(NativeType::Uint64.is_integer());
        assert!(!NativeType::Float64.is_integer());
        assert!(!NativeType::Boolean.is_integer());
    }
}
