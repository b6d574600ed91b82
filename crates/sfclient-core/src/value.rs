//! Typed values for parameter binding and result fetching.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::types::NativeType;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// A point in time as carried on the wire: seconds and nanoseconds relative
/// to the Unix epoch (or to midnight for TIME columns), plus the time-zone
/// offset for zoned timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub epoch_seconds: i64,
    /// Always below one second
    pub nanos: u32,
    /// Offset from UTC in minutes, only for zoned timestamps
    pub offset_minutes: Option<i32>,
}

impl Timestamp {
    pub fn new(epoch_seconds: i64, nanos: u32) -> Self {
        debug_assert!(i128::from(nanos) < NANOS_PER_SECOND);
        Self {
            epoch_seconds,
            nanos,
            offset_minutes: None,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, minutes: i32) -> Self {
        self.offset_minutes = Some(minutes);
        self
    }

    /// Build from a nanosecond count, flooring toward negative infinity.
    pub fn from_epoch_nanos(nanos: i128) -> Option<Self> {
        let seconds = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
        let rem = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).ok()?;
        Some(Self::new(seconds, rem))
    }

    pub fn as_epoch_nanos(&self) -> i128 {
        i128::from(self.epoch_seconds) * NANOS_PER_SECOND + i128::from(self.nanos)
    }
}

/// A value bound to a statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputValue {
    Boolean(bool),
    Int8(i8),
    Uint8(u8),
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    Text(String),
    Timestamp(Timestamp),
    /// SQL NULL sent under the given type
    Null(NativeType),
}

impl InputValue {
    pub fn native_type(&self) -> NativeType {
        match self {
            InputValue::Boolean(_) => NativeType::Boolean,
            InputValue::Int8(_) => NativeType::Int8,
            InputValue::Uint8(_) => NativeType::Uint8,
            InputValue::Int64(_) => NativeType::Int64,
            InputValue::Uint64(_) => NativeType::Uint64,
            InputValue::Float64(_) => NativeType::Float64,
            InputValue::Text(_) => NativeType::String,
            InputValue::Timestamp(_) => NativeType::Timestamp,
            InputValue::Null(ty) => *ty,
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, InputValue::Null(_))
    }
}

impl From<bool> for InputValue {
    fn from(v: bool) -> Self {
        InputValue::Boolean(v)
    }
}

impl From<i8> for InputValue {
    fn from(v: i8) -> Self {
        InputValue::Int8(v)
    }
}

impl From<u8> for InputValue {
    fn from(v: u8) -> Self {
        InputValue::Uint8(v)
    }
}

impl From<i32> for InputValue {
    fn from(v: i32) -> Self {
        InputValue::Int64(i64::from(v))
    }
}

impl From<i64> for InputValue {
    fn from(v: i64) -> Self {
        InputValue::Int64(v)
    }
}

impl From<u64> for InputValue {
    fn from(v: u64) -> Self {
        InputValue::Uint64(v)
    }
}

impl From<f64> for InputValue {
    fn from(v: f64) -> Self {
        InputValue::Float64(v)
    }
}

impl From<&str> for InputValue {
    fn from(v: &str) -> Self {
        InputValue::Text(v.to_string())
    }
}

impl From<String> for InputValue {
    fn from(v: String) -> Self {
        InputValue::Text(v)
    }
}

impl From<Timestamp> for InputValue {
    fn from(v: Timestamp) -> Self {
        InputValue::Timestamp(v)
    }
}

/// A converted column value, ready to be written into an [`OutputBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Boolean(bool),
    Int8(i8),
    Uint8(u8),
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    Text(String),
    Timestamp(Timestamp),
}

impl OutputValue {
    pub fn native_type(&self) -> NativeType {
        match self {
            OutputValue::Boolean(_) => NativeType::Boolean,
            OutputValue::Int8(_) => NativeType::Int8,
            OutputValue::Uint8(_) => NativeType::Uint8,
            OutputValue::Int64(_) => NativeType::Int64,
            OutputValue::Uint64(_) => NativeType::Uint64,
            OutputValue::Float64(_) => NativeType::Float64,
            OutputValue::Text(_) => NativeType::String,
            OutputValue::Timestamp(_) => NativeType::Timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Stored {
    Empty,
    Null,
    Scalar(OutputValue),
    /// Bytes kept after truncation to the buffer capacity
    Text(Vec<u8>),
}

/// A typed result buffer bound to a result column.
///
/// String buffers have a capacity. Longer values are truncated to it while
/// [`len`](OutputBuffer::len) keeps reporting the full source length, so
/// `len() > capacity()` means the value was cut.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBuffer {
    native_type: NativeType,
    capacity: usize,
    stored: Stored,
    len: usize,
}

impl OutputBuffer {
    /// Create a buffer of the given type. String buffers made this way are unbounded.
    pub fn new(native_type: NativeType) -> Self {
        Self {
            native_type,
            capacity: usize::MAX,
            stored: Stored::Empty,
            len: 0,
        }
    }

    /// Create a string buffer holding at most `capacity` bytes.
    pub fn string(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::new(NativeType::String)
        }
    }

    pub fn native_type(&self) -> NativeType {
        self.native_type
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Source length of the last written string value, 0 for other types.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True until a fetch writes into this buffer.
    pub fn is_empty(&self) -> bool {
        matches!(self.stored, Stored::Empty)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.stored, Stored::Null)
    }

    pub fn is_truncated(&self) -> bool {
        self.native_type == NativeType::String && self.len > self.capacity
    }

    /// Write a converted value, or `None` for SQL NULL.
    ///
    /// The value must already have this buffer's native type.
    pub fn write(&mut self, value: Option<OutputValue>) {
        match value {
            None => {
                self.stored = Stored::Null;
                self.len = 0;
            }
            Some(OutputValue::Text(text)) => {
                debug_assert_eq!(self.native_type, NativeType::String);
                self.len = text.len();
                let mut bytes = text.into_bytes();
                if bytes.len() > self.capacity {
                    tracing::trace!(
                        capacity = self.capacity,
                        len = self.len,
                        "String value truncated"
                    );
                    bytes.truncate(self.capacity);
                }
                self.stored = Stored::Text(bytes);
            }
            Some(other) => {
                debug_assert_eq!(other.native_type(), self.native_type);
                self.len = 0;
                self.stored = Stored::Scalar(other);
            }
        }
    }

    /// Forget the last written value.
    pub fn reset(&mut self) {
        self.stored = Stored::Empty;
        self.len = 0;
    }

    pub fn value(&self) -> Option<&OutputValue> {
        match &self.stored {
            Stored::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value()? {
            OutputValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self.value()? {
            OutputValue::Int8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self.value()? {
            OutputValue::Uint8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value()? {
            OutputValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.value()? {
            OutputValue::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value()? {
            OutputValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self.value()? {
            OutputValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// The stored string bytes, at most `capacity` of them.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.stored {
            Stored::Text(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The stored string, `None` if truncation split a character.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()?).ok()
    }

    pub fn as_str_lossy(&self) -> Option<Cow<'_, str>> {
        self.as_bytes().map(String::from_utf8_lossy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_nanos_round_trip() {
        let ts = Timestamp::new(1_700_000_000, 123_456_789);
        assert_eq!(Timestamp::from_epoch_nanos(ts.as_epoch_nanos()), Some(ts));

        let before_epoch = Timestamp::from_epoch_nanos(-1).unwrap();
        assert_eq!(before_epoch.epoch_seconds, -1);
        assert_eq!(before_epoch.nanos, 999_999_999);
    }

    #[test]
    fn input_value_types() {
        assert_eq!(InputValue::from(7_i32).native_type(), NativeType::Int64);
        assert_eq!(InputValue::from("x").native_type(), NativeType::String);
        assert_eq!(InputValue::from(1.5).native_type(), NativeType::Float64);
        assert_eq!(
            InputValue::Null(NativeType::Uint64).native_type(),
            NativeType::Uint64
        );
        assert!(InputValue::Null(NativeType::Boolean).is_null());
    }

    #[test]
    fn string_buffer_truncates_and_reports_source_length() {
        let mut buf = OutputBuffer::string(4);
        assert!(buf.is_empty());

        buf.write(Some(OutputValue::Text("snowfall".to_string())));
        assert_eq!(buf.as_str(), Some("snow"));
        assert_eq!(buf.len(), 8);
        assert!(buf.is_truncated());

        buf.write(Some(OutputValue::Text("ab".to_string())));
        assert_eq!(buf.as_str(), Some("ab"));
        assert_eq!(buf.len(), 2);
        assert!(!buf.is_truncated());
    }

    #[test]
    fn truncation_inside_a_character() {
        let mut buf = OutputBuffer::string(1);
        buf.write(Some(OutputValue::Text("é".to_string())));
        assert_eq!(buf.as_str(), None);
        assert_eq!(buf.as_bytes().map(<[u8]>::len), Some(1));
        assert_eq!(buf.as_str_lossy().as_deref(), Some("\u{FFFD}"));
    }

    #[test]
    fn null_and_scalar_writes() {
        let mut buf = OutputBuffer::new(NativeType::Int64);
        buf.write(Some(OutputValue::Int64(42)));
        assert_eq!(buf.as_i64(), Some(42));
        assert!(!buf.is_null());

        buf.write(None);
        assert!(buf.is_null());
        assert_eq!(buf.as_i64(), None);

        buf.reset();
        assert!(buf.is_empty());
    }
}
