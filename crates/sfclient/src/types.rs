//! Wire types and value conversion.
//!
//! Every result value arrives as JSON text (or `null`). This module decides
//! which native type a column maps to, converts a single cell into an
//! [`OutputValue`] for a bound buffer, and renders bound input values into
//! their wire `{type, value}` form.
//!
//! # Temporal encoding
//!
//! | Wire type                       | Text                         |
//! |---------------------------------|------------------------------|
//! | `DATE`                          | days since the epoch         |
//! | `TIME`                          | `secs[.frac]` since midnight |
//! | `TIMESTAMP_NTZ`, `TIMESTAMP_LTZ`| `secs[.frac]` since the epoch|
//! | `TIMESTAMP_TZ`                  | `secs[.frac] <offset+1440>`  |

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use sfclient_core::{Error, InputValue, NativeType, OutputValue, Timestamp, TypeError, TypeErrorKind};

const SECONDS_PER_DAY: i64 = 86_400;
const NANOS_PER_SECOND: i128 = 1_000_000_000;
/// Bias added to time-zone offsets (in minutes) on the wire.
const TZ_OFFSET_BIAS: i32 = 1440;

/// Logical column types reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Fixed,
    Real,
    Text,
    Date,
    Time,
    TimestampLtz,
    TimestampNtz,
    TimestampTz,
    Variant,
    Object,
    Array,
    Binary,
    Boolean,
}

impl WireType {
    pub const fn name(self) -> &'static str {
        match self {
            WireType::Fixed => "FIXED",
            WireType::Real => "REAL",
            WireType::Text => "TEXT",
            WireType::Date => "DATE",
            WireType::Time => "TIME",
            WireType::TimestampLtz => "TIMESTAMP_LTZ",
            WireType::TimestampNtz => "TIMESTAMP_NTZ",
            WireType::TimestampTz => "TIMESTAMP_TZ",
            WireType::Variant => "VARIANT",
            WireType::Object => "OBJECT",
            WireType::Array => "ARRAY",
            WireType::Binary => "BINARY",
            WireType::Boolean => "BOOLEAN",
        }
    }

    /// Parse a type name. Unknown names are treated as text.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "FIXED" => WireType::Fixed,
            "REAL" => WireType::Real,
            "DATE" => WireType::Date,
            "TIME" => WireType::Time,
            "TIMESTAMP_LTZ" => WireType::TimestampLtz,
            "TIMESTAMP_NTZ" => WireType::TimestampNtz,
            "TIMESTAMP_TZ" => WireType::TimestampTz,
            "VARIANT" => WireType::Variant,
            "OBJECT" => WireType::Object,
            "ARRAY" => WireType::Array,
            "BINARY" => WireType::Binary,
            "BOOLEAN" => WireType::Boolean,
            _ => WireType::Text,
        }
    }

    pub const fn is_temporal(self) -> bool {
        matches!(
            self,
            WireType::Date
                | WireType::Time
                | WireType::TimestampLtz
                | WireType::TimestampNtz
                | WireType::TimestampTz
        )
    }

    /// Native type used to read a column of this type.
    pub const fn native_type(self, scale: i64) -> NativeType {
        match self {
            WireType::Fixed if scale == 0 => NativeType::Int64,
            WireType::Fixed | WireType::Real => NativeType::Float64,
            WireType::Boolean => NativeType::Boolean,
            WireType::Date
            | WireType::Time
            | WireType::TimestampLtz
            | WireType::TimestampNtz
            | WireType::TimestampTz => NativeType::Timestamp,
            WireType::Text
            | WireType::Variant
            | WireType::Object
            | WireType::Array
            | WireType::Binary => NativeType::String,
        }
    }

    /// Wire type used to send a bound value of the given native type.
    ///
    /// Timestamp inputs are sent as `TIMESTAMP_NTZ`.
    pub const fn for_input(native: NativeType) -> Self {
        match native {
            NativeType::Boolean => WireType::Boolean,
            NativeType::Int8 | NativeType::Uint8 | NativeType::Int64 | NativeType::Uint64 => {
                WireType::Fixed
            }
            NativeType::Float64 => WireType::Real,
            NativeType::String => WireType::Text,
            NativeType::Timestamp => WireType::TimestampNtz,
        }
    }
}

impl std::fmt::Display for WireType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Description of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub wire_type: WireType,
    pub native_type: NativeType,
    pub precision: Option<i64>,
    pub scale: i64,
    pub length: Option<i64>,
    pub byte_length: Option<i64>,
    pub nullable: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RowTypeEntry {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    type_name: String,
    precision: Option<i64>,
    scale: Option<i64>,
    length: Option<i64>,
    byte_length: Option<i64>,
    #[serde(default = "default_nullable")]
    nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDesc {
    /// Build a descriptor from one `rowtype` entry.
    pub fn from_json(entry: &JsonValue) -> Result<Self, serde_json::Error> {
        let entry = RowTypeEntry::deserialize(entry)?;
        let wire_type = WireType::from_name(&entry.type_name);
        let scale = entry.scale.unwrap_or(0);
        Ok(Self {
            name: entry.name,
            wire_type,
            native_type: wire_type.native_type(scale),
            precision: entry.precision,
            scale,
            length: entry.length,
            byte_length: entry.byte_length,
            nullable: entry.nullable,
        })
    }
}

/// Convert one result cell for a buffer of type `target`.
///
/// `position` is the 1-based column index, used in error messages.
/// Returns `Ok(None)` for SQL NULL.
pub fn decode_value(
    target: NativeType,
    column: &ColumnDesc,
    position: usize,
    cell: &JsonValue,
) -> Result<Option<OutputValue>, Error> {
    if cell.is_null() {
        return Ok(None);
    }
    let fail = |msg: String| conversion_error(position, target, column.native_type, msg);

    let value = match target {
        NativeType::Boolean => OutputValue::Boolean(match cell {
            JsonValue::Bool(b) => *b,
            other => {
                let text = cell_text(other);
                parse_bool(&text).ok_or_else(|| fail(format!("'{text}' is not a boolean")))?
            }
        }),
        NativeType::Int8 => OutputValue::Int8(match cell {
            JsonValue::Bool(b) => i8::from(*b),
            other => i8::from_ne_bytes([cell_text(other).bytes().next().unwrap_or(0)]),
        }),
        NativeType::Uint8 => {
            OutputValue::Uint8(cell_text(cell).bytes().next().unwrap_or(0))
        }
        NativeType::Int64 => {
            let text = cell_text(cell);
            OutputValue::Int64(
                text.trim()
                    .parse()
                    .map_err(|_| fail(format!("'{text}' is not a 64-bit integer")))?,
            )
        }
        NativeType::Uint64 => {
            let text = cell_text(cell);
            OutputValue::Uint64(
                text.trim()
                    .parse()
                    .map_err(|_| fail(format!("'{text}' is not an unsigned 64-bit integer")))?,
            )
        }
        NativeType::Float64 => {
            let text = cell_text(cell);
            OutputValue::Float64(
                text.trim()
                    .parse()
                    .map_err(|_| fail(format!("'{text}' is not a number")))?,
            )
        }
        NativeType::String => OutputValue::Text(cell_text(cell).into_owned()),
        NativeType::Timestamp => {
            let text = cell_text(cell);
            OutputValue::Timestamp(parse_temporal(column.wire_type, &text).ok_or_else(|| {
                fail(format!(
                    "'{text}' is not a valid {} value",
                    column.wire_type
                ))
            })?)
        }
    };
    Ok(Some(value))
}

/// Render a bound input value as its wire type and text.
///
/// `None` means SQL NULL.
pub fn render_input(value: &InputValue) -> (WireType, Option<String>) {
    let wire_type = WireType::for_input(value.native_type());
    let text = match value {
        InputValue::Boolean(v) => Some(v.to_string()),
        InputValue::Int8(v) => Some(v.to_string()),
        InputValue::Uint8(v) => Some(v.to_string()),
        InputValue::Int64(v) => Some(v.to_string()),
        InputValue::Uint64(v) => Some(v.to_string()),
        InputValue::Float64(v) => Some(v.to_string()),
        InputValue::Text(v) => Some(v.clone()),
        InputValue::Timestamp(ts) => Some(ts.as_epoch_nanos().to_string()),
        InputValue::Null(_) => None,
    };
    (wire_type, text)
}

/// Text of a cell; strings are borrowed, scalars are formatted.
fn cell_text(cell: &JsonValue) -> Cow<'_, str> {
    match cell {
        JsonValue::String(s) => Cow::Borrowed(s),
        JsonValue::Null => Cow::Borrowed(""),
        JsonValue::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        other => Cow::Owned(other.to_string()),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text == "1" || text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text == "0" || text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse `[-]secs[.frac]` into nanoseconds.
fn parse_scaled_seconds(text: &str) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, frac) = match digits.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (digits, ""),
    };
    if whole.is_empty() || frac.len() > 9 {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let seconds: i128 = whole.parse().ok()?;
    let mut nanos: i128 = 0;
    if !frac.is_empty() {
        let scale = 10_i128.pow(9 - u32::try_from(frac.len()).ok()?);
        nanos = frac.parse::<i128>().ok()? * scale;
    }
    let total = seconds.checked_mul(NANOS_PER_SECOND)?.checked_add(nanos)?;
    Some(if negative { -total } else { total })
}

fn parse_temporal(wire_type: WireType, text: &str) -> Option<Timestamp> {
    let text = text.trim();
    match wire_type {
        WireType::Date => {
            let days: i64 = text.parse().ok()?;
            Some(Timestamp::new(days.checked_mul(SECONDS_PER_DAY)?, 0))
        }
        WireType::Time | WireType::TimestampLtz | WireType::TimestampNtz => {
            Timestamp::from_epoch_nanos(parse_scaled_seconds(text)?)
        }
        WireType::TimestampTz => {
            let (seconds, offset) = text.split_once(' ')?;
            let offset: i32 = offset.trim().parse().ok()?;
            if !(0..=2 * TZ_OFFSET_BIAS).contains(&offset) {
                return None;
            }
            let ts = Timestamp::from_epoch_nanos(parse_scaled_seconds(seconds)?)?;
            Some(ts.with_offset(offset.checked_sub(TZ_OFFSET_BIAS)?))
        }
        _ => None,
    }
}

fn conversion_error(
    position: usize,
    expected: NativeType,
    actual: NativeType,
    message: String,
) -> Error {
    Error::Type(TypeError {
        kind: TypeErrorKind::Conversion,
        column: position,
        expected,
        actual,
        message,
    })
}
