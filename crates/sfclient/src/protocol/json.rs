//! Typed field access on parsed JSON responses.

use std::collections::VecDeque;
use std::fmt;

use serde_json::Value;

/// Why a field could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonError {
    /// The field (or its parent object) is absent, or `null`
    Missing(&'static str),
    /// The field is present with another JSON type
    WrongType(&'static str),
}

impl JsonError {
    pub fn field(&self) -> &'static str {
        match self {
            JsonError::Missing(f) | JsonError::WrongType(f) => f,
        }
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonError::Missing(field) => write!(f, "missing field '{field}'"),
            JsonError::WrongType(field) => write!(f, "field '{field}' has the wrong type"),
        }
    }
}

impl std::error::Error for JsonError {}

fn field<'a>(object: Option<&'a Value>, name: &'static str) -> Result<&'a Value, JsonError> {
    match object.and_then(|o| o.get(name)) {
        None | Some(Value::Null) => Err(JsonError::Missing(name)),
        Some(v) => Ok(v),
    }
}

pub fn get_bool(object: Option<&Value>, name: &'static str) -> Result<bool, JsonError> {
    field(object, name)?
        .as_bool()
        .ok_or(JsonError::WrongType(name))
}

pub fn get_str<'a>(object: Option<&'a Value>, name: &'static str) -> Result<&'a str, JsonError> {
    field(object, name)?
        .as_str()
        .ok_or(JsonError::WrongType(name))
}

/// Read an integer sent either as a JSON number or as decimal text.
pub fn get_int(object: Option<&Value>, name: &'static str) -> Result<i64, JsonError> {
    match field(object, name)? {
        Value::Number(n) => n.as_i64().ok_or(JsonError::WrongType(name)),
        Value::String(s) => s.trim().parse().map_err(|_| JsonError::WrongType(name)),
        _ => Err(JsonError::WrongType(name)),
    }
}

/// Read a server error code. Anything unreadable counts as absent.
pub fn get_code(object: Option<&Value>, name: &'static str) -> Option<i64> {
    get_int(object, name).ok()
}

/// Move an array field out of its parent object.
///
/// The parent is left untouched when the field is missing or not an array.
pub fn detach_array(
    object: Option<&mut Value>,
    name: &'static str,
) -> Result<VecDeque<Value>, JsonError> {
    let map = object
        .and_then(Value::as_object_mut)
        .ok_or(JsonError::Missing(name))?;
    match map.get(name) {
        None | Some(Value::Null) => return Err(JsonError::Missing(name)),
        Some(Value::Array(_)) => {}
        Some(_) => return Err(JsonError::WrongType(name)),
    }
    match map.remove(name) {
        Some(Value::Array(items)) => Ok(items.into()),
        _ => Err(JsonError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_bool() {
        let v = json!({"success": true, "code": "1"});
        assert_eq!(get_bool(Some(&v), "success"), Ok(true));
        assert_eq!(get_bool(Some(&v), "code"), Err(JsonError::WrongType("code")));
        assert_eq!(get_bool(Some(&v), "other"), Err(JsonError::Missing("other")));
        assert_eq!(get_bool(None, "success"), Err(JsonError::Missing("success")));
    }

    #[test]
    fn test_get_int_accepts_text() {
        let v = json!({"a": 12, "b": "390100", "c": "x", "d": null});
        assert_eq!(get_int(Some(&v), "a"), Ok(12));
        assert_eq!(get_int(Some(&v), "b"), Ok(390_100));
        assert_eq!(get_int(Some(&v), "c"), Err(JsonError::WrongType("c")));
        assert_eq!(get_int(Some(&v), "d"), Err(JsonError::Missing("d")));
        assert_eq!(get_code(Some(&v), "c"), None);
    }

    #[test]
    fn test_get_str() {
        let v = json!({"queryId": "01b2", "n": 1});
        assert_eq!(get_str(Some(&v), "queryId"), Ok("01b2"));
        assert_eq!(get_str(Some(&v), "n"), Err(JsonError::WrongType("n")));
    }

    #[test]
    fn test_detach_array() {
        let mut v = json!({"rowset": [["1"], ["2"]], "total": 2});
        let rows = detach_array(Some(&mut v), "rowset").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], json!(["1"]));
        assert!(v.get("rowset").is_none());
        assert_eq!(v["total"], json!(2));

        let mut v = json!({"rowset": "nope"});
        assert_eq!(
            detach_array(Some(&mut v), "rowset"),
            Err(JsonError::WrongType("rowset"))
        );
        assert_eq!(v["rowset"], json!("nope"));
        assert_eq!(detach_array(None, "rowset"), Err(JsonError::Missing("rowset")));
    }
}
