//! Common types and utilities shared across models.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize a boolean flag that the backend may emit as `true`/`false`,
/// `0`/`1`, or `null`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Some(other) => Err(D::Error::custom(format!(
            "expected boolean flag, found {}",
            other
        ))),
    }
}

/// Deserialize an optional text field that is sometimes stored as a number
/// (student IDs, academic year).
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, found {}",
            other
        ))),
    }
}

/// Pull a list out of a response that is either a bare array or an object
/// wrapping the array under `key`. A missing key yields an empty list.
pub fn list_from(value: Value, key: &str) -> Result<Value, serde_json::Error> {
    match value {
        Value::Array(_) => Ok(value),
        Value::Object(mut map) => Ok(map.remove(key).unwrap_or(Value::Array(Vec::new()))),
        Value::Null => Ok(Value::Array(Vec::new())),
        other => Err(serde_json::Error::custom(format!(
            "expected list under '{}', found {}",
            key, other
        ))),
    }
}
