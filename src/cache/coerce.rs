//! Type narrowing applied to every value written to or returned from the cache
//!
//! Identifier and date types become strings; numbers, booleans and strings
//! pass through; arrays and objects recurse. `bson` serializes `ObjectId` as
//! `{"$oid": ...}` and `DateTime` as `{"$date": ...}`, so those wrappers are
//! unwrapped here. Dates render as RFC 3339 with millisecond precision in UTC.

use super::errors::{CacheError, CacheResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// Serialize and narrow a value to its cached JSON form
pub fn to_cache_json<V: Serialize + ?Sized>(value: &V) -> CacheResult<Value> {
    Ok(narrow(serde_json::to_value(value)?))
}

/// Decode a cached JSON value into the caller's type
pub fn from_cache_json<T: DeserializeOwned>(value: Value) -> CacheResult<T> {
    serde_json::from_value(value).map_err(|e| CacheError::SerializationError(e.to_string()))
}

/// Narrow an already serialized value
pub fn narrow(value: Value) -> Value {
    match value {
        Value::Object(map) => narrow_object(map),
        Value::Array(items) => Value::Array(items.into_iter().map(narrow).collect()),
        other => other,
    }
}

fn narrow_object(map: Map<String, Value>) -> Value {
    if map.len() == 1 {
        if let Some(Value::String(hex)) = map.get("$oid") {
            return Value::String(hex.clone());
        }
        if let Some(date) = map.get("$date").and_then(extended_date) {
            return Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
    }

    Value::Object(
        map.into_iter()
            .map(|(key, value)| (key, narrow(value)))
            .collect(),
    )
}

/// `$date` payloads: relaxed (RFC 3339 string), canonical
/// (`{"$numberLong": "ms"}`) or a plain millisecond number
fn extended_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|date| date.with_timezone(&Utc)),
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(inner) => inner
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
