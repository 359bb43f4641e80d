//! Response-shape normalization at the API boundary.
//!
//! The backend is inconsistent about identifier types (numbers vs strings)
//! and list envelopes (`[...]` vs `{"data": [...]}`). Everything is folded
//! into one shape here so the rest of the crate never branches on it.
//! Field-name drift (`file_name` vs `fileName`) is handled with serde
//! aliases on the model types.

use crate::api::{ApiError, ApiResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::borrow::Cow;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl RawScalar {
    fn into_string(self) -> String {
        match self {
            RawScalar::Str(s) => s,
            RawScalar::Int(n) => n.to_string(),
            RawScalar::UInt(n) => n.to_string(),
            RawScalar::Float(n) => n.to_string(),
        }
    }
}

/// Deserialize an identifier that may be a JSON string or number.
pub fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RawScalar::deserialize(deserializer)?.into_string())
}

/// Optional variant of [`flexible_id`]; `null` maps to `None`.
pub fn flexible_id_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawScalar>::deserialize(deserializer)?.map(RawScalar::into_string))
}

/// Deserialize a count or byte size sent as a number, numeric string or null.
pub fn flexible_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawScalar>::deserialize(deserializer)?;
    Ok(match raw {
        None => 0,
        Some(RawScalar::UInt(n)) => n,
        Some(RawScalar::Int(n)) => n.max(0) as u64,
        Some(RawScalar::Float(n)) if n > 0.0 => n as u64,
        Some(RawScalar::Float(_)) => 0,
        Some(RawScalar::Str(s)) => s.trim().parse().unwrap_or(0),
    })
}

/// Envelope keys the backend has been seen to wrap lists in.
const COMMON_LIST_KEYS: &[&str] = &["data", "items", "results"];

/// Extract a typed list from a response that is either a bare array or an
/// object wrapping the array under one of `keys` (or a common envelope key).
pub fn unwrap_list<T: DeserializeOwned>(value: Value, keys: &[&str]) -> ApiResult<Vec<T>> {
    let array = find_list(value, keys)
        .ok_or_else(|| ApiError::Decode("expected a list in response".to_string()))?;

    serde_json::from_value(array).map_err(|e| ApiError::Decode(e.to_string()))
}

fn find_list(value: Value, keys: &[&str]) -> Option<Value> {
    match value {
        Value::Array(_) => Some(value),
        Value::Object(mut map) => {
            for key in keys.iter().chain(COMMON_LIST_KEYS) {
                if let Some(inner) = map.remove(*key) {
                    if let Some(found) = find_list(inner, keys) {
                        return Some(found);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

/// Extract a single object that may be wrapped under `key` or under a
/// `data` object (alongside envelope fields such as `success`).
pub fn unwrap_object<T: DeserializeOwned>(value: Value, key: &str) -> ApiResult<T> {
    let inner = match value {
        Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            return unwrap_object(map.remove("data").unwrap_or(Value::Null), key);
        }
        other => other,
    };

    serde_json::from_value(inner).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pull the filename hint out of a `Content-Disposition` header.
///
/// `filename*` (RFC 5987, percent-encoded) wins over plain `filename`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;

    for part in header.split(';') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');

        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
                let decoded = urlencoding::decode(encoded).ok().map(Cow::into_owned);
                if let Some(decoded) = decoded.filter(|s| !s.is_empty()) {
                    return sanitize_filename(&decoded);
                }
            }
            "filename" if !value.is_empty() => plain = Some(value.to_string()),
            _ => {}
        }
    }

    plain.and_then(|name| sanitize_filename(&name))
}

/// Keep only the final path component and refuse names that would escape
/// the download directory.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if last.is_empty() || last == "." || last == ".." {
        None
    } else {
        Some(last.to_string())
    }
}
