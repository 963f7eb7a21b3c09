//! Webservice call parameters and their form-urlencoded wire encoding.
//!
//! # Design
//! `Params` is an insertion-ordered map of JSON values. The webservice
//! expects PHP-style nested keys, so arrays and objects flatten into
//! bracketed keys (`courseids[0]=2`, `options[ids][0]=7`) before being
//! percent-encoded. Keys and values are escaped the same way, brackets
//! included, with only RFC 3986 unreserved characters left as-is.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Keys the client fills in on every call.
pub const RESERVED_KEYS: [&str; 3] = ["wstoken", "wsfunction", "moodlewsrestformat"];

/// Everything except RFC 3986 unreserved characters.
const FORM_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Parameters for a single webservice function call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build parameters from any value that serializes to a JSON object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        match serde_json::to_value(value).map_err(|e| ApiError::InvalidArgument(e.to_string()))? {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ApiError::InvalidArgument(format!(
                "parameters must serialize to an object, got {}",
                value_kind(&other)
            ))),
        }
    }

    /// Insert a parameter, replacing any previous value under `key` in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Reserved keys this parameter set would shadow.
    pub fn reserved_keys(&self) -> Vec<&'static str> {
        RESERVED_KEYS
            .iter()
            .copied()
            .filter(|key| self.0.contains_key(*key))
            .collect()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Serialize a map into a form-urlencoded body.
///
/// Empty arrays and objects produce no pairs; `null` produces `key=`.
pub fn encode(map: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in map {
        flatten(key.clone(), value, &mut pairs);
    }
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", escape(key), escape(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn flatten(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => out.push((prefix, String::new())),
        Value::Bool(b) => out.push((prefix, b.to_string())),
        Value::Number(n) => out.push((prefix, n.to_string())),
        Value::String(s) => out.push((prefix, s.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(format!("{prefix}[{index}]"), item, out);
            }
        }
        Value::Object(fields) => {
            for (key, item) in fields {
                flatten(format!("{prefix}[{key}]"), item, out);
            }
        }
    }
}

fn escape(raw: &str) -> String {
    utf8_percent_encode(raw, FORM_ESCAPE).to_string()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
