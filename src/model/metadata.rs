//! Opaque metadata blob attached to symbols and dependency edges.
//!
//! The indexer stores arbitrary JSON here (signatures, import specifiers,
//! visibility flags). The storage layer treats it as text; callers that know
//! the shape use the typed accessors.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serialized JSON object stored verbatim in a TEXT column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(String);

impl Default for Metadata {
    fn default() -> Self {
        Self("{}".to_string())
    }
}

impl Metadata {
    /// Wrap an already-serialized blob without validating it.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Serialize a typed value into a metadata blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn from_typed<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_string(value).map(Self)
    }

    /// The raw serialized text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the blob into a typed shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.0)
    }

    /// Look up a top-level key. Returns `None` for non-object blobs.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(&self.0).ok()? {
            Value::Object(mut map) => map.remove(key),
            _ => None,
        }
    }

    /// Look up a top-level string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(String::from))
    }

    /// Return a copy with `key` set to `value`.
    ///
    /// A blob that is not a JSON object is replaced by a fresh object.
    #[must_use]
    pub fn with(&self, key: &str, value: Value) -> Self {
        let mut map = match serde_json::from_str::<Value>(&self.0) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert(key.to_string(), value);
        Self(Value::Object(map).to_string())
    }
}

impl rusqlite::ToSql for Metadata {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl rusqlite::types::FromSql for Metadata {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        String::column_result(value).map(Self)
    }
}
