//! Owned SQL argument values.
//!
//! Compiled statements carry their arguments as an ordered `Vec<Value>` so
//! that the core stays independent of any particular driver. The executing
//! layer converts each [`Value`] into whatever its driver binds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A positional statement argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// UUID value
    Uuid(Uuid),
    /// Calendar date
    Date(NaiveDate),
    /// Timestamp without time zone
    DateTime(NaiveDateTime),
    /// Timestamp with UTC offset
    DateTimeUtc(DateTime<Utc>),
    /// JSON document
    Json(serde_json::Value),
}

impl Value {
    /// Whether this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value can serve as a join/grouping key.
    ///
    /// NULL never joins in SQL, and a NaN float is not equal to itself, so
    /// both are skipped wherever values are used as keys.
    pub fn is_joinable(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Float(f) => !f.is_nan(),
            _ => true,
        }
    }
}

// Reflexivity caveat: `Float(f64::NAN)` is never equal to itself, matching
// f64. Key-based code must filter such values out via `is_joinable` instead
// of relying on map/set semantics for them.
impl Eq for Value {}

// Values are used as grouping keys during preload, so they need a Hash
// consistent with PartialEq. Floats hash by bit pattern with negative zero
// normalized; JSON documents hash by discriminant only (they are legal but
// unusual join keys).
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => {
                let bits = if *f == 0.0 { 0u64 } else { f.to_bits() };
                bits.hash(state);
            }
            Value::Text(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Uuid(u) => u.hash(state),
            Value::Date(d) => d.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::DateTimeUtc(dt) => dt.hash(state),
            Value::Json(_) => {}
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Uuid(u) => write!(f, "'{u}'"),
            Value::Date(d) => write!(f, "'{d}'"),
            Value::DateTime(dt) => write!(f, "'{dt}'"),
            Value::DateTimeUtc(dt) => write!(f, "'{dt}'"),
            Value::Json(j) => write!(f, "{j}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTimeUtc(dt)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
