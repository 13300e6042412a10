//! Stored values
//!
//! `Value` is the self-describing datum held at every leaf of the state tree.
//! It round-trips through bincode (unlike `serde_json::Value`, which needs a
//! self-describing format), and converts to and from any serde type through
//! its own serializer and deserializer, so floats keep their exact bits
//! (NaN and infinities included).

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

mod decode;
mod encode;

/// A value stored at a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// A structured record. Stored whole at one leaf; not a sub-tree.
    Map(BTreeMap<String, Value>),
}

/// Error raised by the `Value` serializer and deserializer.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConversionError(String);

impl serde::ser::Error for ConversionError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ConversionError(msg.to_string())
    }
}

impl serde::de::Error for ConversionError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ConversionError(msg.to_string())
    }
}

impl Value {
    /// Convert any serializable type into a `Value`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, StoreError> {
        value
            .serialize(encode::ValueSerializer)
            .map_err(|e| StoreError::Conversion(format!("Failed to encode value: {}", e)))
    }

    /// Convert this value into a deserializable type.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        T::deserialize(self.clone())
            .map_err(|e| StoreError::Conversion(format!("Failed to decode value: {}", e)))
    }

    /// JSON view of this value. Bytes become an array of numbers; non-finite
    /// floats become the strings `"NaN"`, `"inf"` and `"-inf"`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or_else(|| Json::String(f.to_string())),
            Value::Str(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short type name used when rendering trees.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Float(x) if !x.is_finite() => write!(f, "{}", x),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}
