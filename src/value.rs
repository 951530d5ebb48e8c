use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use derive_more::From;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Key-value map of [`DynamicValue`]s. Flag values and evaluation contexts are objects.
pub type Object = HashMap<String, DynamicValue>;

/// Any raw value that comes from the wire or from the caller.
///
/// All navigation and type coercion operate on this union. Conveniently implements `From`
/// conversions for the primitive types.
///
/// ```
/// # use confidence::DynamicValue;
/// let enabled: DynamicValue = true.into();
/// let limit: DynamicValue = 42.into();
/// let color: DynamicValue = "blue".into();
/// ```
#[derive(Debug, Clone, PartialEq, From)]
pub enum DynamicValue {
    /// A null value or absence of value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// An integral number.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string value.
    String(String),
    /// A point in time. Travels as an RFC 3339 string on the wire.
    Timestamp(DateTime<Utc>),
    /// A nested object.
    Object(Object),
    /// A list of values.
    Array(Vec<DynamicValue>),
}

impl DynamicValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DynamicValue::Null => "null",
            DynamicValue::Bool(_) => "bool",
            DynamicValue::Int(_) => "int",
            DynamicValue::Float(_) => "float",
            DynamicValue::String(_) => "string",
            DynamicValue::Timestamp(_) => "timestamp",
            DynamicValue::Object(_) => "object",
            DynamicValue::Array(_) => "array",
        }
    }

    /// Returns `true` for [`DynamicValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    /// The boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The fields, if this is an `Object`.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            DynamicValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// The elements, if this is an `Array`.
    pub fn as_array(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::Array(list) => Some(list),
            _ => None,
        }
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i32> for DynamicValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<serde_json::Value> for DynamicValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DynamicValue::Null,
            serde_json::Value::Bool(b) => DynamicValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => DynamicValue::Int(i),
                // Without `arbitrary_precision` every JSON number fits into f64.
                None => DynamicValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => DynamicValue::String(s),
            serde_json::Value::Array(list) => {
                DynamicValue::Array(list.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => DynamicValue::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<&DynamicValue> for serde_json::Value {
    fn from(value: &DynamicValue) -> Self {
        match value {
            DynamicValue::Null => serde_json::Value::Null,
            DynamicValue::Bool(b) => serde_json::Value::Bool(*b),
            DynamicValue::Int(i) => serde_json::Value::Number((*i).into()),
            DynamicValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            DynamicValue::String(s) => serde_json::Value::String(s.clone()),
            DynamicValue::Timestamp(t) => serde_json::Value::String(format_timestamp(t)),
            DynamicValue::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
            ),
            DynamicValue::Array(list) => {
                serde_json::Value::Array(list.iter().map(Into::into).collect())
            }
        }
    }
}

pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl Serialize for DynamicValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DynamicValue::Null => serializer.serialize_unit(),
            DynamicValue::Bool(b) => serializer.serialize_bool(*b),
            DynamicValue::Int(i) => serializer.serialize_i64(*i),
            DynamicValue::Float(f) => serializer.serialize_f64(*f),
            DynamicValue::String(s) => serializer.serialize_str(s),
            DynamicValue::Timestamp(t) => serializer.serialize_str(&format_timestamp(t)),
            DynamicValue::Object(map) => map.serialize(serializer),
            DynamicValue::Array(list) => list.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DynamicValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(DynamicValue::from)
    }
}
