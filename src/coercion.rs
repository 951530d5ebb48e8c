//! Conversion of [`DynamicValue`] leaves into statically requested types.
//!
//! Coercion is a pure match over the pair (requested type, value variant). It never panics: the
//! fallible [`try_coerce`] reports a [`CoercionError`], and [`coerce`] falls back to the
//! supplied default.
use serde::de::DeserializeOwned;

use crate::{value::format_timestamp, DynamicValue};

/// The leaf value doesn't have the shape of the requested type.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CoercionError {
    /// Variant is incompatible with the requested type.
    #[error("type mismatch (expected: {expected}, found: {found})")]
    TypeMismatch {
        /// Requested type.
        expected: &'static str,
        /// Variant of the resolved value.
        found: &'static str,
    },

    /// A number that cannot be represented in the requested numeric type.
    #[error("{value} cannot be represented as {expected}")]
    OutOfRange {
        /// Requested type.
        expected: &'static str,
        /// Textual form of the offending number.
        value: String,
    },

    /// Structured deserialization failed.
    #[error("failed to deserialize {expected}: {message}")]
    Deserialize {
        /// Requested type.
        expected: &'static str,
        /// Deserializer message.
        message: String,
    },
}

/// Types that can be produced from a [`DynamicValue`].
pub trait FromDynamicValue: Sized {
    /// Human-readable name of the type, used in error messages.
    fn expected() -> &'static str;

    /// Convert `value`. `Null` leaves are handled by the caller.
    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError>;

    /// Whether `Null` is a valid value for the type.
    fn accepts_null() -> bool {
        false
    }
}

/// Convert `raw` into `T`, reporting why the conversion failed.
pub fn try_coerce<T: FromDynamicValue>(raw: &DynamicValue) -> Result<T, CoercionError> {
    if raw.is_null() && !T::accepts_null() {
        return Err(mismatch::<T>(raw));
    }
    T::from_dynamic_value(raw)
}

/// Convert `raw` into `T`, or return `default` if it is absent or doesn't fit.
///
/// ```
/// # use confidence::{coercion::coerce, DynamicValue};
/// assert_eq!(coerce(Some(&DynamicValue::Float(2.0)), 0_i64), 2);
/// assert_eq!(coerce(Some(&DynamicValue::Float(2.5)), 0_i64), 0);
/// assert_eq!(coerce(None, "fallback".to_owned()), "fallback");
/// ```
pub fn coerce<T: FromDynamicValue>(raw: Option<&DynamicValue>, default: T) -> T {
    coerce_or_report(raw, default).0
}

/// Same as [`coerce`], returning the reason for falling back alongside the value.
pub fn coerce_or_report<T: FromDynamicValue>(
    raw: Option<&DynamicValue>,
    default: T,
) -> (T, Option<CoercionError>) {
    match raw.map(try_coerce::<T>) {
        None => (default, None),
        Some(Ok(value)) => (value, None),
        Some(Err(err)) => (default, Some(err)),
    }
}

fn mismatch<T: FromDynamicValue>(found: &DynamicValue) -> CoercionError {
    CoercionError::TypeMismatch {
        expected: T::expected(),
        found: found.kind(),
    }
}

fn out_of_range<T: FromDynamicValue>(value: impl ToString) -> CoercionError {
    CoercionError::OutOfRange {
        expected: T::expected(),
        value: value.to_string(),
    }
}

impl FromDynamicValue for bool {
    fn expected() -> &'static str {
        "bool"
    }

    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError> {
        // No truthy strings or numbers.
        value.as_bool().ok_or_else(|| mismatch::<Self>(value))
    }
}

impl FromDynamicValue for String {
    fn expected() -> &'static str {
        "string"
    }

    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError> {
        Ok(match value {
            DynamicValue::String(s) => s.clone(),
            DynamicValue::Timestamp(t) => format_timestamp(t),
            other => serde_json::Value::from(other).to_string(),
        })
    }
}

impl FromDynamicValue for i64 {
    fn expected() -> &'static str {
        "i64"
    }

    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError> {
        match value {
            DynamicValue::Int(i) => Ok(*i),
            DynamicValue::Float(f) => {
                // 2^63 is exactly representable, i64::MAX is not.
                const LIMIT: f64 = 9_223_372_036_854_775_808.0;
                if f.fract() == 0.0 && *f >= -LIMIT && *f < LIMIT {
                    Ok(*f as i64)
                } else {
                    Err(out_of_range::<Self>(f))
                }
            }
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromDynamicValue for i32 {
    fn expected() -> &'static str {
        "i32"
    }

    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError> {
        let wide = i64::from_dynamic_value(value).map_err(|err| match err {
            CoercionError::TypeMismatch { found, .. } => CoercionError::TypeMismatch {
                expected: Self::expected(),
                found,
            },
            CoercionError::OutOfRange { value, .. } => CoercionError::OutOfRange {
                expected: Self::expected(),
                value,
            },
            other => other,
        })?;
        i32::try_from(wide).map_err(|_| out_of_range::<Self>(wide))
    }
}

impl FromDynamicValue for f64 {
    fn expected() -> &'static str {
        "f64"
    }

    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError> {
        match value {
            DynamicValue::Float(f) => Ok(*f),
            DynamicValue::Int(i) => Ok(*i as f64),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromDynamicValue for f32 {
    fn expected() -> &'static str {
        "f32"
    }

    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError> {
        f64::from_dynamic_value(value)
            .map(|f| f as f32)
            .map_err(|_| mismatch::<Self>(value))
    }
}

impl FromDynamicValue for DynamicValue {
    fn expected() -> &'static str {
        "value"
    }

    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError> {
        Ok(value.clone())
    }

    fn accepts_null() -> bool {
        true
    }
}

impl FromDynamicValue for serde_json::Value {
    fn expected() -> &'static str {
        "json"
    }

    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError> {
        Ok(value.into())
    }

    fn accepts_null() -> bool {
        true
    }
}

/// Wrapper that coerces objects and arrays into any deserializable type.
///
/// ```
/// # use confidence::{coercion::{try_coerce, Structured}, DynamicValue};
/// #[derive(serde::Deserialize)]
/// struct Button {
///     color: String,
///     size: u32,
/// }
///
/// let raw: DynamicValue = serde_json::from_str(r#"{"color": "red", "size": 12}"#).unwrap();
/// let Structured(button) = try_coerce::<Structured<Button>>(&raw).unwrap();
/// assert_eq!(button.color, "red");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Structured<T>(pub T);

impl<T: DeserializeOwned> FromDynamicValue for Structured<T> {
    fn expected() -> &'static str {
        std::any::type_name::<T>()
    }

    fn from_dynamic_value(value: &DynamicValue) -> Result<Self, CoercionError> {
        serde_json::from_value(value.into())
            .map(Structured)
            .map_err(|err| CoercionError::Deserialize {
                expected: Self::expected(),
                message: err.to_string(),
            })
    }
}
