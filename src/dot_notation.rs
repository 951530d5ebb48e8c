//! Dot-notation flag keys.
//!
//! A flag key of the form `flag.property.nested` addresses the field `property.nested` inside the
//! value of flag `flag`. Only the base name is sent to the resolver; the property path is applied
//! to the resolved value locally.
use std::borrow::Cow;

use crate::{DynamicValue, Object};

/// Reserved key. Some flags wrap their payload under it, others don't.
pub const VALUE_KEY: &str = "value";

/// A flag key split into base flag name and property path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagKey<'a> {
    /// Base flag name, sent to the resolver.
    pub flag_name: &'a str,
    property_path: Option<&'a str>,
}

impl<'a> FlagKey<'a> {
    /// Property path segments, in order. Empty segments are kept.
    pub fn property_path(&self) -> Vec<&'a str> {
        match self.property_path {
            Some(path) => path.split('.').collect(),
            None => Vec::new(),
        }
    }
}

/// Split `flag_key` on `.` into base flag name and property path.
///
/// ```
/// # use confidence::dot_notation::parse;
/// let key = parse("checkout.button.color");
/// assert_eq!(key.flag_name, "checkout");
/// assert_eq!(key.property_path(), ["button", "color"]);
/// ```
pub fn parse(flag_key: &str) -> FlagKey<'_> {
    match flag_key.split_once('.') {
        Some((flag_name, property_path)) => FlagKey {
            flag_name,
            property_path: Some(property_path),
        },
        None => FlagKey {
            flag_name: flag_key,
            property_path: None,
        },
    }
}

/// Walk `root` down `path`. Returns `None` when a segment is missing or an intermediate value is
/// not an object.
pub fn navigate<'v>(root: &'v DynamicValue, path: &[&str]) -> Option<&'v DynamicValue> {
    path.iter()
        .try_fold(root, |current, segment| current.as_object()?.get(*segment))
}

/// Extract the value addressed by `property_path` from a resolved flag value.
///
/// Navigation starts from the nested [`VALUE_KEY`] entry when present, and from the flag value
/// itself otherwise.
pub fn extract_flag_value<'v>(
    resolved_value: &'v Object,
    property_path: &[&str],
) -> Option<Cow<'v, DynamicValue>> {
    if let Some(root) = resolved_value.get(VALUE_KEY) {
        return navigate(root, property_path).map(Cow::Borrowed);
    }
    match property_path.split_first() {
        None => Some(Cow::Owned(DynamicValue::Object(resolved_value.clone()))),
        Some((first, rest)) => navigate(resolved_value.get(*first)?, rest).map(Cow::Borrowed),
    }
}
