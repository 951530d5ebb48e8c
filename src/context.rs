use serde::Serialize;

use crate::{DynamicValue, Object};

/// Attribute key under which the targeting key travels to the resolver.
pub const TARGETING_KEY: &str = "targeting_key";

/// The evaluation context of a resolve: who the flag is resolved for.
///
/// A context is built once per call site with the consuming builder methods and is not mutated
/// afterwards.
///
/// # Examples
/// ```
/// # use confidence::EvaluationContext;
/// let context = EvaluationContext::default()
///     .with_targeting_key("user-123")
///     .with_attribute("country", "SE")
///     .with_attribute("premium", true);
/// assert_eq!(context.targeting_key(), Some("user-123"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    targeting_key: Option<String>,
    attributes: Object,
}

impl EvaluationContext {
    /// Create a context for the given targeting key.
    pub fn new(targeting_key: impl Into<String>) -> Self {
        EvaluationContext::default().with_targeting_key(targeting_key)
    }

    /// Set the targeting key.
    pub fn with_targeting_key(mut self, targeting_key: impl Into<String>) -> Self {
        self.targeting_key = Some(targeting_key.into());
        self
    }

    /// Set an attribute, replacing any previous value with the same key.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<DynamicValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Key the resolver buckets on, if set.
    pub fn targeting_key(&self) -> Option<&str> {
        self.targeting_key.as_deref()
    }

    /// All attributes, without the targeting key.
    pub fn attributes(&self) -> &Object {
        &self.attributes
    }

    /// Attribute `key`, if set.
    pub fn attribute(&self, key: &str) -> Option<&DynamicValue> {
        self.attributes.get(key)
    }

    /// Returns `true` if neither a targeting key nor attributes are set.
    pub fn is_empty(&self) -> bool {
        self.targeting_key.is_none() && self.attributes.is_empty()
    }

    /// Merge `overrides` on top of `self`, key by key. The override's targeting key wins when
    /// present.
    pub fn merge(&self, overrides: &EvaluationContext) -> EvaluationContext {
        let mut attributes = self.attributes.clone();
        attributes.extend(
            overrides
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        EvaluationContext {
            targeting_key: overrides
                .targeting_key
                .clone()
                .or_else(|| self.targeting_key.clone()),
            attributes,
        }
    }

    /// Attributes as sent to the resolver, with the targeting key injected under
    /// [`TARGETING_KEY`].
    pub fn to_wire(&self) -> Object {
        let mut attributes = self.attributes.clone();
        if let Some(targeting_key) = &self.targeting_key {
            attributes.insert(
                TARGETING_KEY.to_owned(),
                DynamicValue::String(targeting_key.clone()),
            );
        }
        attributes
    }
}

impl Serialize for EvaluationContext {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}
