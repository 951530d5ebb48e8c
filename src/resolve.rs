//! Wire types of the resolve API.
use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{EvaluationContext, Object};

/// Resolver-side prefix of flag resource names.
pub const FLAG_NAME_PREFIX: &str = "flags/";

/// Identifies the SDK on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SdkId {
    /// Unknown SDK.
    #[serde(rename = "SDK_ID_UNSPECIFIED")]
    Unspecified,
    /// This crate used through a provider.
    #[default]
    #[serde(rename = "SDK_ID_RUST_PROVIDER")]
    RustProvider,
    /// This crate used through the bare client.
    #[serde(rename = "SDK_ID_RUST_CONFIDENCE")]
    RustConfidence,
}

/// SDK reported with every resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sdk {
    /// SDK identifier.
    pub id: SdkId,
    /// SDK version, the crate version by default.
    pub version: String,
}

impl Default for Sdk {
    fn default() -> Self {
        Sdk {
            id: SdkId::default(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// Body of `POST /v1/flags:resolve`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveRequest {
    /// Secret identifying the client.
    pub client_secret: String,
    /// Whether the resolve counts as an assignment.
    pub apply: bool,
    /// Context attributes, with the targeting key injected.
    pub evaluation_context: Object,
    /// Resource names of the requested flags, deduplicated and ordered.
    pub flags: BTreeSet<String>,
    /// SDK making the request.
    pub sdk: Sdk,
}

impl ResolveRequest {
    /// Build a request for the given base flag names.
    pub fn new<'a>(
        client_secret: impl Into<String>,
        flag_names: impl IntoIterator<Item = &'a str>,
        context: &EvaluationContext,
        apply: bool,
    ) -> Self {
        ResolveRequest {
            client_secret: client_secret.into(),
            apply,
            evaluation_context: context.to_wire(),
            flags: flag_names
                .into_iter()
                .map(|name| format!("{FLAG_NAME_PREFIX}{name}"))
                .collect(),
            sdk: Sdk::default(),
        }
    }
}

/// Why the resolver selected (or didn't select) a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolveReason {
    /// No reason given.
    #[default]
    #[serde(rename = "RESOLVE_REASON_UNSPECIFIED")]
    Unspecified,
    /// A variant was assigned.
    #[serde(rename = "RESOLVE_REASON_MATCH")]
    Match,
    /// The targeting key matched no segment.
    #[serde(rename = "RESOLVE_REASON_NO_SEGMENT_MATCH")]
    NoSegmentMatch,
    /// A segment matched but it assigned no variant.
    #[serde(rename = "RESOLVE_REASON_NO_TREATMENT_MATCH")]
    NoTreatmentMatch,
    /// The flag is archived.
    #[serde(rename = "RESOLVE_REASON_FLAG_ARCHIVED")]
    FlagArchived,
    /// The targeting key was missing or invalid.
    #[serde(rename = "RESOLVE_REASON_TARGETING_KEY_ERROR")]
    TargetingKeyError,
    /// The resolver failed to resolve the flag.
    #[serde(rename = "RESOLVE_REASON_ERROR")]
    Error,
    /// A reason this SDK version doesn't know about.
    #[serde(other)]
    Unrecognized,
}

impl ResolveReason {
    /// Reason string reported to callers.
    pub fn as_str(self) -> &'static str {
        match self {
            ResolveReason::Unspecified => crate::reason::DEFAULT,
            ResolveReason::Match => crate::reason::MATCH,
            ResolveReason::NoSegmentMatch => "NO_SEGMENT_MATCH",
            ResolveReason::NoTreatmentMatch => "NO_TREATMENT_MATCH",
            ResolveReason::FlagArchived => "FLAG_ARCHIVED",
            ResolveReason::TargetingKeyError => "TARGETING_KEY_ERROR",
            ResolveReason::Error => crate::reason::ERROR,
            ResolveReason::Unrecognized => "UNKNOWN",
        }
    }
}

/// One resolved flag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFlag {
    /// Resource name of the flag, `flags/<name>`.
    pub flag: String,
    /// Empty when no variant was assigned.
    #[serde(default, deserialize_with = "null_as_default")]
    pub variant: String,
    /// Why the variant was (or wasn't) assigned.
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: ResolveReason,
    /// Value of the assigned variant.
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: Object,
    /// Schema of `value`, kept opaque.
    #[serde(default)]
    pub flag_schema: serde_json::Value,

    // Assignment metadata, only used for telemetry.
    /// Resolver-side identifier of the assignment.
    #[serde(default, deserialize_with = "null_as_default")]
    pub assignment_id: String,
    /// Segment the targeting key fell into.
    #[serde(default, deserialize_with = "null_as_default")]
    pub segment: String,
    /// Rule that produced the assignment.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rule: String,
    /// Targeting key the flag was resolved for.
    #[serde(default, deserialize_with = "null_as_default")]
    pub targeting_key: String,
    /// Context field the targeting key was read from.
    #[serde(default, deserialize_with = "null_as_default")]
    pub targeting_key_selector: String,
    /// Rules passed over before the assigning one.
    #[serde(default, deserialize_with = "null_as_default")]
    pub fallthrough_assignments: Vec<String>,
}

impl ResolvedFlag {
    /// Flag name without the resource prefix.
    pub fn name(&self) -> &str {
        self.flag
            .strip_prefix(FLAG_NAME_PREFIX)
            .unwrap_or(&self.flag)
    }
}

/// Body returned by `POST /v1/flags:resolve`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    /// Resolved flags, in resolver order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub resolved_flags: Vec<ResolvedFlag>,
    /// Opaque token for applying the flags later.
    #[serde(default, deserialize_with = "null_as_default")]
    pub resolve_token: String,
    /// Identifier of this resolve, carried into assignment telemetry.
    #[serde(default, deserialize_with = "null_as_default")]
    pub resolve_id: String,
}

impl ResolveResponse {
    /// Find the resolved flag with base name `flag_name`.
    pub fn find(&self, flag_name: &str) -> Option<&ResolvedFlag> {
        self.resolved_flags
            .iter()
            .find(|flag| flag.name() == flag_name)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
