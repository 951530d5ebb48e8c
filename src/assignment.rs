//! Assignment telemetry: which flag values were applied to which targeting keys.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resolve::{ResolveReason, ResolvedFlag, SdkId};

/// Identity of the client that applied the flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    /// Resource name of the client, e.g. `clients/web`.
    pub client_name: String,
    /// Resource name of the credential the client secret belongs to.
    pub client_credential_name: String,
    /// SDK that produced the assignment.
    pub sdk_id: SdkId,
    /// Version of that SDK.
    pub sdk_version: String,
}

/// Why the default value was served, as far as telemetry distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefaultReason {
    /// Any reason without its own telemetry value.
    Unspecified,
    /// The targeting key matched no segment of the flag.
    NoSegmentMatch,
    /// The flag is archived.
    FlagArchived,
}

impl From<ResolveReason> for DefaultReason {
    fn from(reason: ResolveReason) -> Self {
        match reason {
            ResolveReason::NoSegmentMatch => DefaultReason::NoSegmentMatch,
            ResolveReason::FlagArchived => DefaultReason::FlagArchived,
            _ => DefaultReason::Unspecified,
        }
    }
}

/// Outcome part of a [`FlagAssignment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Assignment {
    /// A variant was assigned.
    #[serde(rename = "assignmentInfo")]
    Matched {
        /// Segment the targeting key fell into.
        segment: String,
        /// Assigned variant.
        variant: String,
    },
    /// No variant was assigned and the default was served.
    #[serde(rename = "defaultAssignment")]
    Default {
        /// Why no variant was assigned.
        #[serde(rename = "reason")]
        default_reason: DefaultReason,
    },
}

/// A single applied flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagAssignment {
    /// Identifier of the resolve the flag came from.
    pub resolve_id: String,
    /// Resolver-side identifier of the assignment.
    pub assignment_id: String,
    /// Resource name of the flag.
    pub flag: String,
    /// When the flag was applied.
    pub apply_time_skew_adjusted: DateTime<Utc>,
    /// Targeting key the flag was resolved for.
    pub targeting_key: String,
    /// Context field the targeting key was read from.
    pub targeting_key_selector: String,
    /// Rule that produced the assignment.
    pub rule: String,
    /// Matched variant or default reason.
    #[serde(flatten)]
    pub assignment: Assignment,
    /// Rules passed over before the assigning one, copied verbatim.
    pub fallthrough_assignments: Vec<String>,
}

/// A batch of assignments applied by one client for one resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEvent {
    /// Client that applied the flags.
    pub client: ClientIdentity,
    /// Applied flags, in input order.
    pub flags: Vec<FlagAssignment>,
}

/// Translate applied flags into an [`AssignmentEvent`]. Input order is preserved.
pub fn build_assignment_event(
    resolve_id: &str,
    flags_to_apply: &[(&ResolvedFlag, DateTime<Utc>)],
    client: &ClientIdentity,
) -> AssignmentEvent {
    let flags = flags_to_apply
        .iter()
        .map(|(flag, applied_at)| FlagAssignment {
            resolve_id: resolve_id.to_owned(),
            assignment_id: flag.assignment_id.clone(),
            flag: flag.flag.clone(),
            apply_time_skew_adjusted: *applied_at,
            targeting_key: flag.targeting_key.clone(),
            targeting_key_selector: flag.targeting_key_selector.clone(),
            rule: flag.rule.clone(),
            assignment: if flag.variant.is_empty() {
                Assignment::Default {
                    default_reason: flag.reason.into(),
                }
            } else {
                Assignment::Matched {
                    segment: flag.segment.clone(),
                    variant: flag.variant.clone(),
                }
            },
            fallthrough_assignments: flag.fallthrough_assignments.clone(),
        })
        .collect();

    AssignmentEvent {
        client: client.clone(),
        flags,
    }
}
