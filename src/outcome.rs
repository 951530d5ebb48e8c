use serde::Serialize;

use crate::{Error, ErrorCode};

/// Reason strings reported in [`ResolutionOutcome::reason`].
pub mod reason {
    /// The resolver supplied no reason.
    pub const DEFAULT: &str = "DEFAULT";
    /// The value was resolved from a matched variant.
    pub const MATCH: &str = "MATCH";
    /// Any failure; see [`ResolutionOutcome::error_code`](crate::ResolutionOutcome).
    pub const ERROR: &str = "ERROR";
    /// The caller cancelled the resolve.
    pub const CANCELLED: &str = "CANCELLED";
    /// The provider was not ready to serve.
    pub const PROVIDER_NOT_READY: &str = "PROVIDER_NOT_READY";
}

/// The result of resolving a flag to a value of type `T`.
///
/// `value` is always usable: whenever `success` is `false`, it holds the default supplied by the
/// caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionOutcome<T> {
    /// Resolved value, or the caller's default.
    pub value: T,
    /// Why `value` was served, e.g. `MATCH`, `ERROR` or `CANCELLED`.
    pub reason: String,
    /// Variant selected by the resolver, if any.
    pub variant: Option<String>,
    /// `false` if resolution failed and the default is served.
    pub success: bool,
    /// Classification of the failure, if any.
    pub error_code: Option<ErrorCode>,
    /// Human-readable failure description, if any.
    pub error_message: Option<String>,
}

impl<T> ResolutionOutcome<T> {
    /// A value resolved from a matched variant.
    pub fn resolved(value: T, variant: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolutionOutcome {
            value,
            reason: reason.into(),
            variant: Some(variant.into()),
            success: true,
            error_code: None,
            error_message: None,
        }
    }

    /// The resolve succeeded but no variant was assigned, so the default is served.
    pub fn unassigned(default: T, reason: impl Into<String>) -> Self {
        ResolutionOutcome {
            value: default,
            reason: reason.into(),
            variant: None,
            success: true,
            error_code: None,
            error_message: None,
        }
    }

    /// The resolve failed with `error`; the default is served.
    pub fn failed(default: T, error: &Error) -> Self {
        ResolutionOutcome {
            value: default,
            reason: error.reason().to_owned(),
            variant: None,
            success: false,
            error_code: Some(error.code()),
            error_message: Some(error.to_string()),
        }
    }

    /// Map `ResolutionOutcome.value` using the `f` function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ResolutionOutcome<U> {
        ResolutionOutcome {
            value: f(self.value),
            reason: self.reason,
            variant: self.variant,
            success: self.success,
            error_code: self.error_code,
            error_message: self.error_message,
        }
    }

    /// `true` if the caller's default is being served, either because resolution failed or
    /// because no variant was assigned.
    pub fn is_default(&self) -> bool {
        !self.success || self.variant.is_none()
    }

    /// Discard the metadata and return the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::ResolutionOutcome;
    use crate::{Error, ErrorCode};

    #[test]
    fn failed_outcome_serves_default() {
        let outcome = ResolutionOutcome::failed(17_i64, &Error::FlagNotFound);
        assert_eq!(outcome.value, 17);
        assert!(!outcome.success);
        assert_eq!(outcome.reason, "ERROR");
        assert_eq!(outcome.error_code, Some(ErrorCode::FlagNotFound));
        assert_eq!(outcome.error_message.as_deref(), Some("flag not found"));
        assert_eq!(outcome.variant, None);
        assert!(outcome.is_default());
    }

    #[test]
    fn unassigned_outcome_is_successful_default() {
        let outcome = ResolutionOutcome::unassigned(true, "NO_SEGMENT_MATCH");
        assert!(outcome.success);
        assert!(outcome.is_default());
        assert_eq!(outcome.error_code, None);
    }

    #[test]
    fn map_keeps_metadata() {
        let outcome = ResolutionOutcome::resolved(2_i64, "flags/a/variants/on", "MATCH")
            .map(|v| v * 10);
        assert_eq!(outcome.value, 20);
        assert_eq!(outcome.variant.as_deref(), Some("flags/a/variants/on"));
        assert!(outcome.success);
        assert!(!outcome.is_default());
    }

    #[test]
    fn serializes_camel_case() {
        let outcome = ResolutionOutcome::failed(false, &Error::Cancelled);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["errorCode"], "CANCELLED");
        assert_eq!(json["reason"], "CANCELLED");
    }
}
