use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coercion::CoercionError;

/// Represents a result type for operations in the Confidence SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur while resolving flags.
///
/// Resolution entry points never return these to the flag-consuming call site. They are folded
/// into a [`ResolutionOutcome`](crate::ResolutionOutcome) carrying the caller-supplied default,
/// with the error available as [`ErrorCode`] and message for debugging.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The requested flag is absent from the resolve response.
    #[error("flag not found")]
    FlagNotFound,

    /// The dot-notation property path does not address a value inside the flag.
    #[error("property path not found in flag value: {0}")]
    PropertyPathNotFound(String),

    /// The resolved value has a shape that doesn't match the requested type.
    #[error(transparent)]
    TypeMismatch(#[from] CoercionError),

    /// Network error.
    #[error(transparent)]
    // reqwest::Error is not clonable, so we're wrapping it in an Arc.
    Network(Arc<reqwest::Error>),

    /// A single resolve attempt exceeded the configured timeout.
    #[error("resolve request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("unexpected response status: {0}")]
    UnexpectedStatus(u16),

    /// The resolve response body could not be deserialized.
    #[error("invalid resolve response: {0}")]
    InvalidResponse(String),

    /// The request was unauthorized, possibly due to an invalid client secret.
    #[error("unauthorized, client_secret is likely invalid")]
    Unauthorized,

    /// The caller cancelled the resolve.
    #[error("resolve cancelled")]
    Cancelled,

    /// The provider has not been initialized or is shut down.
    #[error("provider is not ready")]
    ProviderNotReady,

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Machine-readable classification of a failed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// See [`Error::FlagNotFound`].
    FlagNotFound,
    /// See [`Error::PropertyPathNotFound`].
    PropertyPathNotFound,
    /// See [`Error::TypeMismatch`].
    TypeMismatch,
    /// The response could not be parsed.
    ParseError,
    /// Network, HTTP or authorization failure.
    TransportError,
    /// See [`Error::Cancelled`].
    Cancelled,
    /// See [`Error::ProviderNotReady`].
    ProviderNotReady,
    /// Invalid client configuration.
    General,
}

impl Error {
    /// Classify the error for [`ResolutionOutcome::error_code`](crate::ResolutionOutcome).
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::FlagNotFound => ErrorCode::FlagNotFound,
            Error::PropertyPathNotFound(_) => ErrorCode::PropertyPathNotFound,
            Error::TypeMismatch(_) => ErrorCode::TypeMismatch,
            Error::InvalidResponse(_) => ErrorCode::ParseError,
            Error::Network(_)
            | Error::Timeout
            | Error::UnexpectedStatus(_)
            | Error::Unauthorized => ErrorCode::TransportError,
            Error::Cancelled => ErrorCode::Cancelled,
            Error::ProviderNotReady => ErrorCode::ProviderNotReady,
            Error::InvalidBaseUrl(_) | Error::InvalidConfiguration(_) => ErrorCode::General,
        }
    }

    /// Reason string reported alongside the default value.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Cancelled => crate::reason::CANCELLED,
            Error::ProviderNotReady => crate::reason::PROVIDER_NOT_READY,
            _ => crate::reason::ERROR,
        }
    }

    /// Return `true` if the error is a normal running condition and the default value should be
    /// returned quietly.
    pub(crate) fn is_normal(&self) -> bool {
        matches!(
            self,
            Error::FlagNotFound
                | Error::PropertyPathNotFound(_)
                | Error::Cancelled
                | Error::ProviderNotReady
        )
    }

    /// Return `true` if another attempt of the same request may succeed.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::UnexpectedStatus(status) => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Error::Timeout
        } else if value.is_decode() {
            Error::InvalidResponse(value.without_url().to_string())
        } else if let Some(status) = value.status() {
            Error::UnexpectedStatus(status.as_u16())
        } else {
            Error::Network(Arc::new(value.without_url()))
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::InvalidResponse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorCode};
    use crate::coercion::CoercionError;

    #[test]
    fn cancellation_and_readiness_have_their_own_reasons() {
        assert_eq!(Error::Cancelled.reason(), "CANCELLED");
        assert_eq!(Error::ProviderNotReady.reason(), "PROVIDER_NOT_READY");
        assert_eq!(Error::FlagNotFound.reason(), "ERROR");
        assert_eq!(Error::Timeout.reason(), "ERROR");
    }

    #[test]
    fn transport_errors_share_a_code() {
        assert_eq!(Error::Timeout.code(), ErrorCode::TransportError);
        assert_eq!(Error::Unauthorized.code(), ErrorCode::TransportError);
        assert_eq!(Error::UnexpectedStatus(503).code(), ErrorCode::TransportError);
        assert_eq!(
            Error::InvalidResponse("eof".to_owned()).code(),
            ErrorCode::ParseError
        );
    }

    #[test]
    fn malformed_json_is_invalid_response() {
        let err: Error = serde_json::from_slice::<serde_json::Value>(b"{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::InvalidResponse(_)));
        assert_eq!(err.code(), ErrorCode::ParseError);
    }

    #[test]
    fn only_transient_failures_are_retried() {
        assert!(Error::Timeout.is_retryable());
        assert!(Error::UnexpectedStatus(502).is_retryable());
        assert!(Error::UnexpectedStatus(429).is_retryable());
        assert!(!Error::UnexpectedStatus(400).is_retryable());
        assert!(!Error::Unauthorized.is_retryable());
        assert!(!Error::InvalidResponse("bad".to_owned()).is_retryable());
    }

    #[test]
    fn coercion_errors_are_not_normal() {
        let err: Error = CoercionError::TypeMismatch {
            expected: "bool",
            found: "string",
        }
        .into();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
        assert!(!err.is_normal());
        assert!(Error::FlagNotFound.is_normal());
    }
}
