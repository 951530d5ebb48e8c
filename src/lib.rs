//! The Rust SDK for Confidence feature flags.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] that resolves feature flags for an
//! [`EvaluationContext`]: a targeting key plus arbitrary attributes. Resolution produces a
//! [`ResolutionOutcome`] carrying the typed value, the variant, and a reason.
//!
//! Flags are addressed with dot-notation: `checkout.button.color` resolves the flag `checkout`
//! and navigates to `button.color` inside its value.
//!
//! Most applications use [`ConfidenceProvider`], which wraps a client with a lifecycle and a
//! provider-wide context, through the [`FlagProvider`] trait. [`InMemoryProvider`] serves fixed
//! values for tests.
//!
//! An [`AssignmentLogger`] can be provided to forward assignment events to your telemetry
//! pipeline, facilitating tracking of which user received which variant.
//!
//! # Error Handling
//!
//! Resolution never fails at the call site. Whenever something goes wrong (missing flag, type
//! mismatch, network error, cancellation) the caller-supplied default is returned and the
//! outcome records an [`ErrorCode`] and message. Errors are represented by the [`Error`] enum.
//!
//! # Cancellation
//!
//! Every resolve takes a [`CancellationToken`](tokio_util::sync::CancellationToken). Triggering
//! it abandons the in-flight request and serves the default with reason `CANCELLED`.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages under the `confidence` target. Consider integrating a `log`-compatible logger
//! implementation for better visibility into SDK operations.
//!
//! # Examples
//!
//! A runnable example lives in the `demos/` directory of the crate repository.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

pub mod assignment;
mod assignment_logger;
mod client;
pub mod coercion;
mod config;
mod context;
pub mod dot_notation;
mod error;
mod outcome;
mod provider;
mod provider_state;
pub mod resolve;
pub mod transport;
mod value;

pub use assignment::AssignmentEvent;
pub use assignment_logger::{AssignmentLogger, AssignmentQueue};
pub use client::Client;
pub use config::{ClientConfig, Region};
pub use context::{EvaluationContext, TARGETING_KEY};
pub use error::{Error, ErrorCode, Result};
pub use outcome::{reason, ResolutionOutcome};
pub use provider::{ConfidenceProvider, FlagProvider, InMemoryProvider};
pub use provider_state::ProviderState;
pub use value::{DynamicValue, Object};
