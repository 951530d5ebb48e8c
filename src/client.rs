use std::sync::Arc;

use chrono::Utc;
use log::{Level, LevelFilter};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
    assignment::{build_assignment_event, ClientIdentity},
    coercion::{try_coerce, FromDynamicValue, Structured},
    dot_notation,
    resolve::{ResolveReason, ResolveRequest, ResolveResponse, ResolvedFlag, Sdk},
    transport::ResolveTransport,
    ClientConfig, Error, EvaluationContext, ResolutionOutcome, Result,
};

/// A client for the Confidence resolver.
///
/// In order to create a client instance, first create [`ClientConfig`]. Most applications wrap
/// the client in a [`ConfidenceProvider`](crate::ConfidenceProvider), which adds the lifecycle
/// and a provider-wide context.
///
/// The client is `Send + Sync` and is meant to be shared (e.g., behind an `Arc`) by all call
/// sites. Resolves never fail: every error is folded into a [`ResolutionOutcome`] carrying the
/// default value.
///
/// # Examples
/// ```no_run
/// # async fn test() {
/// # use confidence::{ClientConfig, EvaluationContext};
/// # use tokio_util::sync::CancellationToken;
/// let client = ClientConfig::from_client_secret("client-secret")
///     .to_client()
///     .unwrap();
/// let outcome = client
///     .resolve_value(
///         "checkout.button.enabled",
///         false,
///         &EvaluationContext::new("user-1"),
///         &CancellationToken::new(),
///     )
///     .await;
/// println!("{}", outcome.value);
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn ResolveTransport>,
    identity: ClientIdentity,
}

/// Result of evaluating a resolved flag before the default value comes into play.
pub(crate) enum Resolution<T> {
    Assigned {
        value: T,
        variant: String,
        reason: ResolveReason,
    },
    Unassigned {
        reason: ResolveReason,
    },
}

impl<T> Resolution<T> {
    pub(crate) fn into_outcome(self, default: T) -> ResolutionOutcome<T> {
        match self {
            Resolution::Assigned {
                value,
                variant,
                reason,
            } => ResolutionOutcome::resolved(value, variant, reason.as_str()),
            Resolution::Unassigned { reason } => {
                ResolutionOutcome::unassigned(default, reason.as_str())
            }
        }
    }
}

/// Apply the dot-notation path of `flag_key` to `flag` and coerce the addressed value.
pub(crate) fn evaluate_flag<T: FromDynamicValue>(
    flag_key: &str,
    flag: &ResolvedFlag,
    log_level: LevelFilter,
) -> Result<Resolution<T>> {
    if flag.variant.is_empty() {
        if Level::Debug <= log_level {
            log::debug!(target: "confidence",
                        flag_key,
                        reason = flag.reason.as_str();
                        "no variant assigned, serving default");
        }
        return Ok(Resolution::Unassigned {
            reason: flag.reason,
        });
    }

    let property_path = dot_notation::parse(flag_key).property_path();
    let raw = dot_notation::extract_flag_value(&flag.value, &property_path)
        .ok_or_else(|| Error::PropertyPathNotFound(flag_key.to_owned()))?;
    let value = try_coerce::<T>(&raw)?;

    if Level::Debug <= log_level {
        log::debug!(target: "confidence",
                    flag_key,
                    variant = flag.variant.as_str(),
                    value:serde = &*raw;
                    "resolved flag");
    }

    Ok(Resolution::Assigned {
        value,
        variant: flag.variant.clone(),
        reason: flag.reason,
    })
}

impl Client {
    /// Create a new `Client` using the specified configuration.
    ///
    /// ```
    /// # use confidence::{ClientConfig, Client};
    /// let client = Client::new(ClientConfig::from_client_secret("client-secret")).unwrap();
    /// ```
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = config.build_transport()?;
        let sdk = Sdk::default();
        let identity = ClientIdentity {
            client_name: config.client_name.clone(),
            client_credential_name: config.client_credential_name.clone(),
            sdk_id: sdk.id,
            sdk_version: sdk.version,
        };
        Ok(Client {
            config,
            transport,
            identity,
        })
    }

    /// Identity reported in assignment telemetry.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Resolve a flag and convert the addressed value to `T`.
    ///
    /// `flag_key` may use dot-notation (`flag.property.nested`) to address a field inside the
    /// flag value. Only the base flag name is sent to the resolver.
    ///
    /// The returned outcome always carries a usable value: `default` whenever the flag is
    /// missing, the path doesn't resolve, the value doesn't fit `T`, the transport fails, or
    /// `cancel` is triggered.
    pub async fn resolve_value<T: FromDynamicValue + Send>(
        &self,
        flag_key: &str,
        default: T,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<T> {
        match self.try_resolve_value::<T>(flag_key, context, cancel).await {
            Ok(resolution) => resolution.into_outcome(default),
            Err(err) => {
                self.log_failure(flag_key, &err);
                ResolutionOutcome::failed(default, &err)
            }
        }
    }

    /// Resolve a flag into any deserializable type.
    ///
    /// ```no_run
    /// # async fn test(client: &confidence::Client) {
    /// # use confidence::EvaluationContext;
    /// # use tokio_util::sync::CancellationToken;
    /// #[derive(serde::Deserialize)]
    /// struct Limits {
    ///     max_items: u32,
    /// }
    ///
    /// let limits = client
    ///     .resolve_object(
    ///         "limits",
    ///         Limits { max_items: 10 },
    ///         &EvaluationContext::new("user-1"),
    ///         &CancellationToken::new(),
    ///     )
    ///     .await
    ///     .into_value();
    /// # }
    /// ```
    pub async fn resolve_object<T: DeserializeOwned + Send>(
        &self,
        flag_key: &str,
        default: T,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<T> {
        self.resolve_value(flag_key, Structured(default), context, cancel)
            .await
            .map(|Structured(value)| value)
    }

    /// Resolve several flags in a single request.
    ///
    /// Unlike the `resolve_*` functions, this returns errors to the caller.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` was triggered before the response arrived.
    /// - [`Error::Unauthorized`] if the client secret is rejected.
    /// - [`Error::Timeout`], [`Error::Network`] or [`Error::UnexpectedStatus`] when the last
    /// attempt failed.
    /// - [`Error::InvalidResponse`] if the response cannot be parsed.
    pub async fn resolve_flags<'a>(
        &self,
        flag_names: impl IntoIterator<Item = &'a str>,
        context: &EvaluationContext,
        apply: bool,
        cancel: &CancellationToken,
    ) -> Result<ResolveResponse> {
        let request = ResolveRequest::new(
            self.config.client_secret.as_str(),
            flag_names,
            context,
            apply,
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            response = self.transport.resolve(&request) => response,
        }
    }

    async fn try_resolve_value<T: FromDynamicValue>(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution<T>> {
        let flag_name = dot_notation::parse(flag_key).flag_name;
        let response = self
            .resolve_flags([flag_name], context, self.config.apply, cancel)
            .await?;
        let flag = response.find(flag_name).ok_or(Error::FlagNotFound)?;

        if self.config.apply {
            self.log_assignment(&response, flag);
        }

        evaluate_flag(flag_key, flag, self.config.log_level)
    }

    fn log_assignment(&self, response: &ResolveResponse, flag: &ResolvedFlag) {
        let event =
            build_assignment_event(&response.resolve_id, &[(flag, Utc::now())], &self.identity);
        if self.log_enabled(Level::Trace) {
            log::trace!(target: "confidence",
                        event:serde = &event;
                        "logging assignment");
        }
        self.config.assignment_logger.log_assignment(event);
    }

    /// Whether the configured `log_level` lets `level` through.
    pub(crate) fn log_enabled(&self, level: Level) -> bool {
        level <= self.config.log_level
    }

    pub(crate) fn log_failure(&self, flag_key: &str, err: &Error) {
        let level = if err.is_normal() {
            Level::Info
        } else {
            Level::Warn
        };
        if self.log_enabled(level) {
            log::log!(target: "confidence", level,
                      flag_key,
                      error_code:serde = err.code();
                      "error occurred while resolving a flag, serving default: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use async_trait::async_trait;
    use log::{Level, LevelFilter};
    use serde::Deserialize;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::{
        assignment::{Assignment, DefaultReason},
        resolve::{ResolveRequest, ResolveResponse},
        transport::ResolveTransport,
        AssignmentEvent, ClientConfig, DynamicValue, Error, ErrorCode, EvaluationContext, Result,
    };

    /// Serves a fixed response (or error) and records requests.
    struct FakeTransport {
        response: Result<ResolveResponse>,
        requests: Arc<Mutex<Vec<ResolveRequest>>>,
    }

    impl FakeTransport {
        fn ok(response: serde_json::Value) -> Self {
            FakeTransport {
                response: Ok(serde_json::from_value(response).unwrap()),
                requests: Arc::default(),
            }
        }

        fn err(err: Error) -> Self {
            FakeTransport {
                response: Err(err),
                requests: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl ResolveTransport for FakeTransport {
        async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.response.clone()
        }
    }

    /// Never answers.
    struct HangingTransport;

    #[async_trait]
    impl ResolveTransport for HangingTransport {
        async fn resolve(&self, _request: &ResolveRequest) -> Result<ResolveResponse> {
            std::future::pending().await
        }
    }

    fn response() -> serde_json::Value {
        json!({
            "resolvedFlags": [
                {
                    "flag": "flags/checkout",
                    "variant": "flags/checkout/variants/treatment",
                    "reason": "RESOLVE_REASON_MATCH",
                    "value": {
                        "enabled": true,
                        "title": "Pay",
                        "limit": 5,
                        "ratio": 0.5,
                        "fraction": 2.5,
                        "style": {"color": "red", "size": 3}
                    },
                    "segment": "segments/all"
                },
                {
                    "flag": "flags/wrapped",
                    "variant": "flags/wrapped/variants/a",
                    "value": {"value": {"enabled": true}}
                },
                {
                    "flag": "flags/off",
                    "variant": "",
                    "reason": "RESOLVE_REASON_NO_SEGMENT_MATCH",
                    "value": {}
                }
            ],
            "resolveToken": "token",
            "resolveId": "resolve-1"
        })
    }

    fn client(transport: impl ResolveTransport + 'static) -> crate::Client {
        ClientConfig::from_client_secret("secret")
            .transport(transport)
            .to_client()
            .unwrap()
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::new("user-1")
    }

    #[tokio::test]
    async fn resolves_typed_values_through_dot_notation() {
        let client = client(FakeTransport::ok(response()));
        let cancel = CancellationToken::new();

        let outcome = client
            .resolve_value("checkout.enabled", false, &ctx(), &cancel)
            .await;
        assert!(outcome.value);
        assert!(outcome.success);
        assert_eq!(outcome.reason, "MATCH");
        assert_eq!(
            outcome.variant.as_deref(),
            Some("flags/checkout/variants/treatment")
        );

        let title = client
            .resolve_value("checkout.title", String::new(), &ctx(), &cancel)
            .await;
        assert_eq!(title.value, "Pay");

        let limit = client
            .resolve_value("checkout.limit", 0_i64, &ctx(), &cancel)
            .await;
        assert_eq!(limit.value, 5);

        let ratio = client
            .resolve_value("checkout.ratio", 0.0_f64, &ctx(), &cancel)
            .await;
        assert_eq!(ratio.value, 0.5);

        let style = client
            .resolve_value("checkout.style", DynamicValue::Null, &ctx(), &cancel)
            .await;
        assert_eq!(
            style.value,
            DynamicValue::from(json!({"color": "red", "size": 3}))
        );
    }

    #[tokio::test]
    async fn missing_reason_defaults_to_default_string() {
        let client = client(FakeTransport::ok(response()));
        let outcome = client
            .resolve_value("wrapped.enabled", false, &ctx(), &CancellationToken::new())
            .await;
        assert!(outcome.value);
        assert_eq!(outcome.reason, "DEFAULT");
    }

    #[tokio::test]
    async fn structured_values_deserialize() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Style {
            color: String,
            size: u8,
        }

        let client = client(FakeTransport::ok(response()));
        let outcome = client
            .resolve_object(
                "checkout.style",
                Style {
                    color: "black".to_owned(),
                    size: 1,
                },
                &ctx(),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(
            outcome.value,
            Style {
                color: "red".to_owned(),
                size: 3
            }
        );
    }

    #[tokio::test]
    async fn only_base_name_is_requested() {
        let transport = FakeTransport::ok(response());
        let requests = transport.requests.clone();
        let client = client(transport);

        client
            .resolve_value("checkout.style.color", String::new(), &ctx(), &CancellationToken::new())
            .await;

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].flags.iter().collect::<Vec<_>>(),
            ["flags/checkout"]
        );
        assert!(requests[0].apply);
        assert_eq!(
            requests[0].evaluation_context["targeting_key"],
            DynamicValue::String("user-1".to_owned())
        );
    }

    #[tokio::test]
    async fn missing_flag_serves_default() {
        let client = client(FakeTransport::ok(response()));
        let outcome = client
            .resolve_value("unknown.enabled", true, &ctx(), &CancellationToken::new())
            .await;
        assert!(outcome.value);
        assert!(!outcome.success);
        assert_eq!(outcome.reason, "ERROR");
        assert_eq!(outcome.error_code, Some(ErrorCode::FlagNotFound));
        assert_eq!(outcome.error_message.as_deref(), Some("flag not found"));
    }

    #[tokio::test]
    async fn unresolvable_path_serves_default() {
        let client = client(FakeTransport::ok(response()));
        let outcome = client
            .resolve_value("checkout.enabled.deeper", false, &ctx(), &CancellationToken::new())
            .await;
        assert!(!outcome.value);
        assert!(!outcome.success);
        assert_eq!(outcome.error_code, Some(ErrorCode::PropertyPathNotFound));
    }

    #[tokio::test]
    async fn type_mismatch_serves_default() {
        let client = client(FakeTransport::ok(response()));
        let cancel = CancellationToken::new();

        let outcome = client
            .resolve_value("checkout.title", false, &ctx(), &cancel)
            .await;
        assert!(!outcome.value);
        assert_eq!(outcome.error_code, Some(ErrorCode::TypeMismatch));

        let outcome = client
            .resolve_value("checkout.fraction", 7_i64, &ctx(), &cancel)
            .await;
        assert_eq!(outcome.value, 7);
        assert!(!outcome.success);
        assert_eq!(outcome.error_code, Some(ErrorCode::TypeMismatch));
    }

    #[tokio::test]
    async fn unassigned_flag_serves_default_with_reason() {
        let client = client(FakeTransport::ok(response()));
        let outcome = client
            .resolve_value("off.enabled", true, &ctx(), &CancellationToken::new())
            .await;
        assert!(outcome.value);
        assert!(outcome.success);
        assert_eq!(outcome.reason, "NO_SEGMENT_MATCH");
        assert_eq!(outcome.variant, None);
    }

    #[tokio::test]
    async fn transport_failure_serves_default_for_every_type() {
        let client = client(FakeTransport::err(Error::Timeout));
        let cancel = CancellationToken::new();

        let b = client.resolve_value("checkout.enabled", true, &ctx(), &cancel).await;
        let s = client
            .resolve_value("checkout.title", "d".to_owned(), &ctx(), &cancel)
            .await;
        let i = client.resolve_value("checkout.limit", 3_i64, &ctx(), &cancel).await;
        let f = client.resolve_value("checkout.ratio", 1.5_f64, &ctx(), &cancel).await;
        let o = client
            .resolve_value("checkout.style", DynamicValue::Int(1), &ctx(), &cancel)
            .await;

        assert!(b.value);
        assert_eq!(s.value, "d");
        assert_eq!(i.value, 3);
        assert_eq!(f.value, 1.5);
        assert_eq!(o.value, DynamicValue::Int(1));
        for (success, reason) in [
            (b.success, b.reason),
            (s.success, s.reason),
            (i.success, i.reason),
            (f.success, f.reason),
            (o.success, o.reason),
        ] {
            assert!(!success);
            assert_eq!(reason, "ERROR");
        }
    }

    #[tokio::test]
    async fn cancellation_serves_default_with_cancelled_reason() {
        let client = client(HangingTransport);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = client
            .resolve_value("checkout.enabled", true, &ctx(), &cancel)
            .await;
        assert!(outcome.value);
        assert!(!outcome.success);
        assert_eq!(outcome.reason, "CANCELLED");
        assert_eq!(outcome.error_code, Some(ErrorCode::Cancelled));
    }

    #[tokio::test]
    async fn cancelling_one_call_leaves_others_alone() {
        let client = client(FakeTransport::ok(response()));
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let live = CancellationToken::new();

        let (first_ctx, second_ctx) = (ctx(), ctx());

        let (a, b) = tokio::join!(
            client.resolve_value("checkout.enabled", false, &first_ctx, &cancelled),
            client.resolve_value("checkout.enabled", false, &second_ctx, &live),
        );
        assert_eq!(a.reason, "CANCELLED");
        assert!(b.value);
        assert!(b.success);
    }

    #[test]
    fn log_level_gates_emitted_levels() {
        let quiet = ClientConfig::from_client_secret("secret")
            .log_level(LevelFilter::Warn)
            .transport(FakeTransport::err(Error::Timeout))
            .to_client()
            .unwrap();
        assert!(quiet.log_enabled(Level::Error));
        assert!(quiet.log_enabled(Level::Warn));
        assert!(!quiet.log_enabled(Level::Info));

        let default = client(FakeTransport::err(Error::Timeout));
        assert!(default.log_enabled(Level::Info));
        assert!(!default.log_enabled(Level::Debug));
    }

    #[tokio::test]
    async fn identical_resolves_are_idempotent() {
        let client = client(FakeTransport::ok(response()));
        let cancel = CancellationToken::new();
        let first = client
            .resolve_value("checkout.style", DynamicValue::Null, &ctx(), &cancel)
            .await;
        let second = client
            .resolve_value("checkout.style", DynamicValue::Null, &ctx(), &cancel)
            .await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn applied_resolves_emit_assignments() {
        let events: Arc<Mutex<Vec<AssignmentEvent>>> = Arc::default();
        let client = {
            let events = events.clone();
            ClientConfig::from_client_secret("secret")
                .client_identity("clients/web", "clients/web/credentials/a")
                .assignment_logger(move |event| events.lock().unwrap().push(event))
                .transport(FakeTransport::ok(response()))
                .to_client()
                .unwrap()
        };
        let cancel = CancellationToken::new();

        client.resolve_value("checkout.enabled", false, &ctx(), &cancel).await;
        client.resolve_value("off.enabled", false, &ctx(), &cancel).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].client.client_name, "clients/web");
        assert_eq!(events[0].flags[0].resolve_id, "resolve-1");
        assert_eq!(
            events[0].flags[0].assignment,
            Assignment::Matched {
                segment: "segments/all".to_owned(),
                variant: "flags/checkout/variants/treatment".to_owned(),
            }
        );
        assert_eq!(
            events[1].flags[0].assignment,
            Assignment::Default {
                default_reason: DefaultReason::NoSegmentMatch
            }
        );
    }

    #[tokio::test]
    async fn non_applying_client_emits_nothing() {
        let count = Arc::new(AtomicUsize::new(0));
        let transport = FakeTransport::ok(response());
        let requests = transport.requests.clone();
        let client = {
            let count = count.clone();
            ClientConfig::from_client_secret("secret")
                .apply(false)
                .assignment_logger(move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .transport(transport)
                .to_client()
                .unwrap()
        };

        client
            .resolve_value("checkout.enabled", false, &ctx(), &CancellationToken::new())
            .await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!requests.lock().unwrap()[0].apply);
    }
}
