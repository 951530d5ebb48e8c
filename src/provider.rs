//! Provider-facing API: a lifecycle wrapper around [`Client`] and an in-memory provider for
//! tests.
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use log::{Level, LevelFilter};
use tokio_util::sync::CancellationToken;

use crate::{
    client::evaluate_flag,
    coercion::FromDynamicValue,
    dot_notation,
    provider_state::{ProviderState, ProviderStateStore},
    resolve::ResolvedFlag,
    Client, DynamicValue, Error, EvaluationContext, Object, ResolutionOutcome, Result,
};

/// Typed flag resolution, as consumed by application code.
///
/// Every function returns an outcome carrying a usable value. Failures are reported through
/// [`ResolutionOutcome::error_code`] and never as `Err`.
#[async_trait]
pub trait FlagProvider: Send + Sync {
    /// Resolve a boolean flag value.
    async fn resolve_boolean(
        &self,
        flag_key: &str,
        default: bool,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<bool>;

    /// Resolve a string flag value.
    async fn resolve_string(
        &self,
        flag_key: &str,
        default: String,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<String>;

    /// Resolve an integer flag value. Integral floats are accepted.
    async fn resolve_integer(
        &self,
        flag_key: &str,
        default: i64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<i64>;

    /// Resolve a floating-point flag value.
    async fn resolve_float(
        &self,
        flag_key: &str,
        default: f64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<f64>;

    /// Resolve a structured value. Use [`Client::resolve_object`] to deserialize into a concrete
    /// type.
    async fn resolve_structured(
        &self,
        flag_key: &str,
        default: DynamicValue,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<DynamicValue>;
}

/// A [`FlagProvider`] backed by the remote resolver.
///
/// The provider must be initialized before it serves values; until then (and after shutdown)
/// every resolve returns the default with reason `PROVIDER_NOT_READY`.
///
/// # Examples
/// ```no_run
/// # async fn test() -> confidence::Result<()> {
/// # use confidence::{ClientConfig, ConfidenceProvider, EvaluationContext, FlagProvider};
/// # use tokio_util::sync::CancellationToken;
/// let provider = ConfidenceProvider::new(
///     ClientConfig::from_client_secret("client-secret").to_client()?,
/// )
/// .with_warm_up(["checkout"]);
/// provider
///     .initialize(EvaluationContext::default().with_attribute("app_version", "2.1.0"))
///     .await?;
///
/// let enabled = provider
///     .resolve_boolean(
///         "checkout.enabled",
///         false,
///         &EvaluationContext::new("user-1"),
///         &CancellationToken::new(),
///     )
///     .await
///     .value;
/// # Ok(())
/// # }
/// ```
pub struct ConfidenceProvider {
    client: Client,
    state: ProviderStateStore,
    warm_up_flags: BTreeSet<String>,
}

impl ConfidenceProvider {
    /// Wrap `client`. The provider starts [`ProviderState::Uninitialized`].
    pub fn new(client: Client) -> Self {
        ConfidenceProvider {
            client,
            state: ProviderStateStore::new(),
            warm_up_flags: BTreeSet::new(),
        }
    }

    /// Flags resolved (without apply) during [`initialize`](Self::initialize). Dot-notation keys
    /// are reduced to their base flag name.
    pub fn with_warm_up<I, S>(mut self, flag_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.warm_up_flags.extend(
            flag_keys
                .into_iter()
                .map(|key| dot_notation::parse(key.as_ref()).flag_name.to_owned()),
        );
        self
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProviderState {
        self.state.state()
    }

    /// Provider-wide evaluation context recorded by the last [`initialize`](Self::initialize).
    pub fn context(&self) -> EvaluationContext {
        (*self.state.context()).clone()
    }

    /// Record the provider-wide `context` and warm up the configured flags.
    ///
    /// # Errors
    ///
    /// - [`Error::ProviderNotReady`] if an earlier initialization failed, or the provider was
    /// shut down while the warm-up was in flight.
    /// - Any transport error of the warm-up resolve. The provider then stays in
    /// [`ProviderState::FailedInit`].
    pub async fn initialize(&self, context: EvaluationContext) -> Result<()> {
        if self.state.state() == ProviderState::FailedInit {
            return Err(Error::ProviderNotReady);
        }
        self.state.begin(ProviderState::Initializing, context);

        if !self.warm_up_flags.is_empty() {
            let context = self.state.context();
            let result = self
                .client
                .resolve_flags(
                    self.warm_up_flags.iter().map(String::as_str),
                    &context,
                    false,
                    &CancellationToken::new(),
                )
                .await;

            match result {
                Ok(response) => {
                    for name in &self.warm_up_flags {
                        if response.find(name).is_none() && self.client.log_enabled(Level::Warn) {
                            log::warn!(target: "confidence", flag_name = name.as_str(); "warm-up flag is not known to the resolver");
                        }
                    }
                }
                Err(err) => {
                    // A concurrent shutdown wins over the failed warm-up.
                    if self
                        .state
                        .transition_from(ProviderState::Initializing, ProviderState::FailedInit)
                        && self.client.log_enabled(Level::Error)
                    {
                        log::error!(target: "confidence", "failed to warm up flags: {err}");
                    }
                    return Err(err);
                }
            }
        }

        if !self
            .state
            .transition_from(ProviderState::Initializing, ProviderState::Ready)
        {
            return Err(Error::ProviderNotReady);
        }
        if self.client.log_enabled(Level::Info) {
            log::info!(target: "confidence", "provider is ready");
        }
        Ok(())
    }

    /// Stop serving values. Subsequent resolves return the default.
    pub fn shutdown(&self) {
        let previous = self.state.transition(ProviderState::ShuttingDown);
        if previous == ProviderState::FailedInit {
            self.state.transition(ProviderState::FailedInit);
            return;
        }
        self.state.transition(ProviderState::Shutdown);
        if self.client.log_enabled(Level::Debug) {
            log::debug!(target: "confidence", "provider shut down");
        }
    }

    async fn resolve<T: FromDynamicValue + Send>(
        &self,
        flag_key: &str,
        default: T,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<T> {
        let Some(provider_context) = self.state.ready_context() else {
            let err = Error::ProviderNotReady;
            self.client.log_failure(flag_key, &err);
            return ResolutionOutcome::failed(default, &err);
        };
        let context = provider_context.merge(context);
        self.client
            .resolve_value(flag_key, default, &context, cancel)
            .await
    }
}

#[async_trait]
impl FlagProvider for ConfidenceProvider {
    async fn resolve_boolean(
        &self,
        flag_key: &str,
        default: bool,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<bool> {
        self.resolve(flag_key, default, context, cancel).await
    }

    async fn resolve_string(
        &self,
        flag_key: &str,
        default: String,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<String> {
        self.resolve(flag_key, default, context, cancel).await
    }

    async fn resolve_integer(
        &self,
        flag_key: &str,
        default: i64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<i64> {
        self.resolve(flag_key, default, context, cancel).await
    }

    async fn resolve_float(
        &self,
        flag_key: &str,
        default: f64,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<f64> {
        self.resolve(flag_key, default, context, cancel).await
    }

    async fn resolve_structured(
        &self,
        flag_key: &str,
        default: DynamicValue,
        context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<DynamicValue> {
        self.resolve(flag_key, default, context, cancel).await
    }
}

/// A [`FlagProvider`] serving fixed flags from memory. Ignores the evaluation context.
///
/// ```
/// # use confidence::{InMemoryProvider, DynamicValue};
/// let provider = InMemoryProvider::new().with_value(
///     "checkout",
///     "treatment",
///     [("enabled".to_owned(), DynamicValue::Bool(true))].into_iter().collect(),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    flags: HashMap<String, ResolvedFlag>,
}

impl InMemoryProvider {
    /// Create a provider serving no flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `flag`, replacing any flag with the same name.
    pub fn with_flag(mut self, flag: ResolvedFlag) -> Self {
        self.flags.insert(flag.name().to_owned(), flag);
        self
    }

    /// Serve a matched `variant` with `value`.
    pub fn with_value(self, flag_name: &str, variant: &str, value: Object) -> Self {
        self.with_flag(ResolvedFlag {
            flag: format!("{}{flag_name}", crate::resolve::FLAG_NAME_PREFIX),
            variant: format!("{}{flag_name}/variants/{variant}", crate::resolve::FLAG_NAME_PREFIX),
            reason: crate::resolve::ResolveReason::Match,
            value,
            ..ResolvedFlag::default()
        })
    }

    fn resolve<T: FromDynamicValue>(
        &self,
        flag_key: &str,
        default: T,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<T> {
        if cancel.is_cancelled() {
            return ResolutionOutcome::failed(default, &Error::Cancelled);
        }
        let flag_name = dot_notation::parse(flag_key).flag_name;
        let resolution = self
            .flags
            .get(flag_name)
            .ok_or(Error::FlagNotFound)
            .and_then(|flag| evaluate_flag(flag_key, flag, LevelFilter::Off));
        match resolution {
            Ok(resolution) => resolution.into_outcome(default),
            Err(err) => {
                log::debug!(target: "confidence", flag_key; "in-memory resolve failed: {err}");
                ResolutionOutcome::failed(default, &err)
            }
        }
    }
}

#[async_trait]
impl FlagProvider for InMemoryProvider {
    async fn resolve_boolean(
        &self,
        flag_key: &str,
        default: bool,
        _context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<bool> {
        self.resolve(flag_key, default, cancel)
    }

    async fn resolve_string(
        &self,
        flag_key: &str,
        default: String,
        _context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<String> {
        self.resolve(flag_key, default, cancel)
    }

    async fn resolve_integer(
        &self,
        flag_key: &str,
        default: i64,
        _context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<i64> {
        self.resolve(flag_key, default, cancel)
    }

    async fn resolve_float(
        &self,
        flag_key: &str,
        default: f64,
        _context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<f64> {
        self.resolve(flag_key, default, cancel)
    }

    async fn resolve_structured(
        &self,
        flag_key: &str,
        default: DynamicValue,
        _context: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome<DynamicValue> {
        self.resolve(flag_key, default, cancel)
    }
}
