use std::{sync::Arc, time::Duration};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::{
    assignment_logger::NoopAssignmentLogger,
    transport::{HttpTransport, HttpTransportConfig, ResolveTransport},
    AssignmentLogger, Client, Error, Result,
};

/// Region of the Confidence backend. Selects both resolve and event URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Region {
    /// Global endpoints. Used unless configured otherwise.
    #[default]
    Global,
    /// European Union endpoints.
    #[serde(rename = "EU")]
    Eu,
    /// United States endpoints.
    #[serde(rename = "US")]
    Us,
}

impl Region {
    /// Base URL of the flag resolver.
    pub fn resolve_url(self) -> &'static str {
        match self {
            Region::Global => "https://resolver.confidence.dev",
            Region::Eu => "https://resolver.eu.confidence.dev",
            Region::Us => "https://resolver.us.confidence.dev",
        }
    }

    /// Base URL of event ingestion.
    pub fn event_url(self) -> &'static str {
        match self {
            Region::Global => "https://events.confidence.dev",
            Region::Eu => "https://events.eu.confidence.dev",
            Region::Us => "https://events.us.confidence.dev",
        }
    }
}

/// Configuration for [`Client`].
///
/// # Examples
/// ```
/// # use confidence::{ClientConfig, Region};
/// let client = ClientConfig::from_client_secret("client-secret")
///     .region(Region::Eu)
///     .timeout_seconds(5)
///     .assignment_logger(|event| {
///         println!("{:?}", event);
///     })
///     .to_client()
///     .unwrap();
/// ```
pub struct ClientConfig {
    pub(crate) client_secret: String,
    pub(crate) region: Region,
    pub(crate) resolve_base_url: Option<String>,
    pub(crate) timeout: Duration,
    pub(crate) max_retries: u32,
    pub(crate) log_level: LevelFilter,
    pub(crate) apply: bool,
    pub(crate) client_name: String,
    pub(crate) client_credential_name: String,
    pub(crate) assignment_logger: Arc<dyn AssignmentLogger + Send + Sync>,
    pub(crate) transport: Option<Arc<dyn ResolveTransport>>,
}

impl ClientConfig {
    /// Default timeout of a single resolve attempt.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default number of retries after the first failed attempt.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Create a default configuration using the specified client secret.
    ///
    /// ```
    /// # use confidence::ClientConfig;
    /// ClientConfig::from_client_secret("client-secret");
    /// ```
    pub fn from_client_secret(client_secret: impl Into<String>) -> Self {
        ClientConfig {
            client_secret: client_secret.into(),
            region: Region::default(),
            resolve_base_url: None,
            timeout: ClientConfig::DEFAULT_TIMEOUT,
            max_retries: ClientConfig::DEFAULT_MAX_RETRIES,
            log_level: LevelFilter::Info,
            apply: true,
            client_name: String::new(),
            client_credential_name: String::new(),
            assignment_logger: Arc::new(NoopAssignmentLogger),
            transport: None,
        }
    }

    /// Select the backend region. Defaults to [`Region::Global`].
    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Override the resolver base URL. Clients should use the region setting in most cases.
    pub fn resolve_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.resolve_base_url = Some(base_url.into());
        self
    }

    /// Timeout of a single resolve attempt. Must be positive.
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds);
        self
    }

    /// Timeout of a single resolve attempt, at finer granularity than
    /// [`timeout_seconds`](Self::timeout_seconds). Must be positive.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of retries after a failed attempt. Zero disables retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Most verbose level the client emits through the `log` facade.
    pub fn log_level(mut self, log_level: LevelFilter) -> Self {
        self.log_level = log_level;
        self
    }

    /// Whether resolves count as assignments. Enabled by default.
    pub fn apply(mut self, apply: bool) -> Self {
        self.apply = apply;
        self
    }

    /// Names reported in assignment telemetry.
    pub fn client_identity(
        mut self,
        client_name: impl Into<String>,
        client_credential_name: impl Into<String>,
    ) -> Self {
        self.client_name = client_name.into();
        self.client_credential_name = client_credential_name.into();
        self
    }

    /// Set assignment logger to forward applied flags to your telemetry pipeline.
    pub fn assignment_logger(
        mut self,
        assignment_logger: impl AssignmentLogger + Send + Sync + 'static,
    ) -> Self {
        self.assignment_logger = Arc::new(assignment_logger);
        self
    }

    /// Replace the HTTP transport, e.g. with an in-process resolver.
    pub fn transport(mut self, transport: impl ResolveTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Base URL resolves are sent to.
    pub fn resolve_url(&self) -> &str {
        self.resolve_base_url
            .as_deref()
            .unwrap_or(self.region.resolve_url())
    }

    /// Base URL for event delivery of the configured region.
    pub fn event_url(&self) -> &str {
        self.region.event_url()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.client_secret.is_empty() {
            return Err(Error::InvalidConfiguration(
                "client_secret must not be empty".to_owned(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfiguration(
                "timeout must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    pub(crate) fn build_transport(&self) -> Result<Arc<dyn ResolveTransport>> {
        if let Some(transport) = &self.transport {
            return Ok(transport.clone());
        }
        let transport = HttpTransport::new(HttpTransportConfig {
            base_url: self.resolve_url().to_owned(),
            timeout: self.timeout,
            max_retries: self.max_retries,
            log_level: self.log_level,
        })?;
        Ok(Arc::new(transport))
    }

    /// Create a new [`Client`] using the specified configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`] if the client secret is empty or the timeout is zero.
    /// - [`Error::InvalidBaseUrl`] if the resolve URL cannot be parsed.
    pub fn to_client(self) -> Result<Client> {
        Client::new(self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ClientConfig, Region};
    use crate::Error;

    #[test]
    fn defaults() {
        let config = ClientConfig::from_client_secret("secret");
        assert_eq!(config.region, Region::Global);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert!(config.apply);
        assert_eq!(config.resolve_url(), "https://resolver.confidence.dev");
        assert_eq!(config.event_url(), "https://events.confidence.dev");
    }

    #[test]
    fn region_selects_both_urls() {
        let config = ClientConfig::from_client_secret("secret").region(Region::Eu);
        assert_eq!(config.resolve_url(), "https://resolver.eu.confidence.dev");
        assert_eq!(config.event_url(), "https://events.eu.confidence.dev");

        let config = ClientConfig::from_client_secret("secret").region(Region::Us);
        assert_eq!(config.resolve_url(), "https://resolver.us.confidence.dev");
        assert_eq!(config.event_url(), "https://events.us.confidence.dev");
    }

    #[test]
    fn base_url_override_only_affects_resolves() {
        let config = ClientConfig::from_client_secret("secret")
            .region(Region::Us)
            .resolve_base_url("http://localhost:8080");
        assert_eq!(config.resolve_url(), "http://localhost:8080");
        assert_eq!(config.event_url(), "https://events.us.confidence.dev");
    }

    #[test]
    fn rejects_zero_timeout_and_empty_secret() {
        assert!(matches!(
            ClientConfig::from_client_secret("secret")
                .timeout_seconds(0)
                .to_client(),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ClientConfig::from_client_secret("").to_client(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            ClientConfig::from_client_secret("secret")
                .resolve_base_url("not a url")
                .to_client(),
            Err(Error::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn region_parses_from_config_names() {
        let region: Region = serde_json::from_str(r#""EU""#).unwrap();
        assert_eq!(region, Region::Eu);
        let region: Region = serde_json::from_str(r#""Global""#).unwrap();
        assert_eq!(region, Region::Global);
    }
}
