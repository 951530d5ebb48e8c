//! Transports that perform the resolve call.
use std::time::Duration;

use async_trait::async_trait;
use log::{Level, LevelFilter};
use rand::{thread_rng, Rng};
use reqwest::{StatusCode, Url};

use crate::{
    resolve::{ResolveRequest, ResolveResponse},
    Error, Result,
};

/// Performs resolve calls against the flag resolver.
///
/// [`HttpTransport`] talks to the remote resolver. Alternative resolvers (in-process, or fakes in
/// tests) can be plugged in through [`ClientConfig::transport`](crate::ClientConfig::transport).
#[async_trait]
pub trait ResolveTransport: Send + Sync {
    /// Resolve the flags named in `request`.
    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse>;
}

/// Settings of [`HttpTransport`].
pub struct HttpTransportConfig {
    /// Resolver base URL, without the endpoint path.
    pub base_url: String,
    /// Timeout of a single attempt.
    pub timeout: Duration,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Most verbose level the transport logs at.
    pub log_level: LevelFilter,
}

const RESOLVE_ENDPOINT: &str = "/v1/flags:resolve";

const RETRY_INTERVAL: Duration = Duration::from_millis(100);
const RETRY_JITTER: Duration = Duration::from_millis(50);

/// Resolves flags over HTTP.
pub struct HttpTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
    max_retries: u32,
    log_level: LevelFilter,
}

impl HttpTransport {
    /// Create a transport posting to `{base_url}/v1/flags:resolve`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBaseUrl`] if the resulting URL cannot be parsed.
    pub fn new(config: HttpTransportConfig) -> Result<HttpTransport> {
        let url = Url::parse(&format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            RESOLVE_ENDPOINT
        ))
        .map_err(Error::InvalidBaseUrl)?;

        Ok(HttpTransport {
            client: reqwest::Client::new(),
            url,
            timeout: config.timeout,
            max_retries: config.max_retries,
            log_level: config.log_level,
        })
    }

    async fn send(&self, request: &ResolveRequest) -> Result<ResolveResponse> {
        let response = self
            .client
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let response = response.error_for_status().map_err(|err| {
            if err.status() == Some(StatusCode::UNAUTHORIZED) {
                if Level::Warn <= self.log_level {
                    log::warn!(target: "confidence", "client is not authorized. Check your client secret");
                }
                Error::Unauthorized
            } else {
                Error::from(err)
            }
        })?;

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ResolveTransport for HttpTransport {
    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse> {
        let mut attempt = 0;
        loop {
            match self.send(request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    if Level::Debug <= self.log_level {
                        log::debug!(target: "confidence", attempt; "retrying resolve after error: {:?}", err);
                    }
                    tokio::time::sleep(jitter(RETRY_INTERVAL, RETRY_JITTER)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Apply a random jitter to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    interval + thread_rng().gen_range(Duration::ZERO..jitter)
}
