//! HTTP FHIR client
//!
//! Resolves sync URLs against the configured base URL, attaches credentials,
//! retries transient failures with exponential backoff and turns response
//! bodies into [`FhirResource`] pages.

use super::traits::FhirServer;
use crate::config::FhirConfig;
use crate::domain::{FhirError, FhirResource, FhirSyncError, Result};
use crate::log_retry_attempt;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::ExposeSecret;
use std::time::Duration;
use url::Url;

/// Media type requested from the server
const FHIR_JSON: &str = "application/fhir+json";

/// FHIR client over HTTP
///
/// # Example
///
/// ```no_run
/// use fhirsync::adapters::fhir::{FhirServer, HttpFhirClient};
/// use fhirsync::config::FhirConfig;
///
/// # async fn example() -> fhirsync::domain::Result<()> {
/// let client = HttpFhirClient::new(FhirConfig::default())?;
/// let page = client.fetch("Patient?_count=50").await?;
/// println!("Fetched a {}", page.type_name());
/// # Ok(())
/// # }
/// ```
pub struct HttpFhirClient {
    /// Base URL, always ending in `/` so relative URLs join underneath it
    base: Url,

    /// HTTP client for making requests
    client: Client,

    /// FHIR configuration
    config: FhirConfig,
}

impl HttpFhirClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is not a valid URL or
    /// the HTTP client cannot be built.
    pub fn new(config: FhirConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| {
            FhirSyncError::Configuration(format!("Invalid fhir.base_url '{}': {e}", config.base_url))
        })?;

        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification is disabled for the FHIR server");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            FhirSyncError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base,
            client,
            config,
        })
    }

    /// Resolve a request URL against the base URL
    ///
    /// Absolute URLs (server-issued `next` links) are used as-is.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base
                .join(url.trim_start_matches('/'))
                .map_err(|e| FhirSyncError::Validation(format!("Invalid request URL '{url}': {e}"))),
            Err(e) => Err(FhirSyncError::Validation(format!(
                "Invalid request URL '{url}': {e}"
            ))),
        }
    }

    /// Build authorization header value
    fn auth_header_value(&self) -> Option<String> {
        match self.config.auth_type.as_str() {
            "bearer" => self
                .config
                .token
                .as_ref()
                .map(|token| format!("Bearer {}", token.expose_secret())),
            "basic" => match (&self.config.username, &self.config.password) {
                (Some(username), Some(password)) => {
                    let credentials = format!("{username}:{}", password.expose_secret());
                    let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
                    Some(format!("Basic {encoded}"))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Retry a request with exponential backoff
    ///
    /// Only transient errors are retried; OperationOutcomes and 4xx answers
    /// are returned immediately.
    async fn retry_request<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(FhirSyncError::Fhir(e)) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= retry.max_retries {
                        return Err(e.into());
                    }

                    let delay_ms = (retry.initial_delay_ms as f64
                        * retry.backoff_multiplier.powi(attempt as i32 - 1))
                        as u64;
                    let delay_ms = delay_ms.min(retry.max_delay_ms);

                    log_retry_attempt!(attempt, retry.max_retries, e.to_string().as_str());
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<FhirResource> {
        let mut request = self.client.get(url.clone()).header("Accept", FHIR_JSON);
        if let Some(auth) = self.auth_header_value() {
            request = request.header("Authorization", auth);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FhirError::Timeout(e.to_string())
            } else {
                FhirError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| FhirError::ConnectionFailed(e.to_string()))?;

        if status.is_success() {
            return FhirResource::from_slice(&body);
        }

        Err(error_for_status(status, &body).into())
    }
}

/// Map an unsuccessful HTTP answer to a FHIR error
fn error_for_status(status: StatusCode, body: &[u8]) -> FhirError {
    let outcome = match FhirResource::from_slice(body) {
        Ok(FhirResource::OperationOutcome(outcome)) => Some(outcome.diagnostics()),
        _ => None,
    };
    let message = outcome
        .clone()
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FhirError::AuthenticationFailed(format!("{status}: {message}"))
        }
        StatusCode::TOO_MANY_REQUESTS => FhirError::RateLimitExceeded(message),
        s if s.is_server_error() => FhirError::ServerError {
            status: s.as_u16(),
            message,
        },
        _ => match outcome {
            Some(diagnostics) => FhirError::OperationOutcome(diagnostics),
            None => FhirError::ClientError {
                status: status.as_u16(),
                message,
            },
        },
    }
}

#[async_trait]
impl FhirServer for HttpFhirClient {
    async fn fetch(&self, url: &str) -> Result<FhirResource> {
        let resolved = self.resolve(url)?;
        tracing::debug!(url = %resolved, "Fetching FHIR page");

        self.retry_request(|| self.fetch_once(&resolved)).await
    }

    fn base_url(&self) -> &str {
        self.base.as_str()
    }
}
