//! HTTP implementation of [`FeatureSource`].
//!
//! # Example
//!
//! ```no_run
//! use greenway_core::FeatureClass;
//! use greenway_data::{FeatureSource, HttpFeatureSource, default_source_url};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let url = default_source_url(FeatureClass::Entrances).parse()?;
//! let source = HttpFeatureSource::new(url)?;
//! let snapshot = source.fetch_snapshot().await?;
//! println!("{} entrances upstream", snapshot.features.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use thiserror::Error;
use url::Url;

use super::payload::QueryResponse;
use super::{FeatureSource, SourceError, SourceSnapshot};

/// Default user agent for upstream requests.
pub const DEFAULT_USER_AGENT: &str = "greenway-explorer/0.1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error raised when an [`HttpFeatureSource`] cannot be constructed.
#[derive(Debug, Error)]
pub enum SourceBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// Configuration for [`HttpFeatureSource`].
#[derive(Debug, Clone)]
pub struct HttpFeatureSourceConfig {
    /// Query URL returning a GeoJSON feature collection.
    pub url: Url,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl HttpFeatureSourceConfig {
    /// Create a configuration for the given URL with default settings.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Feature source backed by an HTTP GET returning GeoJSON.
#[derive(Debug, Clone)]
pub struct HttpFeatureSource {
    client: Client,
    config: HttpFeatureSourceConfig,
}

impl HttpFeatureSource {
    /// Create a source with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(url: Url) -> Result<Self, SourceBuildError> {
        Self::with_config(HttpFeatureSourceConfig::new(url))
    }

    /// Create a source with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_config(config: HttpFeatureSourceConfig) -> Result<Self, SourceBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(SourceBuildError::HttpClient)?;
        Ok(Self { client, config })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &HttpFeatureSourceConfig {
        &self.config
    }

    /// Convert a reqwest error to a `SourceError`.
    fn convert_reqwest_error(&self, error: &reqwest::Error) -> SourceError {
        let url = self.config.url.to_string();
        if error.is_timeout() {
            return SourceError::Timeout {
                url,
                timeout: self.config.timeout,
            };
        }

        if let Some(status) = error.status() {
            return SourceError::Http {
                url,
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        if error.is_decode() || error.is_body() {
            return SourceError::Payload {
                url,
                message: error.to_string(),
            };
        }

        SourceError::Network {
            url,
            message: error.to_string(),
        }
    }

    /// Interpret a response body.
    fn convert_response(&self, body: &[u8]) -> Result<SourceSnapshot, SourceError> {
        let url = || self.config.url.to_string();
        let response: QueryResponse =
            serde_json::from_slice(body).map_err(|err| SourceError::Payload {
                url: url(),
                message: err.to_string(),
            })?;

        if let Some(fault) = response.error {
            return Err(SourceError::Service {
                url: url(),
                code: fault.code,
                message: fault.message,
            });
        }

        let features = response.features.ok_or_else(|| SourceError::Payload {
            url: url(),
            message: "response has no features array".to_owned(),
        })?;
        Ok(SourceSnapshot { features })
    }
}

#[async_trait]
impl FeatureSource for HttpFeatureSource {
    fn location(&self) -> &str {
        self.config.url.as_str()
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, SourceError> {
        debug!("requesting {}", self.config.url);
        let body = self
            .client
            .get(self.config.url.clone())
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err))?
            .bytes()
            .await
            .map_err(|err| self.convert_reqwest_error(&err))?;

        self.convert_response(&body)
    }
}
