//! Upstream registry clients.
//!
//! The resolver talks to upstream registries only through the
//! [`RegistryClient`] trait, so tests can inject in-memory registries instead
//! of reaching the network. [`HttpRegistryClient`] is the production
//! implementation on top of `reqwest`.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use url::Url;
//! use vm_registry_gateway::upstream::{HttpRegistryClient, RegistryClient, UpstreamConfig};
//!
//! let base = Url::parse("https://registry.npmjs.org/")?;
//! let client = HttpRegistryClient::new(base, &UpstreamConfig::default())?;
//!
//! let packument = client.fetch_packument("left-pad").await?;
//! client.probe_version("left-pad", "1.3.0").await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::rewrite::registry_url;
use crate::{AppError, AppResult};

/// Failure to obtain an answer from an upstream registry.
///
/// Every variant is non-fatal: the resolver drops the registry's contribution
/// for the current request and moves on.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("registry unreachable: {0}")]
    Unreachable(String),

    #[error("registry answered with status {status}")]
    Rejected { status: u16 },

    #[error("registry did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("registry returned an unusable body: {0}")]
    InvalidBody(String),
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Capabilities the resolver needs from an upstream registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Base URL of the registry, used for redirects.
    fn base_url(&self) -> &Url;

    /// Fetch the full packument of `package`.
    async fn fetch_packument(&self, package: &str) -> UpstreamResult<Value>;

    /// Succeed if the registry serves `package@version`.
    async fn probe_version(&self, package: &str, version: &str) -> UpstreamResult<()>;
}

/// Connection settings shared by every [`HttpRegistryClient`].
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// HTTP request timeout for upstream calls
    pub timeout: Duration,
    /// User agent sent with every upstream request
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("vm-registry-gateway/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// `reqwest`-backed client for one upstream registry.
pub struct HttpRegistryClient {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl HttpRegistryClient {
    /// Create a client for the registry rooted at `base`.
    ///
    /// Query string and fragment of `base` are discarded.
    pub fn new(mut base: Url, config: &UpstreamConfig) -> AppResult<Self> {
        base.set_query(None);
        base.set_fragment(None);

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            timeout: config.timeout,
        })
    }

    /// Create clients for a list of registries, preserving their order.
    pub fn for_registries(bases: &[Url], config: &UpstreamConfig) -> AppResult<Vec<Self>> {
        bases
            .iter()
            .map(|base| Self::new(base.clone(), config))
            .collect()
    }

    fn transport_error(&self, url: &Url, error: reqwest::Error) -> UpstreamError {
        warn!(url = %url, error = %error, "Upstream request failed");
        if error.is_timeout() {
            UpstreamError::TimedOut(self.timeout)
        } else {
            UpstreamError::Unreachable(error.to_string())
        }
    }

    fn check_status(&self, url: &Url, status: StatusCode) -> UpstreamResult<()> {
        if status.is_success() {
            Ok(())
        } else {
            debug!(url = %url, status = %status, "Upstream rejected request");
            Err(UpstreamError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    fn base_url(&self) -> &Url {
        &self.base
    }

    async fn fetch_packument(&self, package: &str) -> UpstreamResult<Value> {
        let url = registry_url(&self.base, &[package]);
        debug!(url = %url, "Fetching packument");

        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        self.check_status(&url, response.status())?;

        response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidBody(e.to_string()))
    }

    async fn probe_version(&self, package: &str, version: &str) -> UpstreamResult<()> {
        let url = registry_url(&self.base, &[package, version]);
        debug!(url = %url, "Probing package version");

        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        self.check_status(&url, response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_strips_query_and_fragment() {
        let base = Url::parse("https://registry.example/npm/?token=abc#top").unwrap();
        let client = HttpRegistryClient::new(base, &UpstreamConfig::default()).unwrap();
        assert_eq!(client.base_url().as_str(), "https://registry.example/npm/");
    }

    #[test]
    fn test_for_registries_preserves_order() {
        let bases = vec![
            Url::parse("https://a.example/").unwrap(),
            Url::parse("https://b.example/").unwrap(),
        ];
        let clients = HttpRegistryClient::for_registries(&bases, &UpstreamConfig::default()).unwrap();
        let hosts: Vec<_> = clients
            .iter()
            .map(|c| c.base_url().host_str().unwrap().to_string())
            .collect();
        assert_eq!(hosts, vec!["a.example", "b.example"]);
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_reported() {
        // Port 9 (discard) on localhost is closed in test environments.
        let base = Url::parse("http://127.0.0.1:9/").unwrap();
        let config = UpstreamConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let client = HttpRegistryClient::new(base, &config).unwrap();

        let result = client.fetch_packument("lodash").await;
        assert!(matches!(
            result,
            Err(UpstreamError::Unreachable(_)) | Err(UpstreamError::TimedOut(_))
        ));
    }
}
