//! # Configuration Management
//!
//! Gateway settings can come from a JSON file, from command-line flags, or
//! both; flags win. Every field has a default except the registry list,
//! which must end up non-empty.
//!
//! ```json
//! {
//!   "address": "0.0.0.0",
//!   "port": 22000,
//!   "registries": [
//!     "https://npm.internal.example/",
//!     "https://registry.npmjs.org/"
//!   ],
//!   "default_registry": "https://registry.npmjs.org/",
//!   "timeout_secs": 30,
//!   "log_requests": true
//! }
//! ```
//!
//! ```rust,no_run
//! # use vm_registry_gateway::config::GatewayConfig;
//! let config = GatewayConfig::load_or_default("registry-gateway.json")?;
//! let registries = config.registry_settings()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppResult;

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address to bind to
    pub address: String,
    /// Port to listen on
    pub port: u16,
    /// Upstream registries in priority order (first = highest precedence)
    pub registries: Vec<String>,
    /// Registry receiving every request that is not a package request;
    /// the first registry when unset
    pub default_registry: Option<String>,
    /// Upper bound for each upstream call
    pub timeout_secs: u64,
    /// Log every incoming request
    pub log_requests: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: 22000,
            registries: Vec::new(),
            default_registry: None,
            timeout_secs: 30,
            log_requests: true,
        }
    }
}

/// Values given on the command line; `None` keeps the file or default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub registries: Vec<String>,
    pub default_registry: Option<String>,
    pub timeout_secs: Option<u64>,
    pub log_requests: Option<bool>,
}

/// Validated registry URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySettings {
    /// Priority order, index 0 first
    pub registries: Vec<Url>,
    pub default_registry: Url,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one upstream registry is required")]
    NoRegistries,

    #[error("invalid registry URL {url}: {reason}")]
    InvalidRegistryUrl { url: String, reason: String },

    #[error("invalid listen address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

impl GatewayConfig {
    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config_str = fs::read_to_string(path)?;
        let config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// Load configuration from file, or the defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply command-line values on top of this configuration.
    ///
    /// A non-empty registry list on the command line replaces the file's list
    /// as a whole, since mixing the two would make priorities ambiguous.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(address) = overrides.address {
            self.address = address;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if !overrides.registries.is_empty() {
            self.registries = overrides.registries;
        }
        if overrides.default_registry.is_some() {
            self.default_registry = overrides.default_registry;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(log_requests) = overrides.log_requests {
            self.log_requests = log_requests;
        }
        self
    }

    /// Parse and validate the registry URLs.
    pub fn registry_settings(&self) -> Result<RegistrySettings, ConfigError> {
        if self.registries.is_empty() {
            return Err(ConfigError::NoRegistries);
        }

        let registries = self
            .registries
            .iter()
            .map(|url| parse_registry_url(url))
            .collect::<Result<Vec<_>, _>>()?;

        let default_registry = match &self.default_registry {
            Some(url) => parse_registry_url(url)?,
            None => registries[0].clone(),
        };

        Ok(RegistrySettings {
            registries,
            default_registry,
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// URL clients use to reach the gateway.
    ///
    /// IPv6 literals are bracketed so that `::1` yields `http://[::1]:22000/`.
    pub fn public_url(&self) -> Result<Url, ConfigError> {
        let host = match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{ip}]"),
            _ => self.address.clone(),
        };

        Url::parse(&format!("http://{}:{}/", host, self.port)).map_err(|e| {
            ConfigError::InvalidAddress {
                address: self.address.clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// Parse a registry base URL, dropping query and fragment.
pub fn parse_registry_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidRegistryUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
