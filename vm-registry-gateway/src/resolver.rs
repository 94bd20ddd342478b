//! Request resolution across the configured upstream registries.
//!
//! The resolver owns the [`VersionLocationCache`] and decides, for every
//! classified request, whether to serve a merged packument, redirect the
//! client to one upstream registry, or report the package as missing.
//!
//! Upstream calls are issued concurrently, but conflicts are always settled
//! by configured priority, never by which registry answered first.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{Priority, VersionLocationCache};
use crate::classify::{classify_path, Classified};
use crate::merge::{merge_packuments, version_keys};
use crate::rewrite::rewrite_base;
use crate::upstream::{RegistryClient, UpstreamError, UpstreamResult};

/// Outcome of resolving one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Merged packument to serve with a success status.
    Packument(Value),
    /// Send the client to this URL.
    Redirect(Url),
    /// No configured registry could answer.
    NotFound,
}

pub struct RegistryResolver {
    registries: Vec<Arc<dyn RegistryClient>>,
    default_registry: Url,
    cache: VersionLocationCache,
    upstream_timeout: Duration,
}

impl RegistryResolver {
    /// `registries` are in priority order; index 0 has the highest precedence.
    pub fn new(
        registries: Vec<Arc<dyn RegistryClient>>,
        default_registry: Url,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            registries,
            default_registry,
            cache: VersionLocationCache::new(),
            upstream_timeout,
        }
    }

    pub fn registries(&self) -> &[Arc<dyn RegistryClient>] {
        &self.registries
    }

    pub fn default_registry(&self) -> &Url {
        &self.default_registry
    }

    pub fn cache(&self) -> &VersionLocationCache {
        &self.cache
    }

    /// Classify `request_url` and resolve it.
    pub async fn resolve(&self, request_url: &Url) -> Resolution {
        match classify_path(request_url.path()) {
            Classified::PackageRoot { package } => self.resolve_root(&package).await,
            Classified::PackageVersion { package, version } => {
                self.resolve_version(&package, &version, request_url).await
            }
            Classified::Unrecognized => {
                let location = rewrite_base(request_url, &self.default_registry);
                debug!(location = %location, "Redirecting unrecognized request to default registry");
                Resolution::Redirect(location)
            }
        }
    }

    /// Fetch the packument of `package` from every registry and merge the
    /// successful answers.
    pub async fn resolve_root(&self, package: &str) -> Resolution {
        info!(package = %package, "Resolving package");

        let fetches = self
            .registries
            .iter()
            .map(|registry| self.bounded(registry.fetch_packument(package)));
        let results = join_all(fetches).await;

        let mut packuments = Vec::new();
        for (priority, (registry, result)) in self.registries.iter().zip(results).enumerate() {
            match result.and_then(with_versions) {
                Ok((packument, versions)) => {
                    for version in &versions {
                        self.cache.put(package, version, priority);
                    }
                    debug!(
                        package = %package,
                        registry = %registry.base_url(),
                        versions = versions.len(),
                        "Registry answered"
                    );
                    packuments.push(packument);
                }
                Err(e) => {
                    warn!(
                        package = %package,
                        registry = %registry.base_url(),
                        error = %e,
                        "Registry failed to answer"
                    );
                    self.cache.invalidate_registry(package, priority);
                }
            }
        }

        match merge_packuments(&packuments) {
            Ok(merged) => {
                info!(package = %package, sources = packuments.len(), "Resolved package");
                Resolution::Packument(merged)
            }
            Err(_) => {
                warn!(package = %package, "No registry has this package");
                Resolution::NotFound
            }
        }
    }

    /// Redirect a version request to the registry that serves it.
    pub async fn resolve_version(
        &self,
        package: &str,
        version: &str,
        request_url: &Url,
    ) -> Resolution {
        info!(package = %package, version = %version, "Resolving package version");

        if let Some(registry) = self
            .cache
            .get(package, version)
            .and_then(|priority| self.registries.get(priority))
        {
            debug!(package = %package, version = %version, "Cache hit");
            return self.redirect_to(registry.as_ref(), request_url);
        }

        debug!(package = %package, version = %version, "Cache miss");
        match self.first_confirmed(package, version).await {
            Some(priority) => {
                self.cache.put(package, version, priority);
                self.redirect_to(self.registries[priority].as_ref(), request_url)
            }
            None => {
                warn!(package = %package, version = %version, "No registry has this version");
                Resolution::NotFound
            }
        }
    }

    /// Probe every registry concurrently and return the highest-precedence
    /// one that confirms `package@version`.
    ///
    /// Returns as soon as every registry ranked above a confirming one has
    /// declined; dropping the remaining probes cancels them.
    async fn first_confirmed(&self, package: &str, version: &str) -> Option<Priority> {
        let mut probes: FuturesUnordered<_> = self
            .registries
            .iter()
            .enumerate()
            .map(|(priority, registry)| {
                let probe = self.bounded(registry.probe_version(package, version));
                async move { (priority, probe.await) }
            })
            .collect();

        let mut outcomes: Vec<Option<bool>> = vec![None; self.registries.len()];
        let mut next = 0;

        while let Some((priority, result)) = probes.next().await {
            if let Err(e) = &result {
                debug!(
                    registry = %self.registries[priority].base_url(),
                    error = %e,
                    "Registry declined version probe"
                );
            }
            outcomes[priority] = Some(result.is_ok());

            while let Some(Some(confirmed)) = outcomes.get(next) {
                if *confirmed {
                    return Some(next);
                }
                next += 1;
            }
        }

        None
    }

    fn redirect_to(&self, registry: &dyn RegistryClient, request_url: &Url) -> Resolution {
        let location = rewrite_base(request_url, registry.base_url());
        info!(location = %location, "Redirecting");
        Resolution::Redirect(location)
    }

    /// Bound an upstream call by the configured timeout.
    async fn bounded<T>(&self, call: impl Future<Output = UpstreamResult<T>>) -> UpstreamResult<T> {
        tokio::time::timeout(self.upstream_timeout, call)
            .await
            .unwrap_or(Err(UpstreamError::TimedOut(self.upstream_timeout)))
    }
}

/// A packument without a `versions` object counts as a failed answer.
fn with_versions(packument: Value) -> UpstreamResult<(Value, Vec<String>)> {
    match version_keys(&packument) {
        Some(versions) => Ok((packument, versions)),
        None => Err(UpstreamError::InvalidBody(
            "packument has no versions object".to_string(),
        )),
    }
}
