//! # Application State Management
//!
//! [`AppState`] is created once at startup and shared by every request
//! handler through an `Arc`.

use std::sync::Arc;

use url::Url;

use crate::resolver::RegistryResolver;

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resolver owning the upstream clients and the version location cache
    pub resolver: Arc<RegistryResolver>,
    /// Base URL the gateway is reachable at; incoming paths are resolved
    /// against it before rewriting
    pub public_url: Url,
}

impl AppState {
    pub fn new(resolver: RegistryResolver, public_url: Url) -> Self {
        Self {
            resolver: Arc::new(resolver),
            public_url,
        }
    }

    /// Absolute URL of an incoming request.
    pub fn request_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.public_url.clone();
        url.set_path(path);
        url.set_query(query);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_request_url_keeps_path_and_query() {
        let default = Url::parse("https://registry.npmjs.org/").unwrap();
        let resolver = RegistryResolver::new(Vec::new(), default, Duration::from_secs(1));
        let state = AppState::new(resolver, Url::parse("http://localhost:22000/").unwrap());

        let url = state.request_url("/@types%2Fnode", Some("write=true"));
        assert_eq!(url.as_str(), "http://localhost:22000/@types%2Fnode?write=true");

        // A leading double slash must not be taken for an authority.
        let url = state.request_url("//evil.example/x", None);
        assert_eq!(url.host_str(), Some("localhost"));
    }
}
