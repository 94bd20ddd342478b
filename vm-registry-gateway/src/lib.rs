//! # Registry Gateway
//!
//! A single npm registry endpoint in front of several upstream registries.
//! Package metadata is fetched from every upstream and merged; version
//! requests are redirected to the highest-priority upstream that serves the
//! version.
//!
//! ## Key Modules
//!
//! - [`classify`]: turns request paths into package requests
//! - [`cache`]: remembers which upstream serves a package version
//! - [`merge`]: folds packuments from several upstreams into one
//! - [`resolver`]: per-request resolution across upstreams
//! - [`rewrite`]: rebases request URLs onto upstream base URLs
//! - [`upstream`]: the upstream registry client trait and its HTTP client
//! - [`server`]: HTTP routes and server lifecycle
//! - [`config`]: configuration file and command-line settings

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod merge;
pub mod resolver;
pub mod rewrite;
pub mod server;
pub mod state;
pub mod upstream;
pub mod validation;

// Re-export key types for convenience
pub use cache::{Priority, VersionLocationCache};
pub use classify::{classify_path, Classified};
pub use config::{ConfigError, ConfigOverrides, GatewayConfig, RegistrySettings};
pub use error::{ApiErrorResponse, AppError, AppResult, ErrorCode};
pub use merge::{merge_packuments, MergeError};
pub use resolver::{RegistryResolver, Resolution};
pub use rewrite::rewrite_base;
pub use server::{build_state, router, run_server};
pub use state::AppState;
pub use upstream::{HttpRegistryClient, RegistryClient, UpstreamConfig, UpstreamError};
