//! Cluster Gate Library
//!
//! Token validation and authorization gate for a multi-tenant cluster
//! management system.
//!
//! # Features
//!
//! - **Probe-based token validation**: a credential is valid when it can `get`
//!   an onboarded namespace; the cluster has no direct validity check
//! - **RBAC delegation**: every authorization question is answered by the
//!   cluster's own access-control evaluator, never cached
//! - **Stable error codes**: `UNAUTHENTICATED`, `PERMISSION_DENIED`,
//!   `CONFIGURATION_FAULT`, `UPSTREAM`
//! - **Kubernetes backend**: `SelfSubjectAccessReview` and labelled namespaces
//! - **HTTP surface**: JSON endpoints for AuthorizeAction, ValidateToken, LogIn

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod gate;
pub mod server;

pub use error::{Error, ErrorCode, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
    }
}
