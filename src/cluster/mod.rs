//! Cluster collaborators consumed by the gate.
//!
//! The gate never decides anything on its own: which namespaces are
//! onboarded, what the system configuration says, and whether an identity
//! may perform an action are all answered by the cluster. This module
//! defines those contracts as traits so the gate can be driven by the real
//! Kubernetes API ([`kube`]) or by in-memory fixtures ([`memory`]).

pub mod kube;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gate::{ActionDescriptor, Credential, Identity};

pub use kube::KubeCluster;
pub use memory::InMemoryCluster;

/// Errors reported by cluster collaborators.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The cluster rejected the credential itself
    #[error("Unauthorized")]
    Unauthorized,

    /// The cluster API answered with a non-success status
    #[error("cluster API returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message from the API server's `Status` object, or the raw body
        message: String,
    },

    /// Transport failure
    #[error("cluster API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("invalid cluster API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Bad API server URL
    #[error("invalid cluster API URL: {0}")]
    Url(#[from] url::ParseError),

    /// Any other collaborator failure
    #[error("{0}")]
    Other(String),
}

/// One cluster namespace as seen by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDescriptor {
    /// Namespace name
    pub name: String,
    /// Whether the namespace is onboarded to this system
    pub onboarded: bool,
}

impl NamespaceDescriptor {
    /// An onboarded namespace
    pub fn onboarded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            onboarded: true,
        }
    }
}

/// System-wide key/value configuration stored in the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemConfig(BTreeMap<String, String>);

impl SystemConfig {
    /// Wrap a key/value map
    #[must_use]
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self(values)
    }

    /// Look up a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for SystemConfig {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Cluster queries made on behalf of one credential.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Namespaces onboarded to this system, in the cluster's list order.
    ///
    /// Must return [`ClusterError::Unauthorized`] when the cluster rejects
    /// the credential.
    async fn list_onboarded_namespaces(&self) -> Result<Vec<NamespaceDescriptor>, ClusterError>;

    /// The system configuration map
    async fn system_config(&self) -> Result<SystemConfig, ClusterError>;
}

/// Builds a [`ClusterClient`] for a request's credential.
pub trait ClusterConnector: Send + Sync {
    /// Bind `credential` to a client. Must not judge the credential.
    fn connect(&self, credential: &Credential) -> Result<Box<dyn ClusterClient>, ClusterError>;
}

/// The cluster's native access-control evaluator.
#[async_trait]
pub trait RbacAuthority: Send + Sync {
    /// Whether `identity` may perform `action`
    async fn is_authorized(
        &self,
        identity: &Identity,
        action: &ActionDescriptor,
    ) -> Result<bool, ClusterError>;
}
