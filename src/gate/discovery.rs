//! Namespace discovery.

use tracing::debug;

use super::Identity;
use crate::cluster::{ClusterError, NamespaceDescriptor};
use crate::{Error, Result};

/// List the namespaces onboarded to this system, in the cluster's order.
///
/// A credential the cluster rejects becomes [`Error::Unauthenticated`]; any
/// other cluster failure is passed through as [`Error::Upstream`]. An empty
/// result is returned as-is.
pub async fn list_onboarded_namespaces(identity: &Identity) -> Result<Vec<NamespaceDescriptor>> {
    match identity.client().list_onboarded_namespaces().await {
        Ok(namespaces) => {
            let onboarded: Vec<_> = namespaces.into_iter().filter(|ns| ns.onboarded).collect();
            debug!(count = onboarded.len(), "Listed onboarded namespaces");
            Ok(onboarded)
        }
        Err(ClusterError::Unauthorized) => Err(Error::Unauthenticated),
        Err(e) => Err(Error::Upstream(e)),
    }
}
