//! Authorization delegate: asks the RBAC authority and normalizes the answer.

use std::sync::Arc;

use tracing::debug;

use super::{ActionDescriptor, Identity, Verdict};
use crate::cluster::RbacAuthority;
use crate::{Error, Result};

/// Pass-through to the cluster's RBAC authority.
///
/// Never infers a permission on its own. Authority failures are wrapped with
/// the full action so a denial can be diagnosed from the error alone.
#[derive(Clone)]
pub struct AuthorizationDelegate {
    authority: Arc<dyn RbacAuthority>,
}

impl AuthorizationDelegate {
    /// Create a delegate for `authority`
    #[must_use]
    pub fn new(authority: Arc<dyn RbacAuthority>) -> Self {
        Self { authority }
    }

    /// Ask whether `identity` may perform `action`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] if the authority could not answer.
    pub async fn check_allowed(
        &self,
        identity: &Identity,
        action: &ActionDescriptor,
    ) -> Result<Verdict> {
        match self.authority.is_authorized(identity, action).await {
            Ok(allowed) => {
                debug!(
                    namespace = %action.namespace,
                    verb = %action.verb,
                    group = %action.group,
                    resource = %action.resource,
                    name = %action.resource_name,
                    cluster_scoped = action.is_cluster_scoped(),
                    allowed,
                    "RBAC verdict"
                );
                Ok(if allowed { Verdict::allow() } else { Verdict::deny() })
            }
            Err(source) => Err(Error::Authorization {
                action: action.clone(),
                source,
            }),
        }
    }
}
