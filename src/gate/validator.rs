//! Credential validation by probe.
//!
//! The cluster has no "is this token valid" call. A credential is considered
//! valid when it can `get` one of the onboarded namespaces:
//!
//! ```text
//! list onboarded namespaces ──► pick probe target ──► get namespaces/<target>
//!        │ Unauthorized              │ none                  │ denied
//!        ▼                           ▼                       ▼
//!  Unauthenticated           ConfigurationFault        Unauthenticated
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ActionDescriptor, AuthorizationDelegate, Identity, discovery};
use crate::cluster::NamespaceDescriptor;
use crate::{Error, Result};

/// How the probe target is chosen among the onboarded namespaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeSelection {
    /// First namespace in the order the cluster listed them
    #[default]
    First,
    /// Lexicographically smallest name, for clusters without a stable list order
    Lexicographic,
}

impl ProbeSelection {
    /// Pick the probe target from `namespaces`
    #[must_use]
    pub fn select(self, namespaces: &[NamespaceDescriptor]) -> Option<&NamespaceDescriptor> {
        match self {
            Self::First => namespaces.first(),
            Self::Lexicographic => namespaces.iter().min_by(|a, b| a.name.cmp(&b.name)),
        }
    }
}

/// Decides whether a credential is minimally valid.
#[derive(Clone)]
pub struct TokenValidator {
    delegate: AuthorizationDelegate,
    selection: ProbeSelection,
}

impl TokenValidator {
    /// Create a validator that probes through `delegate`
    #[must_use]
    pub fn new(delegate: AuthorizationDelegate, selection: ProbeSelection) -> Self {
        Self {
            delegate,
            selection,
        }
    }

    /// Validate `identity` against the cluster.
    ///
    /// Nothing is cached: every call lists namespaces and runs the probe again.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthenticated`] if the cluster rejects the credential or
    ///   the probe is denied
    /// - [`Error::ConfigurationFault`] if no namespace is onboarded
    /// - listing and authority failures are passed through unchanged
    pub async fn validate(&self, identity: &Identity) -> Result<()> {
        let namespaces = discovery::list_onboarded_namespaces(identity).await?;

        let Some(target) = self.selection.select(&namespaces) else {
            warn!("No onboarded namespaces; credentials cannot be validated");
            return Err(Error::ConfigurationFault(
                "no namespaces are onboarded to this system".to_string(),
            ));
        };

        let probe = ActionDescriptor::namespace_probe(&target.name);
        let verdict = self.delegate.check_allowed(identity, &probe).await?;
        if !verdict.allowed {
            debug!(probe_namespace = %target.name, "Probe denied");
            return Err(Error::Unauthenticated);
        }

        debug!(probe_namespace = %target.name, "Credential valid");
        Ok(())
    }
}
