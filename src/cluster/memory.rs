//! In-memory cluster collaborators.
//!
//! Holds a fixed set of known credentials, onboarded namespaces, RBAC grants
//! and a system configuration map. State can be changed between calls to
//! model grants being revoked or namespaces disappearing, and every
//! collaborator call is recorded so call ordering can be asserted.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::{
    ClusterClient, ClusterConnector, ClusterError, NamespaceDescriptor, RbacAuthority,
    SystemConfig,
};
use crate::gate::{ActionDescriptor, Credential, Identity};

/// A collaborator call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    /// `list_onboarded_namespaces`
    ListNamespaces,
    /// `system_config`
    SystemConfig,
    /// `is_authorized` with the action asked about
    IsAuthorized(ActionDescriptor),
}

#[derive(Default)]
struct ClusterState {
    tokens: HashSet<String>,
    namespaces: Vec<NamespaceDescriptor>,
    grants: Vec<(String, ActionDescriptor)>,
    system_config: BTreeMap<String, String>,
    namespace_failure: Option<String>,
    rbac_failure: Option<String>,
    config_failure: Option<String>,
}

/// Shared in-memory cluster.
///
/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<RwLock<ClusterState>>,
    calls: Arc<Mutex<Vec<ClusterCall>>>,
}

impl InMemoryCluster {
    /// An empty cluster: no tokens, no namespaces, no grants
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognize `token` as a credential the cluster accepts
    #[must_use]
    pub fn with_token(self, token: &str) -> Self {
        self.state.write().tokens.insert(token.to_string());
        self
    }

    /// Add a namespace to the listing
    #[must_use]
    pub fn with_namespace(self, name: &str, onboarded: bool) -> Self {
        self.state.write().namespaces.push(NamespaceDescriptor {
            name: name.to_string(),
            onboarded,
        });
        self
    }

    /// Grant `action` to `token`.
    ///
    /// An empty `resource_name` in the grant covers every instance.
    #[must_use]
    pub fn grant(self, token: &str, action: ActionDescriptor) -> Self {
        self.state.write().grants.push((token.to_string(), action));
        self
    }

    /// Grant the credential-validation probe on `namespace` to `token`
    #[must_use]
    pub fn grant_probe(self, token: &str, namespace: &str) -> Self {
        self.grant(token, ActionDescriptor::namespace_probe(namespace))
    }

    /// Set a system configuration entry
    #[must_use]
    pub fn with_config(self, key: &str, value: &str) -> Self {
        self.state
            .write()
            .system_config
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Make namespace listing fail with `message`
    #[must_use]
    pub fn failing_namespaces(self, message: &str) -> Self {
        self.state.write().namespace_failure = Some(message.to_string());
        self
    }

    /// Make RBAC checks fail with `message`
    #[must_use]
    pub fn failing_rbac(self, message: &str) -> Self {
        self.state.write().rbac_failure = Some(message.to_string());
        self
    }

    /// Make the system configuration fetch fail with `message`
    #[must_use]
    pub fn failing_config(self, message: &str) -> Self {
        self.state.write().config_failure = Some(message.to_string());
        self
    }

    /// Remove every grant matching `token` and `action` exactly
    pub fn revoke(&self, token: &str, action: &ActionDescriptor) {
        self.state
            .write()
            .grants
            .retain(|(t, granted)| !(t == token && granted == action));
    }

    /// Remove every namespace from the listing
    pub fn clear_namespaces(&self) {
        self.state.write().namespaces.clear();
    }

    /// Calls made so far
    #[must_use]
    pub fn calls(&self) -> Vec<ClusterCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: ClusterCall) {
        self.calls.lock().push(call);
    }

    fn knows(&self, token: &str) -> bool {
        self.state.read().tokens.contains(token)
    }
}

fn grant_covers(granted: &ActionDescriptor, asked: &ActionDescriptor) -> bool {
    granted.namespace == asked.namespace
        && granted.verb == asked.verb
        && granted.group == asked.group
        && granted.resource == asked.resource
        && (granted.resource_name.is_empty() || granted.resource_name == asked.resource_name)
}

impl ClusterConnector for InMemoryCluster {
    fn connect(&self, credential: &Credential) -> Result<Box<dyn ClusterClient>, ClusterError> {
        Ok(Box::new(InMemoryClient {
            cluster: self.clone(),
            token: credential.expose().to_string(),
        }))
    }
}

#[async_trait]
impl RbacAuthority for InMemoryCluster {
    async fn is_authorized(
        &self,
        identity: &Identity,
        action: &ActionDescriptor,
    ) -> Result<bool, ClusterError> {
        self.record(ClusterCall::IsAuthorized(action.clone()));
        let state = self.state.read();
        if let Some(ref message) = state.rbac_failure {
            return Err(ClusterError::Other(message.clone()));
        }
        let token = identity.credential().expose();
        Ok(state
            .grants
            .iter()
            .any(|(t, granted)| t == token && grant_covers(granted, action)))
    }
}

/// Per-credential view of an [`InMemoryCluster`].
struct InMemoryClient {
    cluster: InMemoryCluster,
    token: String,
}

#[async_trait]
impl ClusterClient for InMemoryClient {
    async fn list_onboarded_namespaces(&self) -> Result<Vec<NamespaceDescriptor>, ClusterError> {
        self.cluster.record(ClusterCall::ListNamespaces);
        if !self.cluster.knows(&self.token) {
            return Err(ClusterError::Unauthorized);
        }
        let state = self.cluster.state.read();
        if let Some(ref message) = state.namespace_failure {
            return Err(ClusterError::Other(message.clone()));
        }
        Ok(state.namespaces.clone())
    }

    async fn system_config(&self) -> Result<SystemConfig, ClusterError> {
        self.cluster.record(ClusterCall::SystemConfig);
        let state = self.cluster.state.read();
        if let Some(ref message) = state.config_failure {
            return Err(ClusterError::Other(message.clone()));
        }
        Ok(SystemConfig::new(state.system_config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(cluster: &InMemoryCluster, token: &str) -> Identity {
        let credential = Credential::new(token);
        let client = cluster.connect(&credential).unwrap();
        Identity::new(credential, client)
    }

    #[test]
    fn empty_resource_name_grant_covers_any_instance() {
        let any_pod = ActionDescriptor::new("team-a", "get", "", "pods", "");
        let one_pod = ActionDescriptor::new("team-a", "get", "", "pods", "web-0");
        assert!(grant_covers(&any_pod, &one_pod));
        assert!(grant_covers(&any_pod, &any_pod));
        assert!(!grant_covers(&one_pod, &any_pod));
    }

    #[test]
    fn grants_do_not_cross_namespaces() {
        let team_a = ActionDescriptor::new("team-a", "get", "", "pods", "");
        let team_b = ActionDescriptor::new("team-b", "get", "", "pods", "");
        assert!(!grant_covers(&team_a, &team_b));
    }

    #[tokio::test]
    async fn unknown_token_cannot_list_namespaces() {
        let cluster = InMemoryCluster::new().with_namespace("team-a", true);
        let id = identity(&cluster, "stranger");
        let err = id.client().list_onboarded_namespaces().await.unwrap_err();
        assert!(matches!(err, ClusterError::Unauthorized));
    }

    #[tokio::test]
    async fn revoke_takes_effect_immediately() {
        let probe = ActionDescriptor::namespace_probe("team-a");
        let cluster = InMemoryCluster::new()
            .with_token("tok")
            .grant("tok", probe.clone());
        let id = identity(&cluster, "tok");

        assert!(cluster.is_authorized(&id, &probe).await.unwrap());
        cluster.revoke("tok", &probe);
        assert!(!cluster.is_authorized(&id, &probe).await.unwrap());
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let cluster = InMemoryCluster::new().with_token("tok");
        let id = identity(&cluster, "tok");
        let probe = ActionDescriptor::namespace_probe("team-a");

        id.client().list_onboarded_namespaces().await.unwrap();
        cluster.is_authorized(&id, &probe).await.unwrap();
        id.client().system_config().await.unwrap();

        assert_eq!(
            cluster.calls(),
            vec![
                ClusterCall::ListNamespaces,
                ClusterCall::IsAuthorized(probe),
                ClusterCall::SystemConfig,
            ]
        );
    }
}
