//! Authorization questions and their answers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One authorization question: may the caller perform `verb` on `resource`?
///
/// An empty `namespace` denotes a cluster-scoped check. An empty
/// `resource_name` denotes any instance of the resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    /// Target namespace (empty = cluster scope)
    #[serde(default)]
    pub namespace: String,
    /// Verb, e.g. `get`, `list`, `create`
    pub verb: String,
    /// API group (empty = core group)
    #[serde(default)]
    pub group: String,
    /// Resource type, e.g. `pods`
    pub resource: String,
    /// Specific object name (empty = any)
    #[serde(default)]
    pub resource_name: String,
}

impl ActionDescriptor {
    /// Create a descriptor from its five parts
    pub fn new(
        namespace: impl Into<String>,
        verb: impl Into<String>,
        group: impl Into<String>,
        resource: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            verb: verb.into(),
            group: group.into(),
            resource: resource.into(),
            resource_name: resource_name.into(),
        }
    }

    /// The cluster-scoped "get namespace" probe used to validate credentials
    #[must_use]
    pub fn namespace_probe(namespace_name: &str) -> Self {
        Self::new("", "get", "", "namespaces", namespace_name)
    }

    /// Whether this is a cluster-scoped check
    #[must_use]
    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Namespace: {}, Verb: {}, Group: \"{}\", Resource: {}, ResourceName: \"{}\"",
            self.namespace, self.verb, self.group, self.resource, self.resource_name
        )
    }
}

/// Answer to an authorization question.
///
/// The public gate operations only ever return an allowed verdict; a refusal
/// is reported as an error so that "not allowed" always carries a cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the action is permitted
    pub allowed: bool,
}

impl Verdict {
    /// An allowed verdict
    #[must_use]
    pub fn allow() -> Self {
        Self { allowed: true }
    }

    /// A denied verdict
    #[must_use]
    pub fn deny() -> Self {
        Self { allowed: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_is_cluster_scoped_get_on_namespaces() {
        let probe = ActionDescriptor::namespace_probe("team-a");
        assert!(probe.is_cluster_scoped());
        assert_eq!(probe.verb, "get");
        assert_eq!(probe.group, "");
        assert_eq!(probe.resource, "namespaces");
        assert_eq!(probe.resource_name, "team-a");
    }

    #[test]
    fn deserializes_with_optional_fields_missing() {
        let action: ActionDescriptor =
            serde_json::from_str(r#"{"namespace":"team-a","verb":"list","resource":"pods"}"#)
                .unwrap();
        assert_eq!(action, ActionDescriptor::new("team-a", "list", "", "pods", ""));
    }

    #[test]
    fn deserializes_camel_case_resource_name() {
        let action: ActionDescriptor = serde_json::from_str(
            r#"{"verb":"get","group":"apps","resource":"deployments","resourceName":"web"}"#,
        )
        .unwrap();
        assert!(action.is_cluster_scoped());
        assert_eq!(action.group, "apps");
        assert_eq!(action.resource_name, "web");
    }
}
