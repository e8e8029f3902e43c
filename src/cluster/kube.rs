//! Kubernetes API collaborators.
//!
//! | Question | API call |
//! |----------|----------|
//! | onboarded namespaces | `GET api/v1/namespaces?labelSelector=<label>=true` |
//! | system configuration | `GET api/v1/namespaces/{ns}/configmaps/{name}` |
//! | may the caller do X | `POST apis/authorization.k8s.io/v1/selfsubjectaccessreviews` |
//!
//! Every call is made with the caller's own bearer credential, so the API
//! server's authentication and RBAC apply to the caller and not to the gate.
//! The API server answers `401` for credentials it does not recognize; that
//! is reported as [`ClusterError::Unauthorized`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{
    ClusterClient, ClusterConnector, ClusterError, NamespaceDescriptor, RbacAuthority,
    SystemConfig,
};
use crate::config::ClusterConfig;
use crate::gate::{ActionDescriptor, Credential, Identity};
use crate::{Error, Result};

/// Connection to a Kubernetes API server.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct KubeCluster {
    http: reqwest::Client,
    api_server: Url,
    settings: Arc<KubeSettings>,
}

struct KubeSettings {
    onboarded_label: String,
    system_namespace: String,
    system_config_name: String,
}

impl KubeCluster {
    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API server URL is invalid or the CA bundle
    /// cannot be read.
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        let mut api_server = Url::parse(&config.api_server)
            .map_err(|e| Error::Config(format!("Invalid cluster.api_server: {e}")))?;
        // Relative joins below must keep any path prefix on the server URL
        if !api_server.path().ends_with('/') {
            let path = format!("{}/", api_server.path());
            api_server.set_path(&path);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(ref ca_file) = config.ca_file {
            let pem = std::fs::read(ca_file)?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| Error::Config(format!("Invalid CA bundle {ca_file}: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if config.accept_invalid_certs {
            tracing::warn!("TLS certificate verification disabled for the cluster API");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_server,
            settings: Arc::new(KubeSettings {
                onboarded_label: config.onboarded_label.clone(),
                system_namespace: config.system_namespace.clone(),
                system_config_name: config.system_config_name.clone(),
            }),
        })
    }

    /// The API server base URL
    #[must_use]
    pub fn api_server(&self) -> &Url {
        &self.api_server
    }

    fn url(&self, path: &str) -> std::result::Result<Url, ClusterError> {
        Ok(self.api_server.join(path)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        token: &Credential,
        url: Url,
    ) -> std::result::Result<T, ClusterError> {
        debug!(url = %url, "GET");
        let response = self
            .http
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await?;
        decode(response).await
    }
}

/// Turn an API server response into `T` or a [`ClusterError`].
async fn decode<T: DeserializeOwned>(response: Response) -> std::result::Result<T, ClusterError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClusterError::Unauthorized);
    }
    let body = response.bytes().await?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ApiStatus>(&body).map_or_else(
            |_| String::from_utf8_lossy(&body).into_owned(),
            |s| s.message,
        );
        return Err(ClusterError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(serde_json::from_slice(&body)?)
}

impl ClusterConnector for KubeCluster {
    fn connect(
        &self,
        credential: &Credential,
    ) -> std::result::Result<Box<dyn ClusterClient>, ClusterError> {
        Ok(Box::new(KubeClient {
            cluster: self.clone(),
            credential: credential.clone(),
        }))
    }
}

#[async_trait]
impl RbacAuthority for KubeCluster {
    async fn is_authorized(
        &self,
        identity: &Identity,
        action: &ActionDescriptor,
    ) -> std::result::Result<bool, ClusterError> {
        let url = self.url("apis/authorization.k8s.io/v1/selfsubjectaccessreviews")?;
        let review = SelfSubjectAccessReview::for_action(action);
        debug!(
            namespace = %action.namespace,
            verb = %action.verb,
            group = %action.group,
            resource = %action.resource,
            name = %action.resource_name,
            "Submitting access review"
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(identity.credential().expose())
            .json(&review)
            .send()
            .await?;
        let answered: AccessReviewResponse = decode(response).await?;
        if !answered.status.allowed && !answered.status.reason.is_empty() {
            debug!(reason = %answered.status.reason, "Access review denied");
        }
        Ok(answered.status.allowed)
    }
}

/// A [`KubeCluster`] bound to one credential.
struct KubeClient {
    cluster: KubeCluster,
    credential: Credential,
}

#[async_trait]
impl ClusterClient for KubeClient {
    async fn list_onboarded_namespaces(
        &self,
    ) -> std::result::Result<Vec<NamespaceDescriptor>, ClusterError> {
        let label = &self.cluster.settings.onboarded_label;
        let mut url = self.cluster.url("api/v1/namespaces")?;
        url.query_pairs_mut()
            .append_pair("labelSelector", &format!("{label}=true"));

        let list: NamespaceList = self.cluster.get(&self.credential, url).await?;
        Ok(list
            .items
            .into_iter()
            .map(|ns| NamespaceDescriptor {
                onboarded: ns.metadata.labels.get(label).is_some_and(|v| v == "true"),
                name: ns.metadata.name,
            })
            .collect())
    }

    async fn system_config(&self) -> std::result::Result<SystemConfig, ClusterError> {
        let settings = &self.cluster.settings;
        let url = self.cluster.url(&format!(
            "api/v1/namespaces/{}/configmaps/{}",
            settings.system_namespace, settings.system_config_name
        ))?;
        let config_map: ConfigMap = self.cluster.get(&self.credential, url).await?;
        Ok(SystemConfig::new(config_map.data))
    }
}

// ── API objects ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct NamespaceList {
    #[serde(default)]
    items: Vec<Namespace>,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ConfigMap {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelfSubjectAccessReview<'a> {
    api_version: &'static str,
    kind: &'static str,
    spec: AccessReviewSpec<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessReviewSpec<'a> {
    resource_attributes: ResourceAttributes<'a>,
}

#[derive(Debug, Serialize)]
struct ResourceAttributes<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
    verb: &'a str,
    group: &'a str,
    resource: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
}

impl<'a> SelfSubjectAccessReview<'a> {
    fn for_action(action: &'a ActionDescriptor) -> Self {
        Self {
            api_version: "authorization.k8s.io/v1",
            kind: "SelfSubjectAccessReview",
            spec: AccessReviewSpec {
                resource_attributes: ResourceAttributes {
                    namespace: &action.namespace,
                    verb: &action.verb,
                    group: &action.group,
                    resource: &action.resource,
                    name: &action.resource_name,
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessReviewResponse {
    #[serde(default)]
    status: AccessReviewStatus,
}

#[derive(Debug, Default, Deserialize)]
struct AccessReviewStatus {
    #[serde(default)]
    allowed: bool,
    #[serde(default)]
    reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(api_server: &str) -> ClusterConfig {
        ClusterConfig {
            api_server: api_server.to_string(),
            ..ClusterConfig::default()
        }
    }

    #[test]
    fn access_review_body_matches_api_shape() {
        let probe = ActionDescriptor::namespace_probe("team-a");
        let body = serde_json::to_value(SelfSubjectAccessReview::for_action(&probe)).unwrap();
        assert_eq!(
            body,
            json!({
                "apiVersion": "authorization.k8s.io/v1",
                "kind": "SelfSubjectAccessReview",
                "spec": {
                    "resourceAttributes": {
                        "verb": "get",
                        "group": "",
                        "resource": "namespaces",
                        "name": "team-a"
                    }
                }
            })
        );
    }

    #[test]
    fn namespaced_review_includes_namespace() {
        let action = ActionDescriptor::new("team-a", "list", "apps", "deployments", "");
        let body = serde_json::to_value(SelfSubjectAccessReview::for_action(&action)).unwrap();
        let attrs = &body["spec"]["resourceAttributes"];
        assert_eq!(attrs["namespace"], "team-a");
        assert_eq!(attrs["group"], "apps");
        assert!(attrs.get("name").is_none());
    }

    #[test]
    fn api_server_path_prefix_is_kept() {
        let cluster = KubeCluster::from_config(&config("http://proxy.local/k8s")).unwrap();
        assert_eq!(cluster.api_server().as_str(), "http://proxy.local/k8s/");
        let url = cluster.url("api/v1/namespaces").unwrap();
        assert_eq!(url.as_str(), "http://proxy.local/k8s/api/v1/namespaces");
    }

    #[test]
    fn rejects_invalid_api_server() {
        let err = KubeCluster::from_config(&config("not a url")).err().unwrap();
        assert!(err.to_string().contains("cluster.api_server"));
    }

    #[test]
    fn missing_ca_file_is_an_error() {
        let cfg = ClusterConfig {
            ca_file: Some("/nonexistent/ca.crt".to_string()),
            ..config("https://kubernetes.default.svc")
        };
        assert!(KubeCluster::from_config(&cfg).is_err());
    }
}
