//! Kubernetes collaborators against a stub API server
//!
//! The stub understands three tokens:
//! - `good`: sees team-a, may probe it and read its pods
//! - `limited`: sees team-a but every access review is denied
//! - anything else: 401

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clustergate::ErrorCode;
use clustergate::cluster::{
    ClusterClient, ClusterConnector, ClusterError, KubeCluster, RbacAuthority,
};
use clustergate::config::ClusterConfig;
use clustergate::gate::{ActionDescriptor, AuthGate, Credential, Identity, RequestContext};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpListener;

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "kind": "Status", "message": "Unauthorized", "code": 401 })),
    )
        .into_response()
}

async fn namespaces(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    match bearer(&headers) {
        Some("good" | "limited") => {}
        _ => return unauthorized(),
    }
    if query.get("labelSelector").map(String::as_str) != Some("clustergate.io/enabled=true") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "kind": "Status", "message": "unexpected selector" })),
        )
            .into_response();
    }
    Json(json!({
        "kind": "NamespaceList",
        "items": [
            { "metadata": { "name": "team-a", "labels": { "clustergate.io/enabled": "true" } } },
            { "metadata": { "name": "team-b", "labels": { "clustergate.io/enabled": "false" } } }
        ]
    }))
    .into_response()
}

async fn config_map(headers: HeaderMap, Path((ns, name)): Path<(String, String)>) -> Response {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    if ns != "clustergate" || name != "clustergate" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "kind": "Status", "message": format!("configmaps \"{name}\" not found") })),
        )
            .into_response();
    }
    Json(json!({ "kind": "ConfigMap", "data": { "DOMAIN": "example.com" } })).into_response()
}

async fn access_review(headers: HeaderMap, Json(review): Json<Value>) -> Response {
    let token = match bearer(&headers) {
        Some(token @ ("good" | "limited")) => token,
        _ => return unauthorized(),
    };
    let attrs = &review["spec"]["resourceAttributes"];
    let probe = attrs["resource"] == "namespaces" && attrs["name"] == "team-a";
    let pods = attrs["resource"] == "pods" && attrs["namespace"] == "team-a";
    let allowed = token == "good" && (probe || pods);
    Json(json!({
        "kind": "SelfSubjectAccessReview",
        "status": { "allowed": allowed, "reason": if allowed { "" } else { "no RBAC policy matched" } }
    }))
    .into_response()
}

async fn spawn_api_server() -> String {
    let app = Router::new()
        .route("/api/v1/namespaces", get(namespaces))
        .route("/api/v1/namespaces/{ns}/configmaps/{name}", get(config_map))
        .route(
            "/apis/authorization.k8s.io/v1/selfsubjectaccessreviews",
            post(access_review),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn cluster() -> KubeCluster {
    let config = ClusterConfig {
        api_server: spawn_api_server().await,
        ..ClusterConfig::default()
    };
    KubeCluster::from_config(&config).unwrap()
}

fn identity(cluster: &KubeCluster, token: &str) -> Identity {
    let credential = Credential::new(token);
    let client = cluster.connect(&credential).unwrap();
    Identity::new(credential, client)
}

#[tokio::test]
async fn test_lists_onboarded_namespaces() {
    let cluster = cluster().await;
    let listed = identity(&cluster, "good")
        .client()
        .list_onboarded_namespaces()
        .await
        .unwrap();

    let names: Vec<(&str, bool)> = listed
        .iter()
        .map(|ns| (ns.name.as_str(), ns.onboarded))
        .collect();
    assert_eq!(names, vec![("team-a", true), ("team-b", false)]);
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let cluster = cluster().await;
    let err = identity(&cluster, "stranger")
        .client()
        .list_onboarded_namespaces()
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::Unauthorized), "{err:?}");
}

#[tokio::test]
async fn test_reads_system_config() {
    let cluster = cluster().await;
    let config = identity(&cluster, "good")
        .client()
        .system_config()
        .await
        .unwrap();
    assert_eq!(config.get("DOMAIN"), Some("example.com"));
}

#[tokio::test]
async fn test_missing_config_map_keeps_api_message() {
    let config = ClusterConfig {
        api_server: spawn_api_server().await,
        system_config_name: "absent".to_string(),
        ..ClusterConfig::default()
    };
    let cluster = KubeCluster::from_config(&config).unwrap();
    let err = identity(&cluster, "good")
        .client()
        .system_config()
        .await
        .unwrap_err();
    match err {
        ClusterError::Status { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("absent"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_access_review_answers() {
    let cluster = cluster().await;
    let good = identity(&cluster, "good");
    let limited = identity(&cluster, "limited");
    let probe = ActionDescriptor::namespace_probe("team-a");

    assert!(cluster.is_authorized(&good, &probe).await.unwrap());
    assert!(!cluster.is_authorized(&limited, &probe).await.unwrap());
    assert!(
        !cluster
            .is_authorized(&good, &ActionDescriptor::namespace_probe("team-b"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_gate_end_to_end() {
    let cluster = cluster().await;
    let gate = AuthGate::new(Arc::new(cluster.clone()), Arc::new(cluster));

    let good = RequestContext::new().with_token("good");
    let info = gate.validate_token(Some(&good)).await.unwrap();
    assert_eq!(info.domain, "example.com");

    let pods = ActionDescriptor::new("team-a", "list", "", "pods", "");
    assert!(gate.authorize_action(Some(&good), &pods).await.unwrap().allowed);

    let secrets = ActionDescriptor::new("team-a", "get", "", "secrets", "db");
    let err = gate.authorize_action(Some(&good), &secrets).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);

    let limited = RequestContext::new().with_token("limited");
    let err = gate.validate_token(Some(&limited)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthenticated);

    let stranger = RequestContext::new().with_token("stranger");
    let err = gate.validate_token(Some(&stranger)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthenticated);
}
