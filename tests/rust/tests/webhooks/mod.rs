//! End-to-end webhook ingestion against the real SQLite store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use tokio::sync::Mutex;
use tower::ServiceExt;

use nthlayer_core::repository::DeploymentEventRepository;
use nthlayer_gateway::{GatewayConfig, GatewayServer};
use nthlayer_providers::webhook::GithubWebhookProvider;
use nthlayer_providers::WebhookRegistry;
use nthlayer_storage::{Database, SqliteDeploymentEventRepository};

const SECRET: &str = "integration-secret";

fn gateway() -> (GatewayServer, Arc<SqliteDeploymentEventRepository>) {
    let database = Database::open_in_memory().unwrap();
    let events = Arc::new(SqliteDeploymentEventRepository::new(Arc::new(Mutex::new(
        database,
    ))));

    let mut registry = WebhookRegistry::new();
    registry.register(Arc::new(GithubWebhookProvider::new(SECRET.to_string())));

    let server = GatewayServer::new(GatewayConfig::default(), registry, events.clone());
    (server, events)
}

fn deployment_body() -> Vec<u8> {
    serde_json::json!({
        "action": "created",
        "deployment_status": {
            "id": 90210,
            "state": "success",
            "environment": "production",
            "created_at": "2025-06-01T12:00:00Z"
        },
        "deployment": {
            "sha": "cafe42",
            "environment": "production",
            "creator": {"login": "alice"}
        },
        "repository": {"name": "checkout"}
    })
    .to_string()
    .into_bytes()
}

fn signed_request(body: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/deployments/github")
        .header("x-github-event", "deployment_status")
        .header(
            "x-hub-signature-256",
            GithubWebhookProvider::sign(SECRET, body),
        )
        .body(Body::from(body.to_vec()))
        .unwrap()
}

async fn status_field(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    json["status"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn duplicate_delivery_persists_exactly_one_row() {
    let (server, events) = gateway();
    let body = deployment_body();

    let first = server.router().oneshot(signed_request(&body)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(status_field(first).await, "persisted");

    let second = server.router().oneshot(signed_request(&body)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(status_field(second).await, "duplicate");

    let stored = events.get("github", "90210").await.unwrap().unwrap();
    assert_eq!(stored.service, "checkout");
    assert_eq!(stored.commit_sha, "cafe42");
    assert_eq!(events.list_recent(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn tampered_delivery_is_rejected_and_not_persisted() {
    let (server, events) = gateway();
    let body = deployment_body();
    let mut request = signed_request(&body);
    *request.body_mut() = Body::from({
        let mut tampered = body.clone();
        tampered[0] ^= 0xFF;
        tampered
    });

    let response = server.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(events.list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn ignored_states_return_200_without_rows() {
    let (server, events) = gateway();
    let body = serde_json::json!({
        "deployment_status": {
            "id": 90211,
            "state": "in_progress",
            "created_at": "2025-06-01T12:00:00Z"
        },
        "deployment": {"sha": "cafe42"},
        "repository": {"name": "checkout"}
    })
    .to_string()
    .into_bytes();

    let response = server.router().oneshot(signed_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(status_field(response).await, "ignored");
    assert!(events.list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (server, _) = gateway();
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
