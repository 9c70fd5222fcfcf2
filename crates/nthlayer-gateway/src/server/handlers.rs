//! HTTP handlers for the gateway server.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use nthlayer_core::domain::WebhookOutcome;
use nthlayer_core::error::WebhookError;
use nthlayer_core::repository::InsertOutcome;
use nthlayer_core::webhook::WebhookHeaders;

use super::AppState;

/// Deadline for handling one delivery end to end.
const WEBHOOK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    debug!("[Gateway] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Webhook handling response body.
#[derive(Serialize)]
struct WebhookResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

fn reply(code: StatusCode, status: &'static str, detail: Option<String>) -> Response {
    (code, Json(WebhookResponse { status, detail })).into_response()
}

/// `POST /webhooks/deployments/{provider}`
///
/// Dispatches to the provider registered under the path segment, verifies
/// the delivery, and persists events idempotently.
pub async fn deployment_webhook(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Backpressure: shed load once the concurrency cap is reached.
    let Ok(_permit) = state.capacity.try_acquire() else {
        warn!("[Gateway] webhook capacity exhausted, shedding delivery");
        return reply(StatusCode::SERVICE_UNAVAILABLE, "overloaded", None);
    };

    let Some(provider) = state.registry.get(&provider_name) else {
        return reply(
            StatusCode::NOT_FOUND,
            "unknown_provider",
            Some(provider_name),
        );
    };

    let normalized = normalize_headers(&headers);

    if let Err(error) = provider.verify(&normalized, &body) {
        warn!(
            "[Gateway] {} webhook verification failed: {}",
            provider_name, error
        );
        return reply(StatusCode::UNAUTHORIZED, "signature_invalid", None);
    }

    let outcome = match provider.parse(&normalized, &body) {
        Ok(outcome) => outcome,
        Err(WebhookError::Malformed(detail)) => {
            warn!("[Gateway] {} webhook malformed: {}", provider_name, detail);
            return reply(StatusCode::BAD_REQUEST, "malformed", Some(detail));
        }
        Err(error) => {
            error!("[Gateway] {} webhook parse error: {}", provider_name, error);
            return reply(StatusCode::BAD_REQUEST, "malformed", Some(error.to_string()));
        }
    };

    match outcome {
        WebhookOutcome::Ignored(reason) => {
            debug!("[Gateway] {} webhook ignored: {}", provider_name, reason);
            reply(StatusCode::OK, "ignored", Some(reason))
        }
        WebhookOutcome::Event(event) => {
            let persisted =
                tokio::time::timeout(WEBHOOK_TIMEOUT, state.events.insert(&event)).await;
            match persisted {
                Ok(Ok(InsertOutcome::Inserted)) => {
                    info!(
                        "[Gateway] persisted deployment {}@{} from {}",
                        event.service, event.commit_sha, provider_name
                    );
                    reply(StatusCode::OK, "persisted", None)
                }
                Ok(Ok(InsertOutcome::Duplicate)) => {
                    debug!(
                        "[Gateway] duplicate deployment event {} from {}",
                        event.external_event_id, provider_name
                    );
                    reply(StatusCode::OK, "duplicate", None)
                }
                Ok(Err(error)) => {
                    error!("[Gateway] failed to persist deployment event: {}", error);
                    reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "persistence_failed",
                        None,
                    )
                }
                Err(_) => {
                    error!("[Gateway] deployment event persistence timed out");
                    reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "persistence_timeout",
                        None,
                    )
                }
            }
        }
    }
}

/// Lowercase header names into the provider-facing map.
fn normalize_headers(headers: &HeaderMap) -> WebhookHeaders {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::server::{GatewayConfig, GatewayServer};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{DateTime, Utc};
    use http_body_util::BodyExt;
    use nthlayer_core::domain::DeploymentEvent;
    use nthlayer_core::repository::{DeploymentEventRepository, RepoResult};
    use nthlayer_providers::webhook::GithubWebhookProvider;
    use nthlayer_providers::WebhookRegistry;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// In-memory event store keyed on the idempotency pair.
    struct MemoryEvents {
        rows: Mutex<BTreeMap<(String, String), DeploymentEvent>>,
    }

    impl MemoryEvents {
        fn new() -> Self {
            Self {
                rows: Mutex::new(BTreeMap::new()),
            }
        }
    }

    #[async_trait]
    impl DeploymentEventRepository for MemoryEvents {
        async fn insert(&self, event: &DeploymentEvent) -> RepoResult<InsertOutcome> {
            let key = (event.provider.clone(), event.external_event_id.clone());
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&key) {
                Ok(InsertOutcome::Duplicate)
            } else {
                rows.insert(key, event.clone());
                Ok(InsertOutcome::Inserted)
            }
        }

        async fn get(
            &self,
            provider: &str,
            external_event_id: &str,
        ) -> RepoResult<Option<DeploymentEvent>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .get(&(provider.to_string(), external_event_id.to_string()))
                .cloned())
        }

        async fn list_for_service(
            &self,
            _service: &str,
            _since: DateTime<Utc>,
            _until: DateTime<Utc>,
        ) -> RepoResult<Vec<DeploymentEvent>> {
            Ok(Vec::new())
        }

        async fn list_recent(&self, _limit: usize) -> RepoResult<Vec<DeploymentEvent>> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }

        async fn prune_before(&self, _cutoff: DateTime<Utc>) -> RepoResult<usize> {
            Ok(0)
        }
    }

    fn server(events: Arc<MemoryEvents>) -> GatewayServer {
        let mut registry = WebhookRegistry::new();
        registry.register(Arc::new(GithubWebhookProvider::new("topsecret".to_string())));
        GatewayServer::new(GatewayConfig::default(), registry, events)
    }

    fn github_body() -> Vec<u8> {
        serde_json::json!({
            "deployment_status": {
                "id": 42,
                "state": "success",
                "environment": "production",
                "created_at": "2025-06-01T12:00:00Z"
            },
            "deployment": {"sha": "abc123"},
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
                GithubWebhookProvider::sign("topsecret", body),
            )
            .body(Body::from(body.to_vec()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_signed_delivery_is_persisted() {
        let events = Arc::new(MemoryEvents::new());
        let router = server(events.clone()).router();

        let response = router.oneshot(signed_request(&github_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "persisted");
        assert!(events.get("github", "42").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_redelivery_reports_duplicate_with_one_row() {
        let events = Arc::new(MemoryEvents::new());
        let gateway = server(events.clone());

        let first = gateway
            .router()
            .oneshot(signed_request(&github_body()))
            .await
            .unwrap();
        assert_eq!(body_json(first).await["status"], "persisted");

        let second = gateway
            .router()
            .oneshot(signed_request(&github_body()))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_json(second).await["status"], "duplicate");
        assert_eq!(events.list_recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_signature_is_401() {
        let router = server(Arc::new(MemoryEvents::new())).router();
        let body = github_body();
        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/deployments/github")
            .header("x-github-event", "deployment_status")
            .header("x-hub-signature-256", "sha256=deadbeef")
            .body(Body::from(body))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let router = server(Arc::new(MemoryEvents::new())).router();
        let body = b"not json".to_vec();
        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/deployments/github")
            .header("x-github-event", "deployment_status")
            .header(
                "x-hub-signature-256",
                GithubWebhookProvider::sign("topsecret", &body),
            )
            .body(Body::from(body))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_404() {
        let router = server(Arc::new(MemoryEvents::new())).router();
        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/deployments/jenkins")
            .body(Body::from("{}"))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_success_state_is_ignored_with_200() {
        let router = server(Arc::new(MemoryEvents::new())).router();
        let body = serde_json::json!({
            "deployment_status": {"id": 43, "state": "failure", "created_at": "2025-06-01T12:00:00Z"},
            "deployment": {"sha": "abc123"},
            "repository": {"name": "checkout"}
        })
        .to_string()
        .into_bytes();
        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/deployments/github")
            .header("x-github-event", "deployment_status")
            .header(
                "x-hub-signature-256",
                GithubWebhookProvider::sign("topsecret", &body),
            )
            .body(Body::from(body))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ignored");
    }

    #[tokio::test]
    async fn test_capacity_exhaustion_sheds_with_503() {
        let events: Arc<MemoryEvents> = Arc::new(MemoryEvents::new());
        let mut registry = WebhookRegistry::new();
        registry.register(Arc::new(GithubWebhookProvider::new("topsecret".to_string())));
        let config = GatewayConfig {
            max_concurrent_webhooks: 1,
            ..Default::default()
        };
        let gateway = GatewayServer::new(config, registry, events);

        // Hold the only permit, then deliver.
        let state_permit = gateway.state_for_tests().capacity.clone();
        let _held = state_permit.try_acquire().unwrap();

        let response = gateway
            .router()
            .oneshot(signed_request(&github_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
