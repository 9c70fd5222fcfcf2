//! GitHub `deployment_status` webhooks.
//!
//! Deliveries are signed with HMAC-SHA256 over the raw body
//! (`X-Hub-Signature-256: sha256=<hex>`); verification is constant-time.
//! Only successful deployment statuses become events, everything else is
//! acknowledged and ignored.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use nthlayer_core::domain::{DeploymentEvent, WebhookOutcome};
use nthlayer_core::error::WebhookError;
use nthlayer_core::webhook::{WebhookHeaders, WebhookProvider};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct Payload {
    deployment_status: Status,
    deployment: Deployment,
    repository: Repository,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: u64,
    state: String,
    #[serde(default)]
    environment: Option<String>,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    sha: String,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    creator: Option<Creator>,
}

#[derive(Debug, Deserialize)]
struct Creator {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
}

/// Webhook adapter for GitHub deployments.
pub struct GithubWebhookProvider {
    secret: String,
}

impl GithubWebhookProvider {
    /// Create a provider verifying against the given shared secret.
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Sign a body the way GitHub does. Used by tests and local tooling.
    pub fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }
}

impl WebhookProvider for GithubWebhookProvider {
    fn name(&self) -> &str {
        "github"
    }

    fn verify(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<(), WebhookError> {
        if self.secret.is_empty() {
            return Err(WebhookError::SignatureInvalid);
        }
        let signature = headers
            .get("x-hub-signature-256")
            .ok_or(WebhookError::SignatureInvalid)?;
        let hex_digest = signature
            .strip_prefix("sha256=")
            .ok_or(WebhookError::SignatureInvalid)?;
        let expected = hex::decode(hex_digest).map_err(|_| WebhookError::SignatureInvalid)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::SignatureInvalid)?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| WebhookError::SignatureInvalid)
    }

    fn parse(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        let event_kind = headers
            .get("x-github-event")
            .map(String::as_str)
            .unwrap_or_default();
        if event_kind != "deployment_status" {
            return Ok(WebhookOutcome::Ignored(format!(
                "event {event_kind:?} is not a deployment status"
            )));
        }

        let payload: Payload = serde_json::from_slice(body)
            .map_err(|e| WebhookError::Malformed(e.to_string()))?;

        if payload.deployment_status.state != "success" {
            return Ok(WebhookOutcome::Ignored(format!(
                "deployment state {:?}",
                payload.deployment_status.state
            )));
        }

        let finished_at = parse_timestamp(&payload.deployment_status.created_at)?;
        let environment = payload
            .deployment_status
            .environment
            .or(payload.deployment.environment)
            .unwrap_or_else(|| "production".to_string());

        let mut event = DeploymentEvent::new(
            self.name(),
            payload.deployment_status.id.to_string(),
            payload.repository.name,
            environment,
            payload.deployment.sha,
            finished_at,
            String::from_utf8_lossy(body).into_owned(),
        );
        if let Some(creator) = payload.deployment.creator {
            event = event.with_author(creator.login);
        }
        if let Some(started) = payload.deployment.created_at {
            if let Ok(at) = parse_timestamp(&started) {
                event = event.with_started_at(at);
            }
        }

        Ok(WebhookOutcome::Event(Box::new(event)))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, WebhookError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| WebhookError::Malformed(format!("bad timestamp {raw:?}")))
}
