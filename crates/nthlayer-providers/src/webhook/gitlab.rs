//! GitLab deployment hooks.
//!
//! GitLab authenticates with a shared token header rather than a body
//! signature; the comparison is constant-time. Only `success` deployments
//! become events.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use nthlayer_core::domain::{DeploymentEvent, WebhookOutcome};
use nthlayer_core::error::WebhookError;
use nthlayer_core::webhook::{WebhookHeaders, WebhookProvider};

#[derive(Debug, Deserialize)]
struct Payload {
    object_kind: String,
    status: String,
    deployment_id: u64,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    short_sha: Option<String>,
    #[serde(default)]
    commit_url: Option<String>,
    #[serde(default)]
    status_changed_at: Option<String>,
    #[serde(default)]
    user: Option<User>,
    project: Project,
}

#[derive(Debug, Deserialize)]
struct User {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Project {
    name: String,
}

/// Webhook adapter for GitLab deployments.
pub struct GitlabWebhookProvider {
    token: String,
}

impl GitlabWebhookProvider {
    /// Create a provider verifying against the given shared token.
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

impl WebhookProvider for GitlabWebhookProvider {
    fn name(&self) -> &str {
        "gitlab"
    }

    fn verify(&self, headers: &WebhookHeaders, _body: &[u8]) -> Result<(), WebhookError> {
        if self.token.is_empty() {
            return Err(WebhookError::SignatureInvalid);
        }
        let presented = headers
            .get("x-gitlab-token")
            .ok_or(WebhookError::SignatureInvalid)?;
        let matches: bool = presented
            .as_bytes()
            .ct_eq(self.token.as_bytes())
            .into();
        if matches {
            Ok(())
        } else {
            Err(WebhookError::SignatureInvalid)
        }
    }

    fn parse(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        let event_kind = headers
            .get("x-gitlab-event")
            .map(String::as_str)
            .unwrap_or_default();
        if event_kind != "Deployment Hook" {
            return Ok(WebhookOutcome::Ignored(format!(
                "event {event_kind:?} is not a deployment hook"
            )));
        }

        let payload: Payload = serde_json::from_slice(body)
            .map_err(|e| WebhookError::Malformed(e.to_string()))?;

        if payload.object_kind != "deployment" {
            return Ok(WebhookOutcome::Ignored(format!(
                "object kind {:?}",
                payload.object_kind
            )));
        }
        if payload.status != "success" {
            return Ok(WebhookOutcome::Ignored(format!(
                "deployment status {:?}",
                payload.status
            )));
        }

        let finished_at = payload
            .status_changed_at
            .as_deref()
            .and_then(parse_gitlab_timestamp)
            .unwrap_or_else(Utc::now);
        let commit = payload
            .short_sha
            .or_else(|| {
                payload
                    .commit_url
                    .as_deref()
                    .and_then(|url| url.rsplit('/').next().map(str::to_string))
            })
            .unwrap_or_default();

        let mut event = DeploymentEvent::new(
            self.name(),
            payload.deployment_id.to_string(),
            payload.project.name,
            payload
                .environment
                .unwrap_or_else(|| "production".to_string()),
            commit,
            finished_at,
            String::from_utf8_lossy(body).into_owned(),
        );
        if let Some(user) = payload.user {
            event = event.with_author(user.username);
        }

        Ok(WebhookOutcome::Event(Box::new(event)))
    }
}

/// GitLab sends `2025-06-01 12:00:00 +0000`; fall back to RFC 3339.
fn parse_gitlab_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
