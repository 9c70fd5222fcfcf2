//! Normalized deployment events produced from provider webhooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deployment, normalized across providers and persisted for correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    /// Row id.
    pub id: Uuid,
    /// Webhook provider that delivered the event.
    pub provider: String,
    /// Provider-side event id. `(provider, external_event_id)` is unique.
    pub external_event_id: String,
    /// Service name as reported by the provider (raw, pre-resolution).
    pub service: String,
    /// Target environment, e.g. "production".
    pub environment: String,
    /// Deployed commit SHA.
    pub commit_sha: String,
    /// Author or actor, when reported.
    pub author: Option<String>,
    /// Deployment start, when reported.
    pub started_at: Option<DateTime<Utc>>,
    /// Deployment completion.
    pub finished_at: DateTime<Utc>,
    /// Raw provider payload for audit (stored as-is).
    pub raw_payload: String,
}

impl DeploymentEvent {
    /// Create an event with a fresh row id.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: impl Into<String>,
        external_event_id: impl Into<String>,
        service: impl Into<String>,
        environment: impl Into<String>,
        commit_sha: impl Into<String>,
        finished_at: DateTime<Utc>,
        raw_payload: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            external_event_id: external_event_id.into(),
            service: service.into(),
            environment: environment.into(),
            commit_sha: commit_sha.into(),
            author: None,
            started_at: None,
            finished_at,
            raw_payload: raw_payload.into(),
        }
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the start timestamp.
    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }
}

/// What parsing a webhook delivery produced.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// A deployment of interest; persist it.
    Event(Box<DeploymentEvent>),
    /// Valid delivery we deliberately skip (wrong action, non-success state).
    Ignored(String),
}
