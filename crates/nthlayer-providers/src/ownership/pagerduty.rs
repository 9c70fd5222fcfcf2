//! PagerDuty escalation policies as incident-ownership signals.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use nthlayer_core::config::ProviderConfig;
use nthlayer_core::domain::{OwnershipSignal, OwnershipSource};
use nthlayer_core::error::ProviderError;
use nthlayer_core::ownership::OwnershipProvider;

use crate::http::{build_client, get_json};

#[derive(Debug, Deserialize)]
struct ServicesResponse {
    services: Vec<PdService>,
}

#[derive(Debug, Deserialize)]
struct PdService {
    name: String,
    #[serde(default)]
    escalation_policy: Option<EscalationPolicy>,
    #[serde(default)]
    teams: Vec<Team>,
}

#[derive(Debug, Deserialize)]
struct EscalationPolicy {
    id: String,
    summary: String,
}

#[derive(Debug, Deserialize)]
struct Team {
    summary: String,
}

/// Who gets paged owns the service.
pub struct PagerDutyOwnership {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl PagerDutyOwnership {
    /// Build from provider configuration (`url` for test overrides, `token`).
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.pagerduty.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            token: config.token.clone().unwrap_or_default(),
            client: build_client(Duration::from_secs(5)),
        }
    }
}

#[async_trait]
impl OwnershipProvider for PagerDutyOwnership {
    fn name(&self) -> &str {
        "pagerduty"
    }

    async fn signal(
        &self,
        service: &str,
        _repository: Option<&str>,
    ) -> Result<Option<OwnershipSignal>, ProviderError> {
        let url = format!("{}/services?query={}", self.base_url, service);
        let auth = format!("Token token={}", self.token);
        let response: ServicesResponse = get_json(
            &self.client,
            self.name(),
            &url,
            &[("Authorization", auth.as_str())],
        )
        .await?;

        // Exact name match first, else the best search hit.
        let matched = response
            .services
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(service))
            .or_else(|| response.services.first());
        let Some(matched) = matched else {
            return Ok(None);
        };

        let owner = matched
            .teams
            .first()
            .map(|team| team.summary.clone())
            .or_else(|| matched.escalation_policy.as_ref().map(|p| p.summary.clone()));
        let Some(owner) = owner else {
            return Ok(None);
        };

        let mut signal = OwnershipSignal::team(OwnershipSource::IncidentEscalation, owner, 0.9);
        if let Some(policy) = &matched.escalation_policy {
            signal = signal.with_metadata("escalation", policy.id.clone());
        }
        Ok(Some(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_escalation_policy_becomes_signal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "services": [{
                    "name": "checkout",
                    "escalation_policy": {"id": "PABC123", "summary": "Payments Escalation"},
                    "teams": [{"summary": "payments"}]
                }]
            })))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            url: Some(server.uri()),
            token: Some("secret".to_string()),
            ..Default::default()
        };
        let signal = PagerDutyOwnership::new(&config)
            .signal("checkout", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.owner, "payments");
        assert_eq!(signal.source, OwnershipSource::IncidentEscalation);
        assert_eq!(
            signal.metadata.get("escalation").map(String::as_str),
            Some("PABC123")
        );
    }

    #[tokio::test]
    async fn test_no_match_yields_no_signal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"services": []})),
            )
            .mount(&server)
            .await;

        let config = ProviderConfig {
            url: Some(server.uri()),
            ..Default::default()
        };
        let signal = PagerDutyOwnership::new(&config)
            .signal("checkout", None)
            .await
            .unwrap();
        assert!(signal.is_none());
    }
}
