//! Registry metadata tags (`owner=...`) as cloud-tag ownership signals.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use nthlayer_core::config::ProviderConfig;
use nthlayer_core::domain::{OwnershipSignal, OwnershipSource};
use nthlayer_core::error::ProviderError;
use nthlayer_core::ownership::OwnershipProvider;

use crate::http::{build_client, get_json};

#[derive(Debug, Deserialize)]
struct AppsResponse {
    applications: Applications,
}

#[derive(Debug, Deserialize)]
struct Applications {
    #[serde(rename = "application", default)]
    application: Vec<Application>,
}

#[derive(Debug, Deserialize)]
struct Application {
    name: String,
    #[serde(rename = "instance", default)]
    instance: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
struct Instance {
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// Reads `owner` / `team` tags out of registry instance metadata.
pub struct RegistryTagsOwnership {
    base_url: String,
    client: reqwest::Client,
}

impl RegistryTagsOwnership {
    /// Build from provider configuration (`url`).
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:8761".to_string())
                .trim_end_matches('/')
                .to_string(),
            client: build_client(Duration::from_secs(5)),
        }
    }
}

#[async_trait]
impl OwnershipProvider for RegistryTagsOwnership {
    fn name(&self) -> &str {
        "registry-tags"
    }

    async fn signal(
        &self,
        service: &str,
        _repository: Option<&str>,
    ) -> Result<Option<OwnershipSignal>, ProviderError> {
        let url = format!("{}/eureka/apps", self.base_url);
        let response: AppsResponse = get_json(
            &self.client,
            self.name(),
            &url,
            &[("Accept", "application/json")],
        )
        .await?;

        for app in &response.applications.application {
            if app.name.to_ascii_lowercase() != service {
                continue;
            }
            for instance in &app.instance {
                let owner = instance
                    .metadata
                    .get("owner")
                    .or_else(|| instance.metadata.get("team"))
                    .and_then(|v| v.as_str());
                if let Some(owner) = owner {
                    let mut signal =
                        OwnershipSignal::team(OwnershipSource::CloudTags, owner, 0.85);
                    if let Some(email) =
                        instance.metadata.get("email").and_then(|v| v.as_str())
                    {
                        signal = signal.with_metadata("email", email.to_string());
                    }
                    return Ok(Some(signal));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_owner_tag_becomes_signal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eureka/apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "applications": {"application": [{
                    "name": "CHECKOUT",
                    "instance": [{"metadata": {"owner": "payments", "email": "pay@example.com"}}]
                }]}
            })))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            url: Some(server.uri()),
            ..Default::default()
        };
        let signal = RegistryTagsOwnership::new(&config)
            .signal("checkout", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.owner, "payments");
        assert_eq!(signal.source, OwnershipSource::CloudTags);
        assert_eq!(
            signal.metadata.get("email").map(String::as_str),
            Some("pay@example.com")
        );
    }
}
