//! Backstage catalog owner field as a portal-ownership signal.

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
struct Entity {
    metadata: Metadata,
    #[serde(default)]
    spec: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

/// The catalog's `spec.owner` field.
pub struct BackstageOwnership {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl BackstageOwnership {
    /// Build from provider configuration (`url`, `token`).
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:7007".to_string())
                .trim_end_matches('/')
                .to_string(),
            token: config.token.clone(),
            client: build_client(Duration::from_secs(5)),
        }
    }
}

#[async_trait]
impl OwnershipProvider for BackstageOwnership {
    fn name(&self) -> &str {
        "backstage"
    }

    async fn signal(
        &self,
        service: &str,
        _repository: Option<&str>,
    ) -> Result<Option<OwnershipSignal>, ProviderError> {
        let url = format!(
            "{}/api/catalog/entities/by-name/component/default/{}",
            self.base_url, service
        );
        let headers = match &self.token {
            Some(token) => vec![("Authorization", format!("Bearer {token}"))],
            None => Vec::new(),
        };
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        let entity: Entity = get_json(&self.client, self.name(), &url, &header_refs).await?;

        let Some(owner) = entity.spec.get("owner").and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        let owner = owner.rsplit('/').next().unwrap_or(owner);
        let owner = owner.strip_prefix("group:").unwrap_or(owner);

        let mut signal = OwnershipSignal::team(OwnershipSource::Portal, owner, 0.9);
        if let Some(chat) = entity.metadata.annotations.get("slack.com/channel") {
            signal = signal.with_metadata("chat", chat.clone());
        }
        if let Some(email) = entity.metadata.annotations.get("nthlayer.io/team-email") {
            signal = signal.with_metadata("email", email.clone());
        }
        Ok(Some(signal))
    }
}
