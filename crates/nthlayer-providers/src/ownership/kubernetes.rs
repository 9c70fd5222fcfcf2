//! Kubernetes workload labels as orchestrator-ownership signals.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use nthlayer_core::config::ProviderConfig;
use nthlayer_core::domain::{OwnershipSignal, OwnershipSource};
use nthlayer_core::error::ProviderError;
use nthlayer_core::ownership::OwnershipProvider;

use crate::http::{build_client, get_json};

/// Labels checked for a team handle, in order.
const OWNER_LABELS: &[&str] = &["team", "owner", "app.kubernetes.io/part-of"];

#[derive(Debug, Deserialize)]
struct Service {
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

/// Whoever labels the deployment owns it, weakly.
pub struct KubernetesOwnership {
    base_url: String,
    token: Option<String>,
    namespace: String,
    client: reqwest::Client,
}

impl KubernetesOwnership {
    /// Build from provider configuration (`url`, `token`, `namespace`).
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:8001".to_string())
                .trim_end_matches('/')
                .to_string(),
            token: config.token.clone(),
            namespace: config
                .namespace
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            client: build_client(Duration::from_secs(5)),
        }
    }
}

#[async_trait]
impl OwnershipProvider for KubernetesOwnership {
    fn name(&self) -> &str {
        "kubernetes"
    }

    async fn signal(
        &self,
        service: &str,
        _repository: Option<&str>,
    ) -> Result<Option<OwnershipSignal>, ProviderError> {
        let url = format!(
            "{}/api/v1/namespaces/{}/services/{}",
            self.base_url, self.namespace, service
        );
        let headers = match &self.token {
            Some(token) => vec![("Authorization", format!("Bearer {token}"))],
            None => Vec::new(),
        };
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        let found: Service = get_json(&self.client, self.name(), &url, &header_refs).await?;

        let owner = OWNER_LABELS
            .iter()
            .find_map(|label| found.metadata.labels.get(*label))
            .cloned();
        let Some(owner) = owner else {
            return Ok(None);
        };

        let mut signal = OwnershipSignal::team(OwnershipSource::OrchestratorLabels, owner, 0.8);
        if let Some(chat) = found.metadata.annotations.get("nthlayer.io/chat") {
            signal = signal.with_metadata("chat", chat.clone());
        }
        Ok(Some(signal))
    }
}
