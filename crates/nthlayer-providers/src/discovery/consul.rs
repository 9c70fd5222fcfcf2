//! Consul catalog + Connect intentions.
//!
//! Intentions declare allowed source -> destination traffic; each allow
//! intention involving the queried service becomes an explicit edge in
//! whichever direction it points.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use nthlayer_core::config::ProviderConfig;
use nthlayer_core::domain::{DepType, DiscoveredDependency, ProviderHealth};
use nthlayer_core::discovery::DiscoveryProvider;
use nthlayer_core::error::ProviderError;

use crate::http::{build_client, get_json};

/// Explicit intention edges carry catalog-grade confidence.
const INTENTION_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Deserialize)]
struct Intention {
    #[serde(rename = "SourceName")]
    source_name: String,
    #[serde(rename = "DestinationName")]
    destination_name: String,
    #[serde(rename = "Action", default)]
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogService {
    #[serde(rename = "ServiceMeta", default)]
    service_meta: BTreeMap<String, String>,
}

/// Discovery adapter for a Consul cluster.
pub struct ConsulDiscovery {
    base_url: String,
    token: Option<String>,
    datacenter: Option<String>,
    client: reqwest::Client,
}

impl ConsulDiscovery {
    /// Build from provider configuration (`url`, `token`, `datacenter`).
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:8500".to_string())
                .trim_end_matches('/')
                .to_string(),
            token: config.token.clone(),
            datacenter: config.datacenter.clone(),
            client: build_client(Duration::from_secs(5)),
        }
    }

    fn url(&self, path: &str) -> String {
        match &self.datacenter {
            Some(dc) => format!("{}{}?dc={}", self.base_url, path, dc),
            None => format!("{}{}", self.base_url, path),
        }
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        match &self.token {
            Some(token) => vec![("X-Consul-Token", token.as_str())],
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl DiscoveryProvider for ConsulDiscovery {
    fn name(&self) -> &str {
        "consul"
    }

    async fn discover(
        &self,
        service: &str,
    ) -> Result<Vec<DiscoveredDependency>, ProviderError> {
        let intentions: Vec<Intention> = get_json(
            &self.client,
            self.name(),
            &self.url("/v1/connect/intentions"),
            &self.headers(),
        )
        .await?;

        let edges: Vec<DiscoveredDependency> = intentions
            .into_iter()
            .filter(|intention| {
                intention.action.as_deref().unwrap_or("allow") == "allow"
                    && (intention.source_name == service
                        || intention.destination_name == service)
            })
            .map(|intention| {
                DiscoveredDependency::new(
                    intention.source_name,
                    intention.destination_name,
                    self.name(),
                    DepType::Service,
                    INTENTION_CONFIDENCE,
                )
                .with_metadata("origin", "intention")
            })
            .collect();

        debug!("[consul] {} intention edges for {}", edges.len(), service);
        Ok(edges)
    }

    async fn list_services(&self) -> Result<Vec<String>, ProviderError> {
        let services: BTreeMap<String, Vec<String>> = get_json(
            &self.client,
            self.name(),
            &self.url("/v1/catalog/services"),
            &self.headers(),
        )
        .await?;
        Ok(services.into_keys().collect())
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let result: Result<String, ProviderError> = get_json(
            &self.client,
            self.name(),
            &self.url("/v1/status/leader"),
            &self.headers(),
        )
        .await;
        match result {
            Ok(leader) if !leader.is_empty() => {
                ProviderHealth::healthy(format!("leader {leader}"))
                    .with_latency(started.elapsed().as_millis() as u64)
            }
            Ok(_) => ProviderHealth::unhealthy("no leader elected"),
            Err(error) => ProviderHealth::unhealthy(error.to_string()),
        }
    }

    async fn get_service_attributes(&self, service: &str) -> BTreeMap<String, String> {
        let url = self.url(&format!("/v1/catalog/service/{service}"));
        let nodes: Result<Vec<CatalogService>, ProviderError> =
            get_json(&self.client, self.name(), &url, &self.headers()).await;
        match nodes {
            Ok(nodes) => nodes
                .into_iter()
                .next()
                .map(|node| node.service_meta)
                .unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        }
    }
}
