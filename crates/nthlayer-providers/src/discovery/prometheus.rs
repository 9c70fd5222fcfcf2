//! Traffic-inferred edges from inter-service request-rate metrics.
//!
//! Queries the mesh request counter in both directions around a service.
//! Edges only appear above a minimum observed rate; confidence starts at
//! 0.4 and grows with log-rate, capped at 0.9.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use nthlayer_core::config::ProviderConfig;
use nthlayer_core::domain::{DepType, DiscoveredDependency, ProviderHealth};
use nthlayer_core::discovery::DiscoveryProvider;
use nthlayer_core::error::ProviderError;

use crate::http::{build_client, get_json};

/// Floor for traffic-inferred confidence.
const BASE_CONFIDENCE: f64 = 0.4;

/// Cap for traffic-inferred confidence.
const MAX_CONFIDENCE: f64 = 0.9;

/// Default minimum request rate (req/s) for an edge to exist.
const DEFAULT_MIN_RATE: f64 = 0.1;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct VectorData {
    result: Vec<VectorSample>,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    metric: std::collections::BTreeMap<String, String>,
    value: (f64, String),
}

/// Discovery adapter inferring edges from request-rate metrics.
pub struct PrometheusTrafficDiscovery {
    base_url: String,
    traffic_metric: String,
    source_label: String,
    destination_label: String,
    min_rate: f64,
    client: reqwest::Client,
}

impl PrometheusTrafficDiscovery {
    /// Build from provider configuration. `extra` keys: `traffic_metric`
    /// (default `istio_requests_total`), `source_label`, `destination_label`,
    /// `min_rate`.
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:9090".to_string())
                .trim_end_matches('/')
                .to_string(),
            traffic_metric: config
                .extra
                .get("traffic_metric")
                .cloned()
                .unwrap_or_else(|| "istio_requests_total".to_string()),
            source_label: config
                .extra
                .get("source_label")
                .cloned()
                .unwrap_or_else(|| "source_workload".to_string()),
            destination_label: config
                .extra
                .get("destination_label")
                .cloned()
                .unwrap_or_else(|| "destination_workload".to_string()),
            min_rate: config
                .extra
                .get("min_rate")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MIN_RATE),
            client: build_client(Duration::from_secs(5)),
        }
    }

    async fn instant_query(&self, query: &str) -> Result<Vec<VectorSample>, ProviderError> {
        let url = format!(
            "{}/api/v1/query?query={}",
            self.base_url,
            urlencode(query)
        );
        let response: ApiResponse<VectorData> =
            get_json(&self.client, self.name(), &url, &[]).await?;
        if response.status != "success" {
            return Err(ProviderError::Transient {
                provider: self.name().to_string(),
                message: "query failed".to_string(),
            });
        }
        Ok(response.data.map(|d| d.result).unwrap_or_default())
    }

    fn confidence_for_rate(&self, rate: f64) -> f64 {
        (BASE_CONFIDENCE + 0.1 * (1.0 + rate).log10()).clamp(BASE_CONFIDENCE, MAX_CONFIDENCE)
    }
}

/// Minimal query-string escaping for PromQL expressions.
fn urlencode(query: &str) -> String {
    query
        .replace('%', "%25")
        .replace('{', "%7B")
        .replace('}', "%7D")
        .replace('"', "%22")
        .replace('[', "%5B")
        .replace(']', "%5D")
        .replace('+', "%2B")
        .replace(' ', "%20")
        .replace('=', "%3D")
        .replace('~', "%7E")
        .replace('!', "%21")
        .replace('(', "%28")
        .replace(')', "%29")
        .replace(',', "%2C")
}

#[async_trait]
impl DiscoveryProvider for PrometheusTrafficDiscovery {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn discover(
        &self,
        service: &str,
    ) -> Result<Vec<DiscoveredDependency>, ProviderError> {
        let outbound_query = format!(
            "sum by ({dest}) (rate({metric}{{{source}=\"{service}\"}}[5m]))",
            dest = self.destination_label,
            source = self.source_label,
            metric = self.traffic_metric,
        );
        let inbound_query = format!(
            "sum by ({source}) (rate({metric}{{{dest}=\"{service}\"}}[5m]))",
            dest = self.destination_label,
            source = self.source_label,
            metric = self.traffic_metric,
        );

        let mut edges = Vec::new();
        for (query, outbound) in [(outbound_query, true), (inbound_query, false)] {
            for sample in self.instant_query(&query).await? {
                let label = if outbound {
                    &self.destination_label
                } else {
                    &self.source_label
                };
                let Some(peer) = sample.metric.get(label) else {
                    continue;
                };
                if peer == service || peer == "unknown" {
                    continue;
                }
                let rate: f64 = sample.value.1.parse().unwrap_or(0.0);
                if rate < self.min_rate {
                    continue;
                }
                let (source, target) = if outbound {
                    (service.to_string(), peer.clone())
                } else {
                    (peer.clone(), service.to_string())
                };
                edges.push(
                    DiscoveredDependency::new(
                        source,
                        target,
                        self.name(),
                        DepType::Service,
                        self.confidence_for_rate(rate),
                    )
                    .with_metadata("rate_rps", format!("{rate:.3}")),
                );
            }
        }

        debug!("[prometheus] {} traffic edges for {}", edges.len(), service);
        Ok(edges)
    }

    async fn list_services(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!(
            "{}/api/v1/label/{}/values",
            self.base_url, self.source_label
        );
        let response: ApiResponse<Vec<String>> =
            get_json(&self.client, self.name(), &url, &[]).await?;
        Ok(response
            .data
            .unwrap_or_default()
            .into_iter()
            .filter(|name| name != "unknown")
            .collect())
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let url = format!("{}/-/ready", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                ProviderHealth::healthy("ready").with_latency(started.elapsed().as_millis() as u64)
            }
            Ok(response) => ProviderHealth::unhealthy(format!("ready returned {}", response.status())),
            Err(error) => ProviderHealth::unhealthy(error.to_string()),
        }
    }
}
