//! Kubernetes control-plane signals: egress NetworkPolicies and Istio
//! VirtualService routing.

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

/// NetworkPolicy egress rules are operator-declared policy.
const POLICY_CONFIDENCE: f64 = 0.8;

/// VirtualService routes are mesh configuration.
const ROUTE_CONFIDENCE: f64 = 0.75;

/// Pod label carrying the service name.
const APP_LABEL: &str = "app";

#[derive(Debug, Deserialize)]
struct List<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct NetworkPolicy {
    metadata: Metadata,
    spec: NetworkPolicySpec,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct NetworkPolicySpec {
    #[serde(rename = "podSelector", default)]
    pod_selector: Selector,
    #[serde(default)]
    egress: Vec<EgressRule>,
}

#[derive(Debug, Default, Deserialize)]
struct Selector {
    #[serde(rename = "matchLabels", default)]
    match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct EgressRule {
    #[serde(default)]
    to: Vec<EgressPeer>,
}

#[derive(Debug, Deserialize)]
struct EgressPeer {
    #[serde(rename = "podSelector")]
    pod_selector: Option<Selector>,
}

#[derive(Debug, Deserialize)]
struct VirtualService {
    metadata: Metadata,
    spec: VirtualServiceSpec,
}

#[derive(Debug, Deserialize)]
struct VirtualServiceSpec {
    #[serde(default)]
    hosts: Vec<String>,
    #[serde(default)]
    http: Vec<HttpRoute>,
}

#[derive(Debug, Deserialize)]
struct HttpRoute {
    #[serde(default)]
    route: Vec<RouteDestination>,
}

#[derive(Debug, Deserialize)]
struct RouteDestination {
    destination: Destination,
}

#[derive(Debug, Deserialize)]
struct Destination {
    host: String,
}

#[derive(Debug, Deserialize)]
struct Service {
    metadata: Metadata,
}

/// Discovery adapter for a Kubernetes API server.
pub struct KubernetesDiscovery {
    base_url: String,
    token: Option<String>,
    namespace: String,
    client: reqwest::Client,
}

impl KubernetesDiscovery {
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

    fn headers(&self) -> Vec<(&str, String)> {
        match &self.token {
            Some(token) => vec![("Authorization", format!("Bearer {token}"))],
            None => Vec::new(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let headers = self.headers();
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        get_json(&self.client, self.name(), &url, &header_refs).await
    }

    /// Strip mesh host suffixes: `payment.default.svc.cluster.local` -> `payment`.
    fn host_to_service(host: &str) -> String {
        host.split('.').next().unwrap_or(host).to_string()
    }
}

#[async_trait]
impl DiscoveryProvider for KubernetesDiscovery {
    fn name(&self) -> &str {
        "kubernetes"
    }

    async fn discover(
        &self,
        service: &str,
    ) -> Result<Vec<DiscoveredDependency>, ProviderError> {
        let mut edges = Vec::new();

        // Egress network policies selecting this service's pods.
        let policies: List<NetworkPolicy> = self
            .get(&format!(
                "/apis/networking.k8s.io/v1/namespaces/{}/networkpolicies",
                self.namespace
            ))
            .await?;
        for policy in policies.items {
            let Some(source) = policy.spec.pod_selector.match_labels.get(APP_LABEL) else {
                continue;
            };
            if source != service {
                continue;
            }
            for rule in &policy.spec.egress {
                for peer in &rule.to {
                    let Some(target) = peer
                        .pod_selector
                        .as_ref()
                        .and_then(|s| s.match_labels.get(APP_LABEL))
                    else {
                        continue;
                    };
                    edges.push(
                        DiscoveredDependency::new(
                            source.clone(),
                            target.clone(),
                            self.name(),
                            DepType::Service,
                            POLICY_CONFIDENCE,
                        )
                        .with_metadata("policy", policy.metadata.name.clone()),
                    );
                }
            }
        }

        // Istio VirtualServices routing this service's traffic.
        let virtual_services: List<VirtualService> = self
            .get(&format!(
                "/apis/networking.istio.io/v1beta1/namespaces/{}/virtualservices",
                self.namespace
            ))
            .await
            .unwrap_or(List { items: Vec::new() });
        for vs in virtual_services.items {
            let owns_host = vs
                .spec
                .hosts
                .iter()
                .any(|host| Self::host_to_service(host) == service);
            if !owns_host {
                continue;
            }
            for route in &vs.spec.http {
                for destination in &route.route {
                    let target = Self::host_to_service(&destination.destination.host);
                    if target == service {
                        continue;
                    }
                    edges.push(
                        DiscoveredDependency::new(
                            service,
                            target,
                            self.name(),
                            DepType::Service,
                            ROUTE_CONFIDENCE,
                        )
                        .with_metadata("virtualservice", vs.metadata.name.clone()),
                    );
                }
            }
        }

        debug!("[kubernetes] {} edges for {}", edges.len(), service);
        Ok(edges)
    }

    async fn list_services(&self) -> Result<Vec<String>, ProviderError> {
        let services: List<Service> = self
            .get(&format!("/api/v1/namespaces/{}/services", self.namespace))
            .await?;
        Ok(services.items.into_iter().map(|s| s.metadata.name).collect())
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let url = format!("{}/readyz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => ProviderHealth::healthy("ready")
                .with_latency(started.elapsed().as_millis() as u64),
            Ok(response) => {
                ProviderHealth::unhealthy(format!("readyz returned {}", response.status()))
            }
            Err(error) => ProviderHealth::unhealthy(error.to_string()),
        }
    }

    async fn get_service_attributes(&self, service: &str) -> BTreeMap<String, String> {
        let result: Result<Service, ProviderError> = self
            .get(&format!(
                "/api/v1/namespaces/{}/services/{}",
                self.namespace, service
            ))
            .await;
        match result {
            Ok(found) => {
                let mut attributes = BTreeMap::new();
                if let Some(team) = found.metadata.labels.get("team") {
                    attributes.insert("team".to_string(), team.clone());
                    attributes.insert("owner".to_string(), team.clone());
                }
                attributes
            }
            Err(_) => BTreeMap::new(),
        }
    }
}
