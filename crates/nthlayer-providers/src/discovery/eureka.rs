//! Eureka-style registry metadata: services annotate themselves with
//! `dependencies=a,b,c` (and ownership hints) in instance metadata.

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

/// Self-declared dependency tags are catalog-grade.
const TAG_CONFIDENCE: f64 = 0.8;

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

/// Discovery adapter for a Eureka registry.
pub struct EurekaDiscovery {
    base_url: String,
    client: reqwest::Client,
}

impl EurekaDiscovery {
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

    async fn fetch_apps(&self) -> Result<Vec<Application>, ProviderError> {
        let url = format!("{}/eureka/apps", self.base_url);
        let response: AppsResponse = get_json(
            &self.client,
            self.name(),
            &url,
            &[("Accept", "application/json")],
        )
        .await?;
        Ok(response.applications.application)
    }

    fn metadata_of(app: &Application) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for instance in &app.instance {
            for (key, value) in &instance.metadata {
                if let Some(value) = value.as_str() {
                    merged.entry(key.clone()).or_insert_with(|| value.to_string());
                }
            }
        }
        merged
    }
}

#[async_trait]
impl DiscoveryProvider for EurekaDiscovery {
    fn name(&self) -> &str {
        "eureka"
    }

    async fn discover(
        &self,
        service: &str,
    ) -> Result<Vec<DiscoveredDependency>, ProviderError> {
        let apps = self.fetch_apps().await?;
        let mut edges = Vec::new();

        for app in &apps {
            let app_name = app.name.to_ascii_lowercase();
            let metadata = Self::metadata_of(app);
            let Some(declared) = metadata.get("dependencies") else {
                continue;
            };
            for target in declared.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                if app_name == service || target == service {
                    edges.push(
                        DiscoveredDependency::new(
                            app_name.clone(),
                            target,
                            self.name(),
                            DepType::Service,
                            TAG_CONFIDENCE,
                        )
                        .with_metadata("origin", "registry-tag"),
                    );
                }
            }
        }

        debug!("[eureka] {} tag edges for {}", edges.len(), service);
        Ok(edges)
    }

    async fn list_services(&self) -> Result<Vec<String>, ProviderError> {
        let apps = self.fetch_apps().await?;
        Ok(apps
            .into_iter()
            .map(|app| app.name.to_ascii_lowercase())
            .collect())
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        match self.fetch_apps().await {
            Ok(apps) => ProviderHealth::healthy(format!("{} applications", apps.len()))
                .with_latency(started.elapsed().as_millis() as u64),
            Err(error) => ProviderHealth::unhealthy(error.to_string()),
        }
    }

    async fn get_service_attributes(&self, service: &str) -> BTreeMap<String, String> {
        let Ok(apps) = self.fetch_apps().await else {
            return BTreeMap::new();
        };
        let mut attributes = BTreeMap::new();
        for app in &apps {
            if app.name.to_ascii_lowercase() != service {
                continue;
            }
            let metadata = Self::metadata_of(app);
            for key in ["owner", "team", "repository", "chat"] {
                if let Some(value) = metadata.get(key) {
                    attributes.insert(key.to_string(), value.clone());
                }
            }
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn apps_body() -> serde_json::Value {
        serde_json::json!({
            "applications": {
                "application": [
                    {
                        "name": "CHECKOUT",
                        "instance": [{
                            "metadata": {
                                "dependencies": "payment, inventory",
                                "owner": "payments",
                                "repository": "https://github.com/example/checkout"
                            }
                        }]
                    },
                    {
                        "name": "WEB",
                        "instance": [{
                            "metadata": {"dependencies": "checkout"}
                        }]
                    },
                    {
                        "name": "BATCH",
                        "instance": [{"metadata": {}}]
                    }
                ]
            }
        })
    }

    async fn provider(server: &MockServer) -> EurekaDiscovery {
        let config = ProviderConfig {
            url: Some(server.uri()),
            ..Default::default()
        };
        EurekaDiscovery::new(&config)
    }

    #[tokio::test]
    async fn test_dependency_tags_become_edges() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eureka/apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(apps_body()))
            .mount(&server)
            .await;

        let edges = provider(&server).await.discover("checkout").await.unwrap();
        // Outbound from checkout's own tag, plus web's inbound tag.
        assert_eq!(edges.len(), 3);
        assert!(edges
            .iter()
            .any(|e| e.source_service == "checkout" && e.target_service == "payment"));
        assert!(edges
            .iter()
            .any(|e| e.source_service == "checkout" && e.target_service == "inventory"));
        assert!(edges
            .iter()
            .any(|e| e.source_service == "web" && e.target_service == "checkout"));
    }

    #[tokio::test]
    async fn test_attributes_surface_registry_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eureka/apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(apps_body()))
            .mount(&server)
            .await;

        let attributes = provider(&server)
            .await
            .get_service_attributes("checkout")
            .await;
        assert_eq!(attributes.get("owner").map(String::as_str), Some("payments"));
        assert!(attributes.contains_key("repository"));
    }
}
