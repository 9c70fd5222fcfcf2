//! Backstage catalog relations.
//!
//! `dependsOn` / `dependencyOf` relations become edges; the dependency type
//! is inferred from the target entity ref (`resource:*postgres*` is a
//! datastore, `resource:*kafka*` a queue, `api:` an external API).

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

/// Catalog relations are curated by humans.
const CATALOG_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Deserialize)]
struct Entity {
    metadata: EntityMetadata,
    #[serde(default)]
    spec: serde_json::Value,
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Debug, Deserialize)]
struct EntityMetadata {
    name: String,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Relation {
    #[serde(rename = "type")]
    relation_type: String,
    #[serde(rename = "targetRef")]
    target_ref: String,
}

/// Discovery adapter for a Backstage catalog.
pub struct BackstageDiscovery {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl BackstageDiscovery {
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

    fn headers(&self) -> Vec<(&str, String)> {
        match &self.token {
            Some(token) => vec![("Authorization", format!("Bearer {token}"))],
            None => Vec::new(),
        }
    }

    async fn fetch_entity(&self, service: &str) -> Result<Entity, ProviderError> {
        let url = format!(
            "{}/api/catalog/entities/by-name/component/default/{}",
            self.base_url, service
        );
        let headers = self.headers();
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        get_json(&self.client, self.name(), &url, &header_refs).await
    }
}

/// `resource:default/orders-postgres` -> (orders-postgres, Datastore).
fn parse_target_ref(target_ref: &str) -> (String, DepType) {
    let (kind, rest) = target_ref
        .split_once(':')
        .unwrap_or(("component", target_ref));
    let name = rest.rsplit('/').next().unwrap_or(rest).to_string();

    let dep_type = match kind {
        "api" => DepType::External,
        "resource" => {
            let lowered = name.to_ascii_lowercase();
            if ["postgres", "mysql", "redis", "db", "database"]
                .iter()
                .any(|hint| lowered.contains(hint))
            {
                DepType::Datastore
            } else if ["kafka", "rabbit", "queue", "sqs"]
                .iter()
                .any(|hint| lowered.contains(hint))
            {
                DepType::Queue
            } else {
                DepType::Infra
            }
        }
        _ => DepType::Service,
    };
    (name, dep_type)
}

#[async_trait]
impl DiscoveryProvider for BackstageDiscovery {
    fn name(&self) -> &str {
        "backstage"
    }

    async fn discover(
        &self,
        service: &str,
    ) -> Result<Vec<DiscoveredDependency>, ProviderError> {
        let entity = self.fetch_entity(service).await?;

        let mut edges = Vec::new();
        for relation in &entity.relations {
            let (other, dep_type) = parse_target_ref(&relation.target_ref);
            match relation.relation_type.as_str() {
                "dependsOn" => edges.push(
                    DiscoveredDependency::new(
                        service,
                        other,
                        self.name(),
                        dep_type,
                        CATALOG_CONFIDENCE,
                    )
                    .with_metadata("relation", "dependsOn"),
                ),
                "dependencyOf" => edges.push(
                    DiscoveredDependency::new(
                        other,
                        service,
                        self.name(),
                        DepType::Service,
                        CATALOG_CONFIDENCE,
                    )
                    .with_metadata("relation", "dependencyOf"),
                ),
                _ => {}
            }
        }

        debug!("[backstage] {} relation edges for {}", edges.len(), service);
        Ok(edges)
    }

    async fn list_services(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!(
            "{}/api/catalog/entities?filter=kind=component",
            self.base_url
        );
        let headers = self.headers();
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        let list: Vec<Entity> =
            get_json(&self.client, self.name(), &url, &header_refs).await?;
        Ok(list.into_iter().map(|e| e.metadata.name).collect())
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let url = format!(
            "{}/api/catalog/entities?filter=kind=component&limit=1",
            self.base_url
        );
        let headers = self.headers();
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        let result: Result<Vec<Entity>, ProviderError> =
            get_json(&self.client, self.name(), &url, &header_refs).await;
        match result {
            Ok(_) => ProviderHealth::healthy("catalog reachable")
                .with_latency(started.elapsed().as_millis() as u64),
            Err(error) => ProviderHealth::unhealthy(error.to_string()),
        }
    }

    /// Owner, repository slug, chat channel, and the scorecard tier (passed
    /// through verbatim; unknown levels surface as "unknown" rather than
    /// being coerced onto the tier enum).
    async fn get_service_attributes(&self, service: &str) -> BTreeMap<String, String> {
        let Ok(entity) = self.fetch_entity(service).await else {
            return BTreeMap::new();
        };

        let mut attributes = BTreeMap::new();
        if let Some(owner) = entity.spec.get("owner").and_then(|v| v.as_str()) {
            let owner = owner.rsplit('/').next().unwrap_or(owner);
            let owner = owner.strip_prefix("group:").unwrap_or(owner);
            attributes.insert("owner".to_string(), owner.to_string());
            attributes.insert("team".to_string(), owner.to_string());
        }
        if let Some(slug) = entity.metadata.annotations.get("github.com/project-slug") {
            attributes.insert(
                "repository".to_string(),
                format!("https://github.com/{slug}"),
            );
        }
        if let Some(chat) = entity.metadata.annotations.get("slack.com/channel") {
            attributes.insert("chat".to_string(), chat.clone());
        }
        if let Some(tier) = entity.spec.get("tier").and_then(|v| v.as_str()) {
            let known = ["critical", "standard", "low"];
            let value = if known.contains(&tier) { tier } else { "unknown" };
            attributes.insert("tier".to_string(), value.to_string());
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entity_body() -> serde_json::Value {
        serde_json::json!({
            "metadata": {
                "name": "checkout",
                "annotations": {
                    "github.com/project-slug": "example/checkout",
                    "slack.com/channel": "#checkout"
                }
            },
            "spec": {"owner": "group:default/payments", "tier": "gold"},
            "relations": [
                {"type": "dependsOn", "targetRef": "component:default/payment"},
                {"type": "dependsOn", "targetRef": "resource:default/orders-postgres"},
                {"type": "dependsOn", "targetRef": "resource:default/events-kafka"},
                {"type": "dependsOn", "targetRef": "api:default/tax-api"},
                {"type": "dependencyOf", "targetRef": "component:default/web"},
                {"type": "ownedBy", "targetRef": "group:default/payments"}
            ]
        })
    }

    async fn provider(server: &MockServer) -> BackstageDiscovery {
        let config = ProviderConfig {
            url: Some(server.uri()),
            ..Default::default()
        };
        BackstageDiscovery::new(&config)
    }

    #[tokio::test]
    async fn test_relations_become_typed_edges() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalog/entities/by-name/component/default/checkout"))
            .respond_with(ResponseTemplate::new(200).set_body_json(entity_body()))
            .mount(&server)
            .await;

        let edges = provider(&server).await.discover("checkout").await.unwrap();
        assert_eq!(edges.len(), 5);

        let find = |target: &str| edges.iter().find(|e| e.target_service == target).unwrap();
        assert_eq!(find("payment").dep_type, DepType::Service);
        assert_eq!(find("orders-postgres").dep_type, DepType::Datastore);
        assert_eq!(find("events-kafka").dep_type, DepType::Queue);
        assert_eq!(find("tax-api").dep_type, DepType::External);
        // dependencyOf points back at us.
        let inbound = edges
            .iter()
            .find(|e| e.target_service == "checkout")
            .unwrap();
        assert_eq!(inbound.source_service, "web");
    }

    #[tokio::test]
    async fn test_unknown_scorecard_tier_surfaces_as_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalog/entities/by-name/component/default/checkout"))
            .respond_with(ResponseTemplate::new(200).set_body_json(entity_body()))
            .mount(&server)
            .await;

        let attributes = provider(&server)
            .await
            .get_service_attributes("checkout")
            .await;
        assert_eq!(attributes.get("tier").map(String::as_str), Some("unknown"));
        assert_eq!(attributes.get("owner").map(String::as_str), Some("payments"));
        assert_eq!(
            attributes.get("repository").map(String::as_str),
            Some("https://github.com/example/checkout")
        );
    }
}
