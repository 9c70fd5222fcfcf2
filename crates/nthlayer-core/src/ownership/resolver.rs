//! Weighted aggregation of ownership signals.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::OwnershipConfig;
use crate::domain::{
    Contacts, OwnershipAttribution, OwnershipSignal, OwnershipSource, OwnerType,
};
use crate::identity::TtlCache;

use super::OwnershipProvider;

/// Aggregates ownership signals from all providers into one attribution.
pub struct OwnershipResolver {
    config: OwnershipConfig,
    providers: Vec<Arc<dyn OwnershipProvider>>,
    cache: Mutex<TtlCache<String, OwnershipAttribution>>,
}

impl OwnershipResolver {
    /// Create a resolver over the given providers.
    pub fn new(
        config: OwnershipConfig,
        cache_ttl: Duration,
        providers: Vec<Arc<dyn OwnershipProvider>>,
    ) -> Self {
        Self {
            config,
            providers,
            cache: Mutex::new(TtlCache::new(1_024, cache_ttl)),
        }
    }

    /// Resolve ownership for a service. The declared owner, when present,
    /// joins the signal pool at confidence 1.0 and effectively always wins.
    pub async fn resolve(
        &self,
        service: &str,
        declared_owner: Option<&str>,
        repository: Option<&str>,
    ) -> OwnershipAttribution {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&service.to_string()) {
                debug!("[Ownership] cache hit for {}", service);
                return hit;
            }
        }

        let mut signals = self.gather(service, repository).await;
        if let Some(owner) = declared_owner {
            signals.push(OwnershipSignal::team(OwnershipSource::Declared, owner, 1.0));
        }

        // Descending score; ties break on source then owner so the result
        // is stable across runs.
        signals.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.owner.cmp(&b.owner))
        });

        let contacts = harvest_contacts(&signals);
        let winner = signals
            .first()
            .filter(|signal| signal.score() >= self.config.confidence_threshold);

        let attribution = match winner {
            Some(signal) => OwnershipAttribution {
                service: service.to_string(),
                owner: signal.owner.clone(),
                owner_type: signal.owner_type,
                confidence: signal.score(),
                source: Some(signal.source),
                signals: signals.clone(),
                contacts,
            },
            None => OwnershipAttribution {
                service: service.to_string(),
                owner: self
                    .config
                    .default_owner
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                owner_type: OwnerType::Unknown,
                confidence: 0.0,
                source: None,
                signals: signals.clone(),
                contacts,
            },
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(service.to_string(), attribution.clone());
        }
        attribution
    }

    /// Query all providers in parallel with a per-call deadline. Failures
    /// are logged and absorbed.
    async fn gather(&self, service: &str, repository: Option<&str>) -> Vec<OwnershipSignal> {
        let deadline = Duration::from_millis(self.config.provider_timeout_ms);
        let tasks = self.providers.iter().map(|provider| {
            let provider = provider.clone();
            let service = service.to_string();
            let repository = repository.map(str::to_string);
            async move {
                tokio::time::timeout(deadline, provider.signal(&service, repository.as_deref()))
                    .await
            }
        });

        let mut signals = Vec::new();
        for (provider, outcome) in self.providers.iter().zip(join_all(tasks).await) {
            match outcome {
                Ok(Ok(Some(signal))) => signals.push(signal),
                Ok(Ok(None)) => {}
                Ok(Err(error)) => {
                    warn!("[Ownership] provider {} failed: {}", provider.name(), error);
                }
                Err(_) => {
                    warn!("[Ownership] provider {} timed out", provider.name());
                }
            }
        }
        signals
    }
}

/// First non-empty contact route per field, scanning signals in score order.
fn harvest_contacts(signals: &[OwnershipSignal]) -> Contacts {
    let mut contacts = Contacts::default();
    for signal in signals {
        fill(&mut contacts.chat, &signal.metadata, "chat");
        fill(&mut contacts.email, &signal.metadata, "email");
        fill(&mut contacts.escalation, &signal.metadata, "escalation");
    }
    contacts
}

fn fill(slot: &mut Option<String>, metadata: &BTreeMap<String, String>, key: &str) {
    if slot.is_none() {
        if let Some(value) = metadata.get(key).filter(|v| !v.is_empty()) {
            *slot = Some(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;

    struct StaticOwnership {
        name: String,
        signal: Option<OwnershipSignal>,
        fail: bool,
    }

    #[async_trait]
    impl OwnershipProvider for StaticOwnership {
        fn name(&self) -> &str {
            &self.name
        }

        async fn signal(
            &self,
            _service: &str,
            _repository: Option<&str>,
        ) -> Result<Option<OwnershipSignal>, ProviderError> {
            if self.fail {
                return Err(ProviderError::Transient {
                    provider: self.name.clone(),
                    message: "boom".to_string(),
                });
            }
            Ok(self.signal.clone())
        }
    }

    fn provider(
        name: &str,
        signal: Option<OwnershipSignal>,
        fail: bool,
    ) -> Arc<dyn OwnershipProvider> {
        Arc::new(StaticOwnership {
            name: name.to_string(),
            signal,
            fail,
        })
    }

    fn resolver(providers: Vec<Arc<dyn OwnershipProvider>>) -> OwnershipResolver {
        OwnershipResolver::new(OwnershipConfig::default(), Duration::from_secs(300), providers)
    }

    #[tokio::test]
    async fn test_declared_owner_wins() {
        let r = resolver(vec![provider(
            "portal",
            Some(OwnershipSignal::team(OwnershipSource::Portal, "catalog-team", 0.9)),
            false,
        )]);
        let attribution = r.resolve("checkout", Some("payments"), None).await;
        assert_eq!(attribution.owner, "payments");
        assert_eq!(attribution.source, Some(OwnershipSource::Declared));
        assert_eq!(attribution.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_weighted_ranking_prefers_escalation_over_tags() {
        let r = resolver(vec![
            provider(
                "aws",
                Some(OwnershipSignal::team(OwnershipSource::CloudTags, "infra", 0.9)),
                false,
            ),
            provider(
                "pagerduty",
                Some(OwnershipSignal::team(
                    OwnershipSource::IncidentEscalation,
                    "payments-oncall",
                    0.9,
                )),
                false,
            ),
        ]);
        let attribution = r.resolve("checkout", None, None).await;
        assert_eq!(attribution.owner, "payments-oncall");
        assert_eq!(attribution.source, Some(OwnershipSource::IncidentEscalation));
    }

    #[tokio::test]
    async fn test_threshold_falls_back_to_default_owner() {
        let mut config = OwnershipConfig::default();
        config.default_owner = Some("platform".to_string());
        let r = OwnershipResolver::new(
            config,
            Duration::from_secs(300),
            vec![provider(
                "git",
                Some(OwnershipSignal::team(OwnershipSource::GitActivity, "alice", 0.5)),
                false,
            )],
        );
        // git activity: 0.5 x 0.4 = 0.2, below the 0.5 threshold.
        let attribution = r.resolve("checkout", None, None).await;
        assert_eq!(attribution.owner, "platform");
        assert_eq!(attribution.confidence, 0.0);
        assert!(attribution.source.is_none());
    }

    #[tokio::test]
    async fn test_failing_provider_is_absorbed() {
        let r = resolver(vec![
            provider("broken", None, true),
            provider(
                "portal",
                Some(OwnershipSignal::team(OwnershipSource::Portal, "catalog-team", 0.9)),
                false,
            ),
        ]);
        let attribution = r.resolve("checkout", None, None).await;
        assert_eq!(attribution.owner, "catalog-team");
    }

    #[tokio::test]
    async fn test_contacts_harvested_from_any_signal() {
        let r = resolver(vec![
            provider(
                "pagerduty",
                Some(
                    OwnershipSignal::team(OwnershipSource::IncidentEscalation, "payments", 0.9)
                        .with_metadata("escalation", "P1-payments"),
                ),
                false,
            ),
            provider(
                "portal",
                Some(
                    OwnershipSignal::team(OwnershipSource::Portal, "payments", 0.8)
                        .with_metadata("chat", "#payments")
                        .with_metadata("email", "payments@example.com"),
                ),
                false,
            ),
        ]);
        let attribution = r.resolve("checkout", None, None).await;
        assert_eq!(attribution.contacts.chat.as_deref(), Some("#payments"));
        assert_eq!(
            attribution.contacts.email.as_deref(),
            Some("payments@example.com")
        );
        assert_eq!(attribution.contacts.escalation.as_deref(), Some("P1-payments"));
    }
}
