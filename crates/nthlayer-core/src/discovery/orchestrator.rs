//! Parallel provider fan-out, identity resolution, edge merging, and
//! graph assembly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;
use crate::domain::{
    DepType, DependencyGraph, DiscoveredDependency, ResolvedDependency, ServiceIdentity,
};
use crate::error::ProviderError;
use crate::identity::{IdentityResolver, TtlCache};

use super::DiscoveryProvider;

/// Confirmation bonus per additional provider, and its cap.
const CONFIRMATION_BONUS: f64 = 0.1;
const CONFIRMATION_BONUS_CAP: f64 = 0.2;

/// Fans out to discovery providers, resolves identities, merges edges, and
/// assembles dependency graphs.
pub struct DiscoveryOrchestrator {
    providers: Vec<Arc<dyn DiscoveryProvider>>,
    identity: Arc<IdentityResolver>,
    provider_timeout: Duration,
    batch_size: usize,
    cache: Mutex<TtlCache<String, Vec<ResolvedDependency>>>,
}

impl DiscoveryOrchestrator {
    /// Create an orchestrator over the given providers and shared identity
    /// resolver handle.
    pub fn new(
        config: &DiscoveryConfig,
        cache_ttl: Duration,
        providers: Vec<Arc<dyn DiscoveryProvider>>,
        identity: Arc<IdentityResolver>,
    ) -> Self {
        Self {
            providers,
            identity,
            provider_timeout: Duration::from_millis(config.provider_timeout_ms),
            batch_size: config.batch_size.max(1),
            cache: Mutex::new(TtlCache::new(1_024, cache_ttl)),
        }
    }

    /// Shared identity resolver handle.
    pub fn identity(&self) -> Arc<IdentityResolver> {
        self.identity.clone()
    }

    /// Merged dependencies for one service. Cached per service with TTL;
    /// pass `use_cache = false` to force a fresh fan-out.
    pub async fn discover_for_service(
        &self,
        service: &str,
        use_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedDependency>, ProviderError> {
        if use_cache {
            if let Ok(mut cache) = self.cache.lock() {
                if let Some(hit) = cache.get(&service.to_string()) {
                    debug!("[Discovery] cache hit for {}", service);
                    return Ok(hit);
                }
            }
        }

        let raw = self.fan_out(service, cancel).await?;
        let merged = self.resolve_and_merge(raw);

        // Write-through on success only.
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(service.to_string(), merged.clone());
        }
        Ok(merged)
    }

    /// Build a merged snapshot across services. When `services` is None the
    /// union of every provider's `list_services` is used. Services are
    /// processed in batches to bound connection pressure; cancellation is
    /// observed between batches and inside the fan-out, and a cancelled
    /// build never returns a partial graph.
    pub async fn build_full_graph(
        &self,
        services: Option<Vec<String>>,
        cancel: &CancellationToken,
    ) -> Result<DependencyGraph, ProviderError> {
        let mut targets = match services {
            Some(list) => list,
            None => self.all_known_services(cancel).await?,
        };
        targets.sort();
        targets.dedup();

        let mut raw_edges = Vec::new();
        for batch in targets.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            let results = join_all(
                batch
                    .iter()
                    .map(|service| self.fan_out(service, cancel)),
            )
            .await;
            for result in results {
                raw_edges.extend(result?);
            }
        }

        let edges = self.resolve_and_merge(raw_edges);

        let mut identities: BTreeMap<String, ServiceIdentity> = BTreeMap::new();
        let mut providers_used: BTreeSet<String> = BTreeSet::new();
        for edge in &edges {
            providers_used.extend(edge.providers.iter().cloned());
            for endpoint in [&edge.source, &edge.target] {
                if !identities.contains_key(endpoint) {
                    if let Some(identity) = self.identity.get(endpoint) {
                        identities.insert(endpoint.clone(), identity);
                    }
                }
            }
        }

        debug!(
            "[Discovery] graph built: {} identities, {} edges, {} providers",
            identities.len(),
            edges.len(),
            providers_used.len()
        );

        Ok(DependencyGraph {
            identities,
            edges,
            built_at: chrono::Utc::now(),
            providers_used,
        })
    }

    /// Health of every provider, in provider order.
    pub async fn provider_health(&self) -> Vec<(String, crate::domain::ProviderHealth)> {
        let mut out = Vec::new();
        for provider in &self.providers {
            let health = provider.health_check().await;
            out.push((provider.name().to_string(), health));
        }
        out
    }

    /// Fan out `discover(service)` to all providers concurrently. Provider
    /// failures and timeouts degrade to zero edges; only cancellation
    /// aborts the call.
    async fn fan_out(
        &self,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiscoveredDependency>, ProviderError> {
        let tasks = self.providers.iter().map(|provider| {
            let provider = provider.clone();
            let service = service.to_string();
            let timeout = self.provider_timeout;
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(ProviderError::Cancelled),
                    outcome = tokio::time::timeout(timeout, provider.discover(&service)) => {
                        match outcome {
                            Ok(result) => result,
                            Err(_) => Err(ProviderError::Timeout {
                                provider: provider.name().to_string(),
                                timeout_ms: timeout.as_millis() as u64,
                            }),
                        }
                    }
                }
            }
        });

        let mut edges = Vec::new();
        for (provider, result) in self.providers.iter().zip(join_all(tasks).await) {
            match result {
                Ok(found) => edges.extend(found),
                Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
                Err(error) => {
                    warn!(
                        "[Discovery] provider {} produced nothing: {}",
                        provider.name(),
                        error
                    );
                }
            }
        }
        Ok(edges)
    }

    /// Union of every provider's service list. Failing providers contribute
    /// nothing.
    async fn all_known_services(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError> {
        let tasks = self.providers.iter().map(|provider| {
            let provider = provider.clone();
            let timeout = self.provider_timeout;
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(ProviderError::Cancelled),
                    outcome = tokio::time::timeout(timeout, provider.list_services()) => {
                        match outcome {
                            Ok(result) => result,
                            Err(_) => Err(ProviderError::Timeout {
                                provider: provider.name().to_string(),
                                timeout_ms: timeout.as_millis() as u64,
                            }),
                        }
                    }
                }
            }
        });

        let mut services = BTreeSet::new();
        for (provider, result) in self.providers.iter().zip(join_all(tasks).await) {
            match result {
                Ok(list) => services.extend(list),
                Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
                Err(error) => {
                    warn!(
                        "[Discovery] provider {} list_services failed: {}",
                        provider.name(),
                        error
                    );
                }
            }
        }
        Ok(services.into_iter().collect())
    }

    /// Resolve raw endpoints to canonical identities, group by
    /// (source, target, dep_type), and merge each group.
    fn resolve_and_merge(&self, mut raw: Vec<DiscoveredDependency>) -> Vec<ResolvedDependency> {
        // Provider-name order makes the later-wins metadata merge
        // deterministic regardless of completion order.
        raw.sort_by(|a, b| a.provider.cmp(&b.provider));

        let mut groups: BTreeMap<(String, String, DepType), Vec<DiscoveredDependency>> =
            BTreeMap::new();
        for edge in raw {
            let source = self
                .identity
                .register_from_discovery(&edge.source_service, &edge.provider, None)
                .canonical_name;
            let target = self
                .identity
                .register_from_discovery(&edge.target_service, &edge.provider, None)
                .canonical_name;
            groups
                .entry((source, target, edge.dep_type))
                .or_default()
                .push(edge);
        }

        groups
            .into_iter()
            .map(|((source, target, dep_type), members)| {
                let providers: BTreeSet<String> =
                    members.iter().map(|m| m.provider.clone()).collect();
                let base = members
                    .iter()
                    .map(|m| m.confidence)
                    .fold(0.0_f64, f64::max);
                let bonus =
                    (CONFIRMATION_BONUS * (providers.len().saturating_sub(1)) as f64)
                        .min(CONFIRMATION_BONUS_CAP);
                let confidence = (base + bonus).clamp(0.0, 1.0);

                let mut metadata = BTreeMap::new();
                for member in &members {
                    for (key, value) in &member.metadata {
                        metadata.insert(key.clone(), value.clone());
                    }
                }

                ResolvedDependency {
                    source,
                    target,
                    dep_type,
                    confidence,
                    providers,
                    metadata,
                }
            })
            .collect()
    }
}
