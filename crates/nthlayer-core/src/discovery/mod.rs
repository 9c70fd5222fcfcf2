//! Dependency discovery: the provider capability set, the fan-out
//! orchestrator, and bounded graph traversals.

mod orchestrator;
mod traverse;

pub use orchestrator::DiscoveryOrchestrator;
pub use traverse::{downstream, upstream, DEFAULT_MAX_DEPTH};

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::{DiscoveredDependency, ProviderHealth};
use crate::error::ProviderError;

/// Capability set every discovery provider implements.
///
/// Providers are independent adapters loaded from configuration; the
/// orchestrator never branches on a provider's identity. A provider that
/// fails emits zero edges and reports unhealthy; it must never abort
/// orchestration.
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Stable provider identifier, e.g. "consul".
    fn name(&self) -> &str;

    /// Edges involving `service`, as source or target, in the provider's
    /// raw vocabulary.
    async fn discover(&self, service: &str)
        -> Result<Vec<DiscoveredDependency>, ProviderError>;

    /// Raw identifiers of every service this provider knows about.
    async fn list_services(&self) -> Result<Vec<String>, ProviderError>;

    /// Liveness probe.
    async fn health_check(&self) -> ProviderHealth;

    /// Attributes for identity correlation (repository, owner, ...).
    /// Default: none.
    async fn get_service_attributes(&self, _service: &str) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Every edge the provider can produce. Default implementation iterates
    /// `list_services` serially; providers with a bulk API override this.
    async fn discover_all(&self) -> Result<Vec<DiscoveredDependency>, ProviderError> {
        let mut edges = Vec::new();
        for service in self.list_services().await? {
            edges.extend(self.discover(&service).await?);
        }
        Ok(edges)
    }
}
