//! Ownership resolution: many weak signals in, one attribution out.

mod resolver;

pub use resolver::OwnershipResolver;

use async_trait::async_trait;

use crate::domain::{OwnershipSignal, ProviderHealth};
use crate::error::ProviderError;

/// Capability set for ownership providers. A provider returns at most one
/// signal per service; failures yield no signal and never abort resolution.
#[async_trait]
pub trait OwnershipProvider: Send + Sync {
    /// Stable provider identifier, e.g. "pagerduty".
    fn name(&self) -> &str;

    /// The provider's opinion about who owns `service`, if it has one.
    /// `repository` is passed for providers that key off the repo
    /// (CODEOWNERS, git activity).
    async fn signal(
        &self,
        service: &str,
        repository: Option<&str>,
    ) -> Result<Option<OwnershipSignal>, ProviderError>;

    /// Liveness probe.
    async fn health_check(&self) -> ProviderHealth {
        ProviderHealth::healthy("ok")
    }
}
