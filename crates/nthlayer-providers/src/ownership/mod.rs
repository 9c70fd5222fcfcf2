//! Ownership provider adapters.

mod backstage;
mod codeowners;
mod kubernetes;
mod pagerduty;
mod registry_tags;

pub use backstage::BackstageOwnership;
pub use codeowners::CodeownersOwnership;
pub use kubernetes::KubernetesOwnership;
pub use pagerduty::PagerDutyOwnership;
pub use registry_tags::RegistryTagsOwnership;

use std::sync::Arc;

use tracing::info;

use nthlayer_core::config::NthLayerConfig;
use nthlayer_core::ownership::OwnershipProvider;

/// Instantiate every enabled ownership provider named in configuration.
pub fn ownership_providers_from_config(
    config: &NthLayerConfig,
) -> Vec<Arc<dyn OwnershipProvider>> {
    let mut providers: Vec<Arc<dyn OwnershipProvider>> = Vec::new();
    for (name, provider_config) in &config.ownership.providers {
        if !provider_config.enabled {
            continue;
        }
        let provider: Option<Arc<dyn OwnershipProvider>> = match name.as_str() {
            "pagerduty" => Some(Arc::new(PagerDutyOwnership::new(provider_config))),
            "backstage" => Some(Arc::new(BackstageOwnership::new(provider_config))),
            "codeowners" => Some(Arc::new(CodeownersOwnership::new(provider_config))),
            "kubernetes" => Some(Arc::new(KubernetesOwnership::new(provider_config))),
            "registry-tags" => Some(Arc::new(RegistryTagsOwnership::new(provider_config))),
            other => {
                info!("[Ownership] unknown provider {:?} in config, skipping", other);
                None
            }
        };
        if let Some(provider) = provider {
            providers.push(provider);
        }
    }
    providers
}
