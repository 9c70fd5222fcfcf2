//! Discovery provider adapters.

mod backstage;
mod consul;
mod eureka;
mod kubernetes;
mod prometheus;

pub use backstage::BackstageDiscovery;
pub use consul::ConsulDiscovery;
pub use eureka::EurekaDiscovery;
pub use kubernetes::KubernetesDiscovery;
pub use prometheus::PrometheusTrafficDiscovery;

use std::sync::Arc;

use tracing::info;

use nthlayer_core::config::NthLayerConfig;
use nthlayer_core::discovery::DiscoveryProvider;

/// Instantiate every enabled discovery provider named in configuration.
/// Unknown names are skipped with a log line rather than an error, so a
/// config written for a newer build degrades instead of failing.
pub fn discovery_providers_from_config(
    config: &NthLayerConfig,
) -> Vec<Arc<dyn DiscoveryProvider>> {
    let mut providers: Vec<Arc<dyn DiscoveryProvider>> = Vec::new();
    for (name, provider_config) in &config.discovery.providers {
        if !provider_config.enabled {
            continue;
        }
        let provider: Option<Arc<dyn DiscoveryProvider>> = match name.as_str() {
            "consul" => Some(Arc::new(ConsulDiscovery::new(provider_config))),
            "backstage" => Some(Arc::new(BackstageDiscovery::new(provider_config))),
            "prometheus" => Some(Arc::new(PrometheusTrafficDiscovery::new(provider_config))),
            "kubernetes" => Some(Arc::new(KubernetesDiscovery::new(provider_config))),
            "eureka" => Some(Arc::new(EurekaDiscovery::new(provider_config))),
            other => {
                info!("[Discovery] unknown provider {:?} in config, skipping", other);
                None
            }
        };
        if let Some(provider) = provider {
            providers.push(provider);
        }
    }
    providers
}
