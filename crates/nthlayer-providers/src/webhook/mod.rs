//! Deployment webhook provider adapters and the name-keyed registry the
//! gateway dispatches through.

mod github;
mod gitlab;

pub use github::GithubWebhookProvider;
pub use gitlab::GitlabWebhookProvider;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use nthlayer_core::config::NthLayerConfig;
use nthlayer_core::webhook::WebhookProvider;

/// Webhook providers keyed by endpoint path segment.
#[derive(Clone, Default)]
pub struct WebhookRegistry {
    providers: BTreeMap<String, Arc<dyn WebhookProvider>>,
}

impl WebhookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn WebhookProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Look up the provider mounted at `/webhooks/deployments/{name}`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn WebhookProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

/// Build the registry from configuration. Providers without a secret are
/// still mounted; they reject every delivery until one is configured.
pub fn webhook_registry_from_config(config: &NthLayerConfig) -> WebhookRegistry {
    let mut registry = WebhookRegistry::new();
    for (name, webhook_config) in &config.webhooks {
        if !webhook_config.enabled {
            continue;
        }
        match name.as_str() {
            "github" => registry.register(Arc::new(GithubWebhookProvider::new(
                webhook_config.secret.clone(),
            ))),
            "gitlab" => registry.register(Arc::new(GitlabWebhookProvider::new(
                webhook_config.secret.clone(),
            ))),
            other => {
                info!("[Webhook] unknown provider {:?} in config, skipping", other);
            }
        }
    }
    registry
}
