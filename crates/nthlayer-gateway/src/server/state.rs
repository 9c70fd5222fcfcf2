//! Shared gateway state.

use std::sync::Arc;

use tokio::sync::Semaphore;

use nthlayer_core::repository::DeploymentEventRepository;
use nthlayer_providers::WebhookRegistry;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Webhook providers keyed by endpoint path segment.
    pub registry: WebhookRegistry,
    /// Deployment event store.
    pub events: Arc<dyn DeploymentEventRepository>,
    /// Backpressure: deliveries beyond the cap are shed with 503.
    pub capacity: Arc<Semaphore>,
}

impl AppState {
    /// Create state with the given webhook concurrency cap.
    pub fn new(
        registry: WebhookRegistry,
        events: Arc<dyn DeploymentEventRepository>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            registry,
            events,
            capacity: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}
