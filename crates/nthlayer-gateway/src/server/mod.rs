//! Gateway server: router assembly and lifecycle.

mod handlers;
mod state;

pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use nthlayer_core::repository::DeploymentEventRepository;
use nthlayer_providers::WebhookRegistry;

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable CORS for browser access.
    pub enable_cors: bool,
    /// Concurrent webhook deliveries processed before shedding with 503.
    pub max_concurrent_webhooks: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8087,
            enable_cors: false,
            max_concurrent_webhooks: 32,
        }
    }
}

impl GatewayConfig {
    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid address")
    }
}

/// Webhook ingestion server.
///
/// All external dependencies (the provider registry and the event store)
/// are injected through the constructor, keeping the server testable.
pub struct GatewayServer {
    config: GatewayConfig,
    state: AppState,
}

impl GatewayServer {
    /// Create a server over a provider registry and event store.
    pub fn new(
        config: GatewayConfig,
        registry: WebhookRegistry,
        events: Arc<dyn DeploymentEventRepository>,
    ) -> Self {
        let state = AppState::new(registry, events, config.max_concurrent_webhooks);
        Self { config, state }
    }

    /// Build the router. Public for handler-level tests.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/webhooks/deployments/{provider}",
                post(handlers::deployment_webhook),
            )
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }
        router
    }

    #[cfg(test)]
    pub(crate) fn state_for_tests(&self) -> &AppState {
        &self.state
    }

    /// Serve until the cancellation token fires.
    pub async fn serve(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let addr = self.config.addr();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("[Gateway] listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        info!("[Gateway] shut down");
        Ok(())
    }
}
