//! Gateway entrypoint.
//!
//! Configuration comes from the environment; config-file loading belongs to
//! the surrounding tooling. Recognized variables:
//!
//! - `NTHLAYER_GATEWAY_ADDR` - bind address (default `0.0.0.0:8087`)
//! - `NTHLAYER_DB_PATH` - SQLite path (default `nthlayer.db`)
//! - `NTHLAYER_GITHUB_WEBHOOK_SECRET` / `NTHLAYER_GITLAB_WEBHOOK_TOKEN`
//! - `RUST_LOG` - tracing filter (default `info`)

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nthlayer_gateway::{GatewayConfig, GatewayServer};
use nthlayer_providers::webhook::{GithubWebhookProvider, GitlabWebhookProvider};
use nthlayer_providers::WebhookRegistry;
use nthlayer_storage::{Database, SqliteDeploymentEventRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = GatewayConfig::default();
    if let Ok(addr) = std::env::var("NTHLAYER_GATEWAY_ADDR") {
        if let Some((host, port)) = addr.rsplit_once(':') {
            config.host = host.to_string();
            config.port = port.parse()?;
        }
    }

    let db_path =
        std::env::var("NTHLAYER_DB_PATH").unwrap_or_else(|_| "nthlayer.db".to_string());
    let database = Database::open(&PathBuf::from(&db_path))?;
    let events = Arc::new(SqliteDeploymentEventRepository::new(Arc::new(Mutex::new(
        database,
    ))));
    info!("[Gateway] event store at {}", db_path);

    let mut registry = WebhookRegistry::new();
    if let Ok(secret) = std::env::var("NTHLAYER_GITHUB_WEBHOOK_SECRET") {
        registry.register(Arc::new(GithubWebhookProvider::new(secret)));
    }
    if let Ok(token) = std::env::var("NTHLAYER_GITLAB_WEBHOOK_TOKEN") {
        registry.register(Arc::new(GitlabWebhookProvider::new(token)));
    }
    info!("[Gateway] webhook providers: {:?}", registry.names());

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[Gateway] shutdown signal received");
            shutdown.cancel();
        }
    });

    let server = GatewayServer::new(config, registry, events);
    server.serve(cancel).await
}
