//! # NthLayer Providers
//!
//! Pluggable adapters behind the core's provider traits:
//!
//! - `discovery` - dependency edges from Consul, Backstage, Prometheus
//!   traffic, Kubernetes, and Eureka-style registry metadata
//! - `ownership` - ownership signals from PagerDuty, Backstage, CODEOWNERS,
//!   Kubernetes labels, and registry tags
//! - `webhook` - deployment webhooks from GitHub and GitLab
//!
//! Every adapter is loaded from configuration; the orchestrators never
//! branch on a provider's identity.

pub mod discovery;
mod http;
pub mod ownership;
pub mod webhook;

pub use discovery::discovery_providers_from_config;
pub use ownership::ownership_providers_from_config;
pub use webhook::{webhook_registry_from_config, WebhookRegistry};
